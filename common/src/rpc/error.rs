use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Invalid provider URL: {}", _0)]
    InvalidUrl(#[from] url::ParseError),
    #[error("Request timeout")]
    Timeout,
    #[error("Connection failed: {}", _0)]
    Connection(reqwest::Error),
    #[error("Network error: {}", _0)]
    Transport(reqwest::Error),
    #[error("HTTP error {}", _0)]
    Http(u16),
    #[error("RPC error {}: {}", code, message)]
    Server { code: i64, message: String },
    #[error("Invalid JSON in response: {}", _0)]
    Deserialize(#[from] serde_json::Error),
    #[error("No result in response")]
    NoResult,
}

impl RpcError {
    // JSON-RPC code of the error, client side errors use the reserved server range
    pub fn get_code(&self) -> i64 {
        match self {
            Self::Server { code, .. } => *code,
            Self::Deserialize(_) => -32700,
            Self::InvalidUrl(_) => -32600,
            Self::NoResult => -32603,
            Self::Timeout => -32000,
            Self::Connection(_) => -32001,
            Self::Transport(_) => -32002,
            Self::Http(_) => -32003,
        }
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err)
        } else {
            Self::Transport(err)
        }
    }
}
