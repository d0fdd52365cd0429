pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// JSON-RPC provider used when none is configured
pub const DEFAULT_PROVIDER_URL: &str = "http://localhost:8545";

// Timeout of a single JSON-RPC HTTP request, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
// Connection timeout of the JSON-RPC HTTP client, in seconds
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;

// Length in bytes of a 4-byte function selector
pub const SELECTOR_SIZE: usize = 4;
// ABI words are always 32 bytes
pub const WORD_SIZE: usize = 32;
// Length in bytes of an account address
pub const ADDRESS_SIZE: usize = 20;
