use std::time::Duration;

use clap::{Parser, Subcommand};
use dot_common::{
    abi::Address,
    config::{DEFAULT_PROVIDER_URL, VERSION},
    prompt::{default_logs_datetime_format, LogLevel, ModuleConfig},
};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::tracker::DEFAULT_RECEIPT_TIMEOUT;

// Receipt polling interval in milliseconds
pub const DEFAULT_RECEIPT_POLL_INTERVAL_MS: u64 = 1000;

// Functions Helpers
fn default_provider_url() -> String {
    DEFAULT_PROVIDER_URL.to_owned()
}

fn default_receipt_timeout_ms() -> u64 {
    DEFAULT_RECEIPT_TIMEOUT.as_millis() as u64
}

fn default_receipt_poll_interval_ms() -> u64 {
    DEFAULT_RECEIPT_POLL_INTERVAL_MS
}

fn default_abi_path() -> String {
    String::from("dot-license.abi.json")
}

fn default_contract_name() -> String {
    String::from("LicenseCore")
}

fn default_log_filename() -> String {
    String::from("dot-license-cli.log")
}

fn default_logs_path() -> String {
    String::from("logs/")
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC provider URL
    #[clap(long = "web3", env = "WEB3_PROVIDER_URL", default_value_t = default_provider_url())]
    #[serde(default = "default_provider_url")]
    pub provider_url: String,
    /// Address of the contract
    #[clap(long, env = "LICENSE_CORE_ADDRESS")]
    pub contract_address: Option<Address>,
    /// Expected network id, checked against the provider before anything is sent
    #[clap(long, env = "NETWORK_ID")]
    pub network_id: Option<u64>,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Sender address
    /// By default, the first account of the provider is used
    #[clap(long)]
    pub from: Option<Address>,
    /// Gas price in wei to use for transactions
    #[clap(long, env = "GAS_PRICE")]
    pub gas_price: Option<u64>,
    /// Maximum gas provided for transactions
    #[clap(long, env = "GAS_LIMIT")]
    pub gas_limit: Option<u64>,
    /// Value transferred with the transaction, in wei
    #[clap(long)]
    pub value: Option<u128>,
    /// Transactions are signed on a hardware wallet
    /// The full call is displayed before it is sent so it can be checked on the device
    #[clap(long, env = "USE_LEDGER")]
    #[serde(default)]
    pub ledger: bool,
    /// Maximum time to wait for a receipt once the transaction hash is known, in milliseconds
    #[clap(long, default_value_t = default_receipt_timeout_ms())]
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,
    /// Interval between two receipt polls, in milliseconds
    #[clap(long, default_value_t = default_receipt_poll_interval_ms())]
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    /// Number of block confirmations reported after the receipt
    #[clap(long, default_value_t = 0)]
    #[serde(default)]
    pub confirmations: u64,
}

impl TransactionConfig {
    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn gas_price(&self) -> Option<U256> {
        self.gas_price.map(U256::from)
    }

    pub fn gas_limit(&self) -> Option<U256> {
        self.gas_limit.map(U256::from)
    }

    pub fn value(&self) -> Option<U256> {
        self.value.map(U256::from)
    }
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct LogConfig {
    /// Set log level
    #[clap(long, value_enum, default_value_t)]
    #[serde(default)]
    pub log_level: LogLevel,
    /// Set file log level
    /// By default, it will be the same as log level
    #[clap(long, value_enum)]
    pub file_log_level: Option<LogLevel>,
    /// Disable the log file
    #[clap(long)]
    #[serde(default)]
    pub disable_file_logging: bool,
    /// Disable the log filename date based
    /// If disabled, the log file will be named dot-license-cli.log instead of YYYY-MM-DD.dot-license-cli.log
    #[clap(long)]
    #[serde(default)]
    pub disable_file_log_date_based: bool,
    /// Disable the usage of colors in log
    #[clap(long)]
    #[serde(default)]
    pub disable_log_color: bool,
    /// Log filename
    ///
    /// File will be stored in logs directory, this is only the filename, not the full path.
    #[clap(long, default_value_t = default_log_filename())]
    #[serde(default = "default_log_filename")]
    pub filename_log: String,
    /// Logs directory
    #[clap(long, default_value_t = default_logs_path())]
    #[serde(default = "default_logs_path")]
    pub logs_path: String,
    /// Module configuration for logs, as module=level
    #[clap(long)]
    #[serde(default)]
    pub logs_modules: Vec<ModuleConfig>,
    /// Change the datetime format used by the logger
    #[clap(long, default_value_t = default_logs_datetime_format())]
    #[serde(default = "default_logs_datetime_format")]
    pub datetime_format: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Create or update the products described in a JSON file
    SyncProducts {
        /// Path to the file that describes your products
        #[clap(long)]
        products: String,
        /// Also synchronize inventory levels
        #[clap(long)]
        inventory: bool,
    },
    /// Execute a contract command, e.g. `exec setPrice 1 1000`
    Exec {
        #[clap(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// List the commands generated from the contract ABI
    Commands,
}

#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[clap(
    version = VERSION,
    about = "Call the LicenseCore contract and synchronize its products from the command line"
)]
#[command(styles = dot_common::get_cli_styles())]
pub struct Config {
    /// Network configuration
    #[clap(flatten)]
    pub network: NetworkConfig,
    /// Transaction configuration
    #[clap(flatten)]
    pub transaction: TransactionConfig,
    /// Log configuration
    #[clap(flatten)]
    pub log: LogConfig,
    /// Combined JSON ABI file generated by solc
    #[clap(long, default_value_t = default_abi_path())]
    #[serde(default = "default_abi_path")]
    pub abi_path: String,
    /// Contract of the ABI file to use
    #[clap(long, default_value_t = default_contract_name())]
    #[serde(default = "default_contract_name")]
    pub contract_name: String,
    /// JSON File to load the configuration from
    #[clap(long)]
    #[serde(skip)]
    #[serde(default)]
    pub config_file: Option<String>,
    /// Generate the template at the `config_file` path
    #[clap(long)]
    #[serde(skip)]
    #[serde(default)]
    pub generate_config_template: bool,
    /// Command to run
    #[clap(subcommand)]
    #[serde(skip)]
    pub command: Option<CliCommand>,
}
