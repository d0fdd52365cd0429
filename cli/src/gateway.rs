use std::{
    io::{self, Write},
    sync::Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use dot_common::{
    abi::{AbiError, AbiFunction, AbiValue, Address, CodecError, ContractAbi},
    prompt::{colorize, Color},
};
use indexmap::IndexMap;
use log::{debug, info, trace};
use primitive_types::U256;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::tracker::PendingTransaction;

// Deployed contract reachable through a provider
#[async_trait]
pub trait ContractHandle: Send + Sync {
    fn get_address(&self) -> &Address;

    // Execute a read-only function and decode its return values
    async fn call(&self, function: &AbiFunction, args: &[AbiValue]) -> Result<Vec<AbiValue>>;

    // Submit a write, the returned handle reports its lifecycle
    async fn send(&self, function: &AbiFunction, args: &[AbiValue], options: &SendOptions) -> Result<PendingTransaction>;

    // Accounts managed by the provider
    async fn accounts(&self) -> Result<Vec<Address>>;
}

// Options attached to a write, absent fields are left to the provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOptions {
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(rename = "gas", skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
}

impl SendOptions {
    pub fn new(from: Address) -> Self {
        Self {
            from,
            ..Default::default()
        }
    }

    // Same amounts rendered as decimal strings, for display purposes
    fn to_display_map(&self) -> IndexMap<&'static str, Value> {
        let mut map = IndexMap::new();
        map.insert("from", Value::String(self.from.to_string()));
        if let Some(gas_price) = self.gas_price {
            map.insert("gasPrice", Value::String(gas_price.to_string()));
        }
        if let Some(gas) = self.gas_limit {
            map.insert("gas", Value::String(gas.to_string()));
        }
        if let Some(value) = self.value {
            map.insert("value", Value::String(value.to_string()));
        }
        map
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Abi(#[from] AbiError),
    #[error("Invalid arguments for {}: {}", _0, _1)]
    Codec(String, CodecError),
    #[error("{} is not a read-only function, it must be sent", _0)]
    NotReadOnly(String),
    #[error("{} is a read-only function, it must be called", _0)]
    NotWritable(String),
    #[error("{} is not payable and cannot receive a value", _0)]
    NotPayable(String),
    #[error("No sender account: use --from or unlock an account on the provider")]
    NoAccount,
    #[error("Cannot show the call to confirm on the device: {}", _0)]
    DeviceConfirmation(#[source] io::Error),
    #[error("Provider error: {:#}", _0)]
    Provider(anyhow::Error),
}

// Where the operator reads what must be confirmed on the device
pub trait OperatorOutput: Send + Sync {
    fn show(&self, message: &str) -> io::Result<()>;
}

// Writes to stderr, independently of the log level
pub struct StderrOutput;

impl OperatorOutput for StderrOutput {
    fn show(&self, message: &str) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "{}", message)?;
        stderr.flush()
    }
}

// Human readable description of a write, shown before it is signed on a device
pub fn render_device_confirmation(function: &AbiFunction, args: &[AbiValue], options: &SendOptions) -> String {
    let mut map: IndexMap<&'static str, Value> = IndexMap::new();
    map.insert("method", Value::String(function.get_signature().clone()));
    map.insert(
        "args",
        Value::Array(args.iter().map(|arg| match arg {
            AbiValue::Bool(b) => Value::Bool(*b),
            other => Value::String(other.to_string()),
        }).collect()),
    );
    map.extend(options.to_display_map());

    serde_json::to_string_pretty(&map).unwrap_or_else(|_| format!("{:?}", map))
}

// Validated dispatch of contract functions by name
pub struct ContractGateway {
    handle: Arc<dyn ContractHandle>,
    contract: ContractAbi,
    confirm_on_device: bool,
    output: Arc<dyn OperatorOutput>,
}

impl ContractGateway {
    pub fn new(handle: Arc<dyn ContractHandle>, contract: ContractAbi, confirm_on_device: bool) -> Self {
        Self {
            handle,
            contract,
            confirm_on_device,
            output: Arc::new(StderrOutput),
        }
    }

    pub fn with_output(mut self, output: Arc<dyn OperatorOutput>) -> Self {
        self.output = output;
        self
    }

    pub fn get_contract(&self) -> &ContractAbi {
        &self.contract
    }

    pub fn get_address(&self) -> &Address {
        self.handle.get_address()
    }

    // Fails when one of the functions is missing from the ABI
    pub fn require_functions(&self, names: &[&str]) -> Result<(), GatewayError> {
        for name in names {
            self.contract.get_function(name)?;
        }
        Ok(())
    }

    fn resolve(&self, name: &str, args: &[AbiValue]) -> Result<&AbiFunction, GatewayError> {
        let function = self.contract.get_function(name)?;
        function
            .check_arguments(args)
            .map_err(|e| GatewayError::Codec(function.get_signature().clone(), e))?;
        Ok(function)
    }

    pub async fn call(&self, name: &str, args: &[AbiValue]) -> Result<Vec<AbiValue>, GatewayError> {
        let function = self.resolve(name, args)?;
        if !function.is_read_only() {
            return Err(GatewayError::NotReadOnly(function.get_signature().clone()));
        }

        if log::log_enabled!(log::Level::Trace) {
            trace!("Calling {} on {}", function.get_signature(), self.get_address());
        }

        self.handle
            .call(function, args)
            .await
            .map_err(GatewayError::Provider)
    }

    pub async fn send(&self, name: &str, args: &[AbiValue], options: &SendOptions) -> Result<PendingTransaction, GatewayError> {
        let function = self.resolve(name, args)?;
        if function.is_read_only() {
            return Err(GatewayError::NotWritable(function.get_signature().clone()));
        }

        if options.value.is_some_and(|v| !v.is_zero()) && !function.is_payable() {
            return Err(GatewayError::NotPayable(function.get_signature().clone()));
        }

        // nothing is sent unless the operator was shown the call
        if self.confirm_on_device {
            let message = format!(
                "{}\n{}",
                colorize(Color::Yellow, "Please confirm this transaction on your device:"),
                render_device_confirmation(function, args, options)
            );
            self.output.show(&message).map_err(GatewayError::DeviceConfirmation)?;
            if log::log_enabled!(log::Level::Info) {
                info!("Waiting for device confirmation of {}", function.get_signature());
            }
        } else if log::log_enabled!(log::Level::Debug) {
            debug!("Sending {} from {}", function.get_signature(), options.from);
        }

        self.handle
            .send(function, args, options)
            .await
            .map_err(GatewayError::Provider)
    }

    // Explicit sender, or the first account of the provider
    pub async fn resolve_sender(&self, explicit: Option<Address>) -> Result<Address, GatewayError> {
        if let Some(address) = explicit {
            return Ok(address);
        }

        let accounts = self.handle.accounts().await.map_err(GatewayError::Provider)?;
        accounts.into_iter().next().ok_or(GatewayError::NoAccount)
    }
}
