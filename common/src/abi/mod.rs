//! Contract ABI model.
//!
//! A solc "combined JSON" file is loaded once and every callable function is
//! turned into a typed [`AbiFunction`] descriptor: arity, argument types and
//! read/write classification are all known before anything is sent to a node,
//! so callers only ever dispatch through a validated signature.

mod address;
mod codec;
mod types;

pub use address::*;
pub use codec::*;
pub use types::*;

use std::{fs, path::Path};

use indexmap::IndexMap;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::config::SELECTOR_SIZE;

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("Unsupported ABI type '{}'", _0)]
    UnsupportedType(String),
    #[error("Function '{}' was not found in the ABI", _0)]
    FunctionNotFound(String),
    #[error("Function name '{}' is overloaded, use its full signature", _0)]
    AmbiguousFunction(String),
    #[error("Contract '{}' was not found in the ABI file", _0)]
    ContractNotFound(String),
    #[error("Invalid embedded JSON for contract '{}': {}", _0, _1)]
    InvalidEmbeddedJson(String, serde_json::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Deserialize)]
struct RawParam {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    #[serde(rename = "type", default = "default_entry_type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<RawParam>,
    #[serde(default)]
    outputs: Vec<RawParam>,
    #[serde(default)]
    constant: Option<bool>,
    #[serde(default)]
    payable: Option<bool>,
    #[serde(default)]
    state_mutability: Option<String>,
}

// Entries without a type are functions in old solc outputs
fn default_entry_type() -> String {
    String::from("function")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiParam {
    name: String,
    kind: AbiType,
}

impl AbiParam {
    pub fn new(name: &str, kind: AbiType) -> Self {
        Self {
            name: name.to_owned(),
            kind,
        }
    }

    pub fn get_name(&self) -> &String {
        &self.name
    }

    // Solidity parameters are usually prefixed by an underscore
    pub fn get_cli_name(&self) -> &str {
        self.name.strip_prefix('_').unwrap_or(&self.name)
    }

    pub fn get_type(&self) -> &AbiType {
        &self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiFunction {
    name: String,
    inputs: Vec<AbiParam>,
    outputs: Vec<AbiParam>,
    read_only: bool,
    payable: bool,
    signature: String,
    selector: [u8; SELECTOR_SIZE],
}

impl AbiFunction {
    pub fn new(name: &str, inputs: Vec<AbiParam>, outputs: Vec<AbiParam>, read_only: bool, payable: bool) -> Self {
        let types: Vec<String> = inputs.iter().map(|p| p.kind.to_string()).collect();
        let signature = format!("{}({})", name, types.join(","));
        let digest = Keccak256::digest(signature.as_bytes());
        let mut selector = [0u8; SELECTOR_SIZE];
        selector.copy_from_slice(&digest[..SELECTOR_SIZE]);

        Self {
            name: name.to_owned(),
            inputs,
            outputs,
            read_only,
            payable,
            signature,
            selector,
        }
    }

    fn from_raw(entry: &RawEntry) -> Result<Self, AbiError> {
        let params = |raw: &[RawParam]| -> Result<Vec<AbiParam>, AbiError> {
            raw.iter()
                .map(|p| -> Result<AbiParam, AbiError> { Ok(AbiParam::new(&p.name, p.kind.parse()?)) })
                .collect()
        };

        let mutability = entry.state_mutability.as_deref();
        let read_only = entry.constant.unwrap_or(false) || matches!(mutability, Some("view") | Some("pure"));
        let payable = entry.payable.unwrap_or(false) || mutability == Some("payable");

        Ok(Self::new(
            &entry.name,
            params(&entry.inputs)?,
            params(&entry.outputs)?,
            read_only,
            payable,
        ))
    }

    pub fn get_name(&self) -> &String {
        &self.name
    }

    pub fn get_inputs(&self) -> &Vec<AbiParam> {
        &self.inputs
    }

    pub fn get_outputs(&self) -> &Vec<AbiParam> {
        &self.outputs
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_payable(&self) -> bool {
        self.payable
    }

    // Canonical signature, e.g. setPrice(uint256,uint256)
    pub fn get_signature(&self) -> &String {
        &self.signature
    }

    pub fn get_selector(&self) -> &[u8; SELECTOR_SIZE] {
        &self.selector
    }

    pub fn input_types(&self) -> Vec<AbiType> {
        self.inputs.iter().map(|p| p.kind.clone()).collect()
    }

    pub fn output_types(&self) -> Vec<AbiType> {
        self.outputs.iter().map(|p| p.kind.clone()).collect()
    }

    // Verify arity and types of the arguments against the descriptor
    pub fn check_arguments(&self, args: &[AbiValue]) -> Result<(), CodecError> {
        if args.len() != self.inputs.len() {
            return Err(CodecError::ArityMismatch {
                expected: self.inputs.len(),
                got: args.len(),
            });
        }

        for (param, value) in self.inputs.iter().zip(args) {
            if !param.kind.accepts(value) {
                return Err(CodecError::TypeMismatch {
                    name: param.get_cli_name().to_owned(),
                    expected: param.kind.clone(),
                });
            }
        }
        Ok(())
    }

    // Selector followed by the encoded arguments
    pub fn encode_call(&self, args: &[AbiValue]) -> Result<Vec<u8>, CodecError> {
        self.check_arguments(args)?;
        let mut data = self.selector.to_vec();
        data.extend(encode_arguments(&self.input_types(), args)?);
        Ok(data)
    }

    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<AbiValue>, CodecError> {
        decode_values(&self.output_types(), data)
    }
}

// Functions and documentation of a single contract
#[derive(Debug, Clone)]
pub struct ContractAbi {
    name: String,
    functions: Vec<AbiFunction>,
    userdoc: Value,
    devdoc: Value,
}

impl ContractAbi {
    // Build from the ABI entries, skipping functions using unsupported types
    pub fn new(name: &str, abi: &Value, userdoc: Value, devdoc: Value) -> Result<Self, AbiError> {
        let entries: Vec<RawEntry> = serde_json::from_value(abi.clone())?;
        let mut functions = Vec::new();
        for entry in entries.iter().filter(|e| e.kind == "function") {
            match AbiFunction::from_raw(entry) {
                Ok(function) => functions.push(function),
                Err(e) => {
                    if log::log_enabled!(log::Level::Warn) {
                        warn!("Skipping function {}.{}: {}", name, entry.name, e);
                    }
                }
            }
        }

        if log::log_enabled!(log::Level::Debug) {
            debug!("Loaded {} functions for contract {}", functions.len(), name);
        }

        Ok(Self {
            name: name.to_owned(),
            functions,
            userdoc,
            devdoc,
        })
    }

    pub fn get_name(&self) -> &String {
        &self.name
    }

    pub fn get_functions(&self) -> &Vec<AbiFunction> {
        &self.functions
    }

    // Lookup by full signature when it contains parentheses, by name otherwise
    pub fn get_function(&self, name: &str) -> Result<&AbiFunction, AbiError> {
        if name.contains('(') {
            return self
                .functions
                .iter()
                .find(|f| f.signature == name)
                .ok_or_else(|| AbiError::FunctionNotFound(name.to_owned()));
        }

        let mut matches = self.functions.iter().filter(|f| f.name == name);
        let function = matches
            .next()
            .ok_or_else(|| AbiError::FunctionNotFound(name.to_owned()))?;
        if matches.next().is_some() {
            return Err(AbiError::AmbiguousFunction(name.to_owned()));
        }
        Ok(function)
    }

    pub fn is_overloaded(&self, name: &str) -> bool {
        self.functions.iter().filter(|f| f.name == name).count() > 1
    }

    // userdoc notice of a function
    pub fn get_notice(&self, function: &AbiFunction) -> Option<&str> {
        self.userdoc
            .get("methods")?
            .get(function.get_signature())?
            .get("notice")?
            .as_str()
    }

    // devdoc description of a parameter
    pub fn get_param_doc(&self, function: &AbiFunction, param: &str) -> Option<&str> {
        self.devdoc
            .get("methods")?
            .get(function.get_signature())?
            .get("params")?
            .get(param)?
            .as_str()
    }
}

#[derive(Deserialize)]
struct CombinedJson {
    contracts: IndexMap<String, CombinedContract>,
}

#[derive(Deserialize)]
struct CombinedContract {
    #[serde(default)]
    abi: Option<Value>,
    #[serde(default)]
    devdoc: Option<Value>,
    #[serde(default)]
    userdoc: Option<Value>,
}

// solc embeds abi/devdoc/userdoc as JSON strings, newer outputs inline them
fn embedded_json(contract: &str, value: Option<Value>) -> Result<Value, AbiError> {
    match value {
        Some(Value::String(raw)) => {
            serde_json::from_str(&raw).map_err(|e| AbiError::InvalidEmbeddedJson(contract.to_owned(), e))
        }
        Some(value) => Ok(value),
        None => Ok(Value::Null),
    }
}

// All the contracts of a combined ABI file
#[derive(Debug, Clone, Default)]
pub struct AbiCatalog {
    contracts: IndexMap<String, ContractAbi>,
}

impl AbiCatalog {
    pub fn from_combined_json(json: &str) -> Result<Self, AbiError> {
        let combined: CombinedJson = serde_json::from_str(json)?;
        let mut contracts = IndexMap::new();
        for (raw_name, attributes) in combined.contracts {
            let Some(abi) = attributes.abi else {
                continue;
            };

            // keys are formatted as <source path>:<contract name>
            let name = raw_name.rsplit(':').next().unwrap_or(&raw_name).to_owned();
            let abi = embedded_json(&name, Some(abi))?;
            let devdoc = embedded_json(&name, attributes.devdoc)?;
            let userdoc = embedded_json(&name, attributes.userdoc)?;
            let contract = ContractAbi::new(&name, &abi, userdoc, devdoc)?;
            contracts.insert(name, contract);
        }

        Ok(Self { contracts })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AbiError> {
        let content = fs::read_to_string(path)?;
        Self::from_combined_json(&content)
    }

    pub fn get_contract(&self, name: &str) -> Result<&ContractAbi, AbiError> {
        self.contracts
            .get(name)
            .ok_or_else(|| AbiError::ContractNotFound(name.to_owned()))
    }

    pub fn get_contracts(&self) -> impl Iterator<Item = &ContractAbi> {
        self.contracts.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn combined() -> String {
        let abi = json!([
            {"type": "function", "name": "transfer", "constant": false, "payable": false,
             "inputs": [{"name": "_to", "type": "address"}, {"name": "_value", "type": "uint256"}],
             "outputs": [{"name": "", "type": "bool"}]},
            {"type": "function", "name": "balanceOf", "stateMutability": "view",
             "inputs": [{"name": "_owner", "type": "address"}],
             "outputs": [{"name": "", "type": "uint256"}]},
            {"type": "function", "name": "batch", "inputs": [{"name": "ids", "type": "uint256[]"}], "outputs": []},
            {"type": "event", "name": "Transfer", "inputs": []}
        ]);
        let userdoc = json!({"methods": {"transfer(address,uint256)": {"notice": "Send tokens"}}});
        let devdoc = json!({"methods": {"transfer(address,uint256)": {"params": {"_to": "Recipient"}}}});
        json!({
            "contracts": {
                "contracts/Token.sol:Token": {
                    "abi": abi.to_string(),
                    "devdoc": devdoc.to_string(),
                    "userdoc": userdoc.to_string()
                },
                "contracts/Lib.sol:Lib": {}
            }
        })
        .to_string()
    }

    #[test]
    fn test_load_combined_json() {
        let catalog = AbiCatalog::from_combined_json(&combined()).unwrap();
        assert!(catalog.get_contract("Lib").is_err());
        let token = catalog.get_contract("Token").unwrap();

        // event and unsupported array function are skipped
        assert_eq!(token.get_functions().len(), 2);

        let transfer = token.get_function("transfer").unwrap();
        assert!(!transfer.is_read_only());
        assert_eq!(transfer.get_signature(), "transfer(address,uint256)");
        assert_eq!(transfer.get_inputs()[0].get_cli_name(), "to");
        assert_eq!(token.get_notice(transfer), Some("Send tokens"));
        assert_eq!(token.get_param_doc(transfer, "_to"), Some("Recipient"));

        let balance = token.get_function("balanceOf(address)").unwrap();
        assert!(balance.is_read_only());
        assert_eq!(token.get_notice(balance), None);
    }

    #[test]
    fn test_selectors() {
        let transfer = AbiFunction::new(
            "transfer",
            vec![
                AbiParam::new("to", AbiType::Address),
                AbiParam::new("value", AbiType::Uint(256)),
            ],
            vec![],
            false,
            false,
        );
        assert_eq!(transfer.get_selector(), &[0xa9, 0x05, 0x9c, 0xbb]);

        let balance = AbiFunction::new("balanceOf", vec![AbiParam::new("owner", AbiType::Address)], vec![], true, false);
        assert_eq!(balance.get_selector(), &[0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn test_encode_call_checks_arguments() {
        let function = AbiFunction::new(
            "setRenewable",
            vec![
                AbiParam::new("_productId", AbiType::Uint(256)),
                AbiParam::new("_newRenewable", AbiType::Bool),
            ],
            vec![],
            false,
            false,
        );

        let data = function.encode_call(&[AbiValue::from(1u64), AbiValue::Bool(true)]).unwrap();
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], function.get_selector());

        let err = function
            .encode_call(&[AbiValue::from(1u64), AbiValue::from(1u64)])
            .unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { ref name, .. } if name == "newRenewable"));
    }

    #[test]
    fn test_overloaded_lookup() {
        let abi = json!([
            {"type": "function", "name": "mint", "inputs": [], "outputs": []},
            {"type": "function", "name": "mint", "inputs": [{"name": "amount", "type": "uint256"}], "outputs": []}
        ]);
        let contract = ContractAbi::new("Token", &abi, Value::Null, Value::Null).unwrap();
        assert!(contract.is_overloaded("mint"));
        assert!(matches!(contract.get_function("mint"), Err(AbiError::AmbiguousFunction(_))));
        assert!(contract.get_function("mint(uint256)").is_ok());
    }
}
