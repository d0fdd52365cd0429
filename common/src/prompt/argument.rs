use std::collections::HashSet;

use indexmap::IndexMap;
use thiserror::Error;

use crate::abi::{AbiType, AbiValue, CodecError};

#[derive(Error, Debug)]
pub enum ArgError {
    #[error("Invalid value for argument '{}': {}", _0, _1)]
    InvalidValue(String, CodecError),
    #[error("Argument '{}' not found", _0)]
    NotFound(String),
    #[error("Flag '--{}' is not supported by this command", _0)]
    UnknownFlag(String),
}

pub struct Arg {
    name: String,
    arg_type: AbiType,
    description: String,
}

impl Arg {
    pub fn new(name: &str, arg_type: AbiType, description: &str) -> Self {
        Self {
            name: name.to_owned(),
            arg_type,
            description: description.to_owned(),
        }
    }

    pub fn get_name(&self) -> &String {
        &self.name
    }

    pub fn get_type(&self) -> &AbiType {
        &self.arg_type
    }

    pub fn get_description(&self) -> &String {
        &self.description
    }

    // Parse the raw token typed by the operator
    pub fn to_value(&self, raw: &str) -> Result<AbiValue, ArgError> {
        self.arg_type
            .parse_value(raw)
            .map_err(|e| ArgError::InvalidValue(self.name.clone(), e))
    }
}

// Parsed values of a command line, kept in declaration order
#[derive(Debug, Default)]
pub struct ArgumentManager {
    arguments: IndexMap<String, AbiValue>,
    flags: HashSet<String>,
}

impl ArgumentManager {
    pub fn new(arguments: IndexMap<String, AbiValue>, flags: HashSet<String>) -> Self {
        Self { arguments, flags }
    }

    pub fn get_arguments(&self) -> &IndexMap<String, AbiValue> {
        &self.arguments
    }

    pub fn get_value(&mut self, name: &str) -> Result<AbiValue, ArgError> {
        self.arguments
            .shift_remove(name)
            .ok_or_else(|| ArgError::NotFound(name.to_owned()))
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.arguments.contains_key(name)
    }

    // A flag is present when it was typed as --name
    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    pub fn size(&self) -> usize {
        self.arguments.len()
    }

    // Positional values in the order they were declared
    pub fn into_values(self) -> Vec<AbiValue> {
        self.arguments.into_values().collect()
    }
}
