use std::{fmt, fs, path::Path};

use dot_common::abi::{parse_u256, AbiValue};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("is missing")]
    Missing,
    #[error("is negative")]
    Negative,
    #[error("is not an integer")]
    NotAnInteger,
    #[error("is not a number")]
    NotNumeric,
    #[error("is too large for a JSON number, write it as a decimal string")]
    Imprecise,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("field '{}' {}", field, reason)]
pub struct MalformedField {
    pub field: &'static str,
    pub reason: QuantityError,
}

#[derive(Debug, Error)]
pub enum ProductFileError {
    #[error("Cannot read products file: {}", _0)]
    Io(#[from] std::io::Error),
    #[error("Invalid products file: {}", _0)]
    Json(#[from] serde_json::Error),
}

// Largest integer a JSON number holds exactly once parsed as f64
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

// Amount as written in the products file: a JSON number or a numeric string
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(pub Value);

impl Quantity {
    pub fn is_present(&self) -> bool {
        !self.0.is_null()
    }

    fn is_absent(&self) -> bool {
        self.0.is_null()
    }

    pub fn to_u256(&self) -> Result<U256, QuantityError> {
        match &self.0 {
            Value::Null => Err(QuantityError::Missing),
            Value::Number(n) => {
                if let Some(v) = n.as_u64() {
                    Ok(U256::from(v))
                } else if n.as_i64().is_some() {
                    Err(QuantityError::Negative)
                } else {
                    let v = n.as_f64().ok_or(QuantityError::NotNumeric)?;
                    if !v.is_finite() {
                        Err(QuantityError::NotNumeric)
                    } else if v < 0.0 {
                        Err(QuantityError::Negative)
                    } else if v.fract() != 0.0 {
                        Err(QuantityError::NotAnInteger)
                    } else if v > MAX_EXACT_FLOAT {
                        Err(QuantityError::Imprecise)
                    } else {
                        U256::from_dec_str(&format!("{:.0}", v)).map_err(|_| QuantityError::NotNumeric)
                    }
                }
            }
            Value::String(s) => {
                let s = s.trim();
                if let Some(v) = parse_u256(s) {
                    return Ok(v);
                }

                let digits = s.strip_prefix('-').unwrap_or(s);
                let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));
                let numeric = !int.is_empty()
                    && int.chars().all(|c| c.is_ascii_digit())
                    && frac.chars().all(|c| c.is_ascii_digit());
                if !numeric {
                    Err(QuantityError::NotNumeric)
                } else if s.starts_with('-') {
                    Err(QuantityError::Negative)
                } else {
                    Err(QuantityError::NotAnInteger)
                }
            }
            _ => Err(QuantityError::NotNumeric),
        }
    }

    fn checked(&self, field: &'static str) -> Result<U256, MalformedField> {
        self.to_u256().map_err(|reason| MalformedField { field, reason })
    }

    // None when absent, error when present but malformed
    fn checked_optional(&self, field: &'static str) -> Result<Option<U256>, MalformedField> {
        if self.is_present() {
            self.checked(field).map(Some)
        } else {
            Ok(None)
        }
    }
}

impl From<u64> for Quantity {
    fn from(value: u64) -> Self {
        Self(Value::from(value))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other),
        }
    }
}

// A product as declared by the operator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredProduct {
    #[serde(default)]
    pub product_id: Quantity,
    #[serde(default)]
    pub price: Quantity,
    #[serde(default)]
    pub initial_inventory_quantity: Quantity,
    #[serde(default)]
    pub supply: Quantity,
    #[serde(default)]
    pub interval: Quantity,
    #[serde(default, skip_serializing_if = "Quantity::is_absent")]
    pub inventory: Quantity,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DesiredProduct {
    // Validate the amounts before anything is sent
    // Creation-only fields are checked when a creation is planned
    pub fn check(&self, include_inventory: bool) -> Result<CheckedProduct, MalformedField> {
        let inventory = if include_inventory {
            self.inventory.checked_optional("inventory")?
        } else {
            None
        };

        Ok(CheckedProduct {
            product_id: self.product_id.checked("productId")?,
            price: self.price.checked("price")?,
            renewable: self.renewable,
            inventory,
            initial_inventory_quantity: self
                .initial_inventory_quantity
                .checked_optional("initialInventoryQuantity")?,
            supply: self.supply.checked_optional("supply")?,
            interval: self.interval.checked_optional("interval")?,
        })
    }

    pub fn get_label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", self.product_id, name),
            None => self.product_id.to_string(),
        }
    }
}

impl fmt::Display for DesiredProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

// Desired product with validated amounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedProduct {
    pub product_id: U256,
    pub price: U256,
    pub renewable: bool,
    // Only set when inventory is synchronized and declared
    pub inventory: Option<U256>,
    pub initial_inventory_quantity: Option<U256>,
    pub supply: Option<U256>,
    pub interval: Option<U256>,
}

// Product as stored by the contract, returned by productInfo(uint256)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OnChainProduct {
    pub price: U256,
    pub inventory: U256,
    pub supply: U256,
    pub interval: U256,
    pub renewable: bool,
}

impl OnChainProduct {
    pub fn from_values(values: &[AbiValue]) -> Option<Self> {
        match values {
            [price, inventory, supply, interval, renewable] => Some(Self {
                price: price.as_uint()?,
                inventory: inventory.as_uint()?,
                supply: supply.as_uint()?,
                interval: interval.as_uint()?,
                renewable: renewable.as_bool()?,
            }),
            _ => None,
        }
    }

    // Unknown ids read back as all zero values
    pub fn is_absent(&self) -> bool {
        self.price.is_zero()
            && self.inventory.is_zero()
            && self.supply.is_zero()
            && self.interval.is_zero()
            && !self.renewable
    }
}

impl fmt::Display for OnChainProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{price: {}, inventory: {}, supply: {}, interval: {}, renewable: {}}}",
            self.price, self.inventory, self.supply, self.interval, self.renewable
        )
    }
}

pub fn load_products<P: AsRef<Path>>(path: P) -> Result<Vec<DesiredProduct>, ProductFileError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
