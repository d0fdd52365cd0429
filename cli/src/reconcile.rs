//! Product reconciliation.
//!
//! Each desired product is compared to the product stored by the contract and
//! the minimal list of writes converging them is applied, one transaction at a
//! time. A failing product never stops the batch: its failure is recorded and
//! the next product is processed.

use std::{fmt, sync::Arc};

use dot_common::{
    abi::{AbiValue, Address},
    prompt::{colorize, Color},
};
use log::{error, info};
use primitive_types::U256;
use strum::IntoStaticStr;
use thiserror::Error;

use crate::{
    gateway::{ContractGateway, GatewayError, SendOptions},
    product::{CheckedProduct, DesiredProduct, MalformedField, OnChainProduct, QuantityError},
    tracker::{TrackerError, TransactionReceipt, TransactionTracker},
};

// Read function used to fetch a product
pub const PRODUCT_INFO: &str = "productInfo";

// Every function the engine depends on, checked once before the batch
pub const REQUIRED_FUNCTIONS: [&str; 6] = [
    PRODUCT_INFO,
    "createProduct",
    "setPrice",
    "setRenewable",
    "incrementInventory",
    "decrementInventory",
];

#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum ProductWrite {
    CreateProduct {
        product_id: U256,
        price: U256,
        initial_inventory_quantity: U256,
        supply: U256,
        interval: U256,
    },
    SetPrice { product_id: U256, price: U256 },
    SetRenewable { product_id: U256, renewable: bool },
    IncrementInventory { product_id: U256, amount: U256 },
    DecrementInventory { product_id: U256, amount: U256 },
}

impl ProductWrite {
    pub fn function_name(&self) -> &'static str {
        self.into()
    }

    // Positional arguments of the contract function
    pub fn arguments(&self) -> Vec<AbiValue> {
        match *self {
            Self::CreateProduct {
                product_id,
                price,
                initial_inventory_quantity,
                supply,
                interval,
            } => vec![
                product_id.into(),
                price.into(),
                initial_inventory_quantity.into(),
                supply.into(),
                interval.into(),
            ],
            Self::SetPrice { product_id, price } => vec![product_id.into(), price.into()],
            Self::SetRenewable { product_id, renewable } => vec![product_id.into(), renewable.into()],
            Self::IncrementInventory { product_id, amount } | Self::DecrementInventory { product_id, amount } => {
                vec![product_id.into(), amount.into()]
            }
        }
    }
}

impl fmt::Display for ProductWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.arguments().iter().map(|v| v.to_string()).collect();
        write!(f, "{}({})", self.function_name(), args.join(", "))
    }
}

// Ordered writes converging one product
pub type ReconciliationPlan = Vec<ProductWrite>;

// Compute the writes needed for the on-chain product to match the desired one
pub fn plan(desired: &CheckedProduct, on_chain: &OnChainProduct) -> Result<ReconciliationPlan, MalformedField> {
    let product_id = desired.product_id;

    if on_chain.is_absent() {
        let required = |value: Option<U256>, field: &'static str| {
            value.ok_or(MalformedField {
                field,
                reason: QuantityError::Missing,
            })
        };

        return Ok(vec![ProductWrite::CreateProduct {
            product_id,
            price: desired.price,
            initial_inventory_quantity: required(desired.initial_inventory_quantity, "initialInventoryQuantity")?,
            supply: required(desired.supply, "supply")?,
            interval: required(desired.interval, "interval")?,
        }]);
    }

    let mut writes = Vec::new();
    if desired.price != on_chain.price {
        writes.push(ProductWrite::SetPrice {
            product_id,
            price: desired.price,
        });
    }

    if desired.renewable != on_chain.renewable {
        writes.push(ProductWrite::SetRenewable {
            product_id,
            renewable: desired.renewable,
        });
    }

    if let Some(inventory) = desired.inventory {
        if inventory > on_chain.inventory {
            writes.push(ProductWrite::IncrementInventory {
                product_id,
                amount: inventory - on_chain.inventory,
            });
        } else if inventory < on_chain.inventory {
            writes.push(ProductWrite::DecrementInventory {
                product_id,
                amount: on_chain.inventory - inventory,
            });
        }
    }

    Ok(writes)
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Malformed desired product: {}", _0)]
    MalformedDesiredRecord(#[from] MalformedField),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("{} failed: {}", operation, source)]
    Transaction {
        operation: &'static str,
        source: TrackerError,
    },
    #[error("Unexpected productInfo result: {}", _0)]
    UnexpectedProductInfo(String),
    #[error("Product {} failed after {} applied writes: {}", product_id, applied, source)]
    RecordReconciliationFailed {
        product_id: String,
        applied: usize,
        source: Box<ReconcileError>,
    },
}

#[derive(Debug, Clone)]
pub struct AppliedWrite {
    pub write: ProductWrite,
    pub receipt: TransactionReceipt,
}

#[derive(Debug)]
pub enum RecordStatus {
    Created,
    Updated,
    UpToDate,
    Failed(ReconcileError),
}

#[derive(Debug)]
pub struct RecordOutcome {
    pub product: String,
    pub applied: Vec<AppliedWrite>,
    pub status: RecordStatus,
}

impl RecordOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, RecordStatus::Failed(_))
    }

    // Some writes went through before the failure
    pub fn is_partially_failed(&self) -> bool {
        self.is_failed() && !self.applied.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ReconciliationReport {
    pub outcomes: Vec<RecordOutcome>,
}

impl ReconciliationReport {
    fn count(&self, predicate: impl Fn(&RecordStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }

    pub fn created(&self) -> usize {
        self.count(|s| matches!(s, RecordStatus::Created))
    }

    pub fn updated(&self) -> usize {
        self.count(|s| matches!(s, RecordStatus::Updated))
    }

    pub fn up_to_date(&self) -> usize {
        self.count(|s| matches!(s, RecordStatus::UpToDate))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, RecordStatus::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn log_summary(&self) {
        if log::log_enabled!(log::Level::Info) {
            info!(
                "Synchronized {} products: {} created, {} updated, {} up-to-date, {} failed",
                self.outcomes.len(),
                self.created(),
                self.updated(),
                self.up_to_date(),
                if self.has_failures() {
                    colorize(Color::Red, self.failed())
                } else {
                    self.failed().to_string()
                }
            );
        }
    }
}

pub struct Reconciler {
    gateway: Arc<ContractGateway>,
    tracker: TransactionTracker,
    options: SendOptions,
}

impl Reconciler {
    // Fails when the batch cannot start at all: missing contract functions or no sender
    pub async fn new(
        gateway: Arc<ContractGateway>,
        tracker: TransactionTracker,
        from: Option<Address>,
        gas_price: Option<U256>,
        gas_limit: Option<U256>,
    ) -> Result<Self, ReconcileError> {
        gateway.require_functions(&REQUIRED_FUNCTIONS)?;
        let from = gateway.resolve_sender(from).await?;

        let mut options = SendOptions::new(from);
        options.gas_price = gas_price;
        options.gas_limit = gas_limit;

        Ok(Self {
            gateway,
            tracker,
            options,
        })
    }

    pub fn get_send_options(&self) -> &SendOptions {
        &self.options
    }

    // Reconcile all the products, strictly one after the other
    pub async fn reconcile(&self, products: &[DesiredProduct], include_inventory: bool) -> ReconciliationReport {
        if log::log_enabled!(log::Level::Info) {
            info!("Syncing {} products...", products.len());
        }

        let mut report = ReconciliationReport::default();
        for product in products {
            report
                .outcomes
                .push(self.reconcile_record(product, include_inventory).await);
        }

        report
    }

    async fn reconcile_record(&self, product: &DesiredProduct, include_inventory: bool) -> RecordOutcome {
        let label = product.get_label();
        let mut snapshot = None;
        let mut applied = Vec::new();

        let status = match self
            .apply(product, include_inventory, &mut snapshot, &mut applied)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                if log::log_enabled!(log::Level::Error) {
                    error!(
                        "{} product {}: {}\ndesired: {}\non-chain: {}",
                        colorize(Color::Red, "Failed to sync"),
                        label,
                        e,
                        product,
                        snapshot
                            .as_ref()
                            .map(|p: &OnChainProduct| p.to_string())
                            .unwrap_or_else(|| "unknown".to_owned())
                    );
                }

                RecordStatus::Failed(ReconcileError::RecordReconciliationFailed {
                    product_id: label.clone(),
                    applied: applied.len(),
                    source: Box::new(e),
                })
            }
        };

        RecordOutcome {
            product: label,
            applied,
            status,
        }
    }

    async fn apply(
        &self,
        product: &DesiredProduct,
        include_inventory: bool,
        snapshot: &mut Option<OnChainProduct>,
        applied: &mut Vec<AppliedWrite>,
    ) -> Result<RecordStatus, ReconcileError> {
        let desired = product.check(include_inventory)?;

        let values = self
            .gateway
            .call(PRODUCT_INFO, &[desired.product_id.into()])
            .await?;
        let on_chain = OnChainProduct::from_values(&values)
            .ok_or_else(|| ReconcileError::UnexpectedProductInfo(format!("{:?}", values)))?;
        let absent = on_chain.is_absent();
        *snapshot = Some(on_chain.clone());

        let writes = plan(&desired, &on_chain)?;

        if writes.is_empty() {
            if log::log_enabled!(log::Level::Info) {
                info!("Product {} is {}", product.get_label(), colorize(Color::Green, "up-to-date"));
            }
            return Ok(RecordStatus::UpToDate);
        }

        for write in writes {
            let operation = write.function_name();
            if log::log_enabled!(log::Level::Info) {
                info!("{} {} for product {}", colorize(Color::Blue, "Sending"), write, product.get_label());
            }

            let pending = self
                .gateway
                .send(operation, &write.arguments(), &self.options)
                .await?;
            let receipt = self
                .tracker
                .track(pending)
                .await
                .map_err(|source| ReconcileError::Transaction { operation, source })?;

            if log::log_enabled!(log::Level::Info) {
                info!(
                    "{} {} for product {}: {}",
                    colorize(Color::Green, "Applied"),
                    operation,
                    product.get_label(),
                    receipt.transaction_hash
                );
            }
            applied.push(AppliedWrite { write, receipt });
        }

        Ok(if absent {
            RecordStatus::Created
        } else {
            RecordStatus::Updated
        })
    }
}
