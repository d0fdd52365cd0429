#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use dot_common::abi::{AbiFunction, AbiValue, Address, ContractAbi};
use dot_license_cli::{
    gateway::{ContractGateway, ContractHandle, SendOptions},
    product::{DesiredProduct, OnChainProduct, Quantity},
    tracker::{LifecycleNotifier, PendingTransaction, TransactionReceipt, TxHash},
};
use primitive_types::{H256, U256};
use serde_json::{json, Value};

pub fn license_core_abi() -> Value {
    let uint = |name: &str| json!({"name": name, "type": "uint256"});
    json!([
        {"type": "function", "name": "productInfo", "constant": true,
         "inputs": [uint("_productId")],
         "outputs": [uint("price"), uint("inventory"), uint("supply"), uint("interval"),
                     {"name": "renewable", "type": "bool"}]},
        {"type": "function", "name": "createProduct",
         "inputs": [uint("_productId"), uint("_initialPrice"), uint("_initialInventoryQuantity"),
                    uint("_supply"), uint("_interval")], "outputs": []},
        {"type": "function", "name": "setPrice", "inputs": [uint("_productId"), uint("_price")], "outputs": []},
        {"type": "function", "name": "setRenewable",
         "inputs": [uint("_productId"), {"name": "_isRenewable", "type": "bool"}], "outputs": []},
        {"type": "function", "name": "incrementInventory", "inputs": [uint("_productId"), uint("_inventoryAdjustment")], "outputs": []},
        {"type": "function", "name": "decrementInventory", "inputs": [uint("_productId"), uint("_inventoryAdjustment")], "outputs": []},
        {"type": "function", "name": "paused", "constant": true, "inputs": [], "outputs": [{"name": "", "type": "bool"}]},
        {"type": "function", "name": "setCEO", "inputs": [{"name": "_newCEO", "type": "address"}], "outputs": []}
    ])
}

pub fn license_core_userdoc() -> Value {
    json!({"methods": {
        "productInfo(uint256)": {"notice": "Get the info of a product"},
        "setPrice(uint256,uint256)": {"notice": "Set the price of a product"},
        "setCEO(address)": {"notice": "Sets the CEO"}
    }})
}

pub fn license_core() -> ContractAbi {
    ContractAbi::new("LicenseCore", &license_core_abi(), license_core_userdoc(), Value::Null).unwrap()
}

pub fn sender() -> Address {
    Address::new([0xaa; 20])
}

pub fn receipt(id: u64) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: TxHash(H256::from_low_u64_be(id)),
        block_hash: None,
        block_number: Some(U256::from(id)),
        gas_used: Some(U256::from(21_000)),
        status: Some(U256::one()),
        logs: Vec::new(),
    }
}

pub fn product(id: u64, price: u64) -> DesiredProduct {
    DesiredProduct {
        product_id: Quantity::from(id),
        price: Quantity::from(price),
        initial_inventory_quantity: Quantity::from(10u64),
        supply: Quantity::from(100u64),
        interval: Quantity::from(0u64),
        ..Default::default()
    }
}

pub fn stored(price: u64, inventory: u64, renewable: bool) -> OnChainProduct {
    OnChainProduct {
        price: U256::from(price),
        inventory: U256::from(inventory),
        supply: U256::from(100),
        interval: U256::zero(),
        renewable,
    }
}

// In-memory LicenseCore contract
#[derive(Default)]
pub struct MockLicenseCore {
    address: Address,
    pub accounts: Vec<Address>,
    pub products: Mutex<HashMap<U256, OnChainProduct>>,
    // (product id, function name) pairs reverting when sent
    failures: Mutex<HashSet<(U256, String)>>,
    // product ids whose lookup fails
    unreachable: Mutex<HashSet<U256>>,
    // (product id, function name) pairs whose receipt never comes
    stalled: Mutex<HashSet<(U256, String)>>,
    pub writes: Mutex<Vec<(String, Vec<AbiValue>)>>,
    pub calls: AtomicU64,
    next_hash: AtomicU64,
    // keeps the stalled transactions pending
    stalled_notifiers: Mutex<Vec<LifecycleNotifier>>,
}

impl MockLicenseCore {
    pub fn new() -> Self {
        Self {
            address: Address::new([0x11; 20]),
            accounts: vec![sender()],
            ..Default::default()
        }
    }

    pub fn without_accounts() -> Self {
        Self {
            accounts: Vec::new(),
            ..Self::new()
        }
    }

    pub fn with_product(self, id: u64, product: OnChainProduct) -> Self {
        self.products.lock().unwrap().insert(U256::from(id), product);
        self
    }

    pub fn fail_on(&self, id: u64, function: &str) {
        self.failures.lock().unwrap().insert((U256::from(id), function.to_owned()));
    }

    pub fn stall_on(&self, id: u64, function: &str) {
        self.stalled.lock().unwrap().insert((U256::from(id), function.to_owned()));
    }

    pub fn unreachable(&self, id: u64) {
        self.unreachable.lock().unwrap().insert(U256::from(id));
    }

    pub fn get_product(&self, id: u64) -> Option<OnChainProduct> {
        self.products.lock().unwrap().get(&U256::from(id)).cloned()
    }

    pub fn write_names(&self) -> Vec<String> {
        self.writes.lock().unwrap().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    fn apply(&self, name: &str, args: &[AbiValue]) -> Result<()> {
        if name == "setCEO" {
            return match args.first() {
                Some(AbiValue::Address(_)) => Ok(()),
                _ => Err(anyhow!("bad address")),
            };
        }

        let uint = |i: usize| args.get(i).and_then(AbiValue::as_uint).ok_or_else(|| anyhow!("bad argument {}", i));
        let id = uint(0)?;
        let mut products = self.products.lock().unwrap();
        match name {
            "createProduct" => {
                if products.contains_key(&id) {
                    bail!("product {} already exists", id);
                }
                products.insert(
                    id,
                    OnChainProduct {
                        price: uint(1)?,
                        inventory: uint(2)?,
                        supply: uint(3)?,
                        interval: uint(4)?,
                        renewable: false,
                    },
                );
            }
            other => {
                let product = products.get_mut(&id).ok_or_else(|| anyhow!("product {} does not exist", id))?;
                match other {
                    "setPrice" => product.price = uint(1)?,
                    "setRenewable" => {
                        product.renewable = args.get(1).and_then(AbiValue::as_bool).ok_or_else(|| anyhow!("bad flag"))?
                    }
                    "incrementInventory" => product.inventory += uint(1)?,
                    "decrementInventory" => {
                        product.inventory = product
                            .inventory
                            .checked_sub(uint(1)?)
                            .ok_or_else(|| anyhow!("inventory underflow"))?
                    }
                    _ => bail!("unknown function {}", other),
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ContractHandle for MockLicenseCore {
    fn get_address(&self) -> &Address {
        &self.address
    }

    async fn call(&self, function: &AbiFunction, args: &[AbiValue]) -> Result<Vec<AbiValue>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let id = args.first().and_then(AbiValue::as_uint).ok_or_else(|| anyhow!("missing product id"))?;
        if function.get_name() != "productInfo" {
            bail!("unexpected call to {}", function.get_signature());
        }
        if self.unreachable.lock().unwrap().contains(&id) {
            bail!("connection refused");
        }

        let product = self.products.lock().unwrap().get(&id).cloned().unwrap_or_default();
        Ok(vec![
            product.price.into(),
            product.inventory.into(),
            product.supply.into(),
            product.interval.into(),
            product.renewable.into(),
        ])
    }

    async fn send(&self, function: &AbiFunction, args: &[AbiValue], _: &SendOptions) -> Result<PendingTransaction> {
        let name = function.get_name().clone();
        let id = args.first().and_then(AbiValue::as_uint).unwrap_or_default();
        let key = (id, name.clone());
        let hash_id = self.next_hash.fetch_add(1, Ordering::SeqCst) + 1;

        let (mut notifier, pending) = PendingTransaction::channel();
        notifier.hash_assigned(TxHash(H256::from_low_u64_be(hash_id)));

        if self.failures.lock().unwrap().contains(&key) {
            notifier.error("VM Exception while processing transaction: revert");
            return Ok(pending);
        }

        if self.stalled.lock().unwrap().contains(&key) {
            self.stalled_notifiers.lock().unwrap().push(notifier);
            return Ok(pending);
        }

        match self.apply(&name, args) {
            Ok(()) => {
                self.writes.lock().unwrap().push((name, args.to_vec()));
                notifier.receipt_available(receipt(hash_id));
            }
            Err(e) => {
                notifier.error(e.to_string());
            }
        }

        Ok(pending)
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.accounts.clone())
    }
}

pub fn gateway(mock: &Arc<MockLicenseCore>) -> Arc<ContractGateway> {
    Arc::new(ContractGateway::new(mock.clone(), license_core(), false))
}
