use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use dot_common::{
    abi::{AbiFunction, AbiValue, Address},
    rpc::JsonRpcClient,
    tokio::{spawn_task, time::sleep},
};
use log::{debug, trace};
use primitive_types::U256;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    gateway::{ContractHandle, SendOptions},
    tracker::{LifecycleNotifier, PendingTransaction, TransactionReceipt, TxHash},
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CallRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a Address>,
    to: &'a Address,
    data: String,
}

#[derive(Serialize)]
struct TransactionRequest<'a> {
    #[serde(flatten)]
    options: &'a SendOptions,
    to: &'a Address,
    data: String,
}

fn encode_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn decode_data(data: &str) -> Result<Vec<u8>> {
    let raw = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(raw).context("Invalid hex data returned by the provider")
}

// Contract reached through a JSON-RPC node that signs with its own accounts
pub struct RpcContract {
    client: Arc<JsonRpcClient>,
    address: Address,
    poll_interval: Duration,
    confirmations: u64,
}

impl RpcContract {
    pub fn new(client: Arc<JsonRpcClient>, address: Address, poll_interval: Duration, confirmations: u64) -> Self {
        Self {
            client,
            address,
            poll_interval,
            confirmations,
        }
    }

    // Network id reported by the node
    pub async fn network_id(&self) -> Result<String> {
        let id: String = self.client.call("net_version", json!([])).await?;
        Ok(id)
    }
}

#[async_trait]
impl ContractHandle for RpcContract {
    fn get_address(&self) -> &Address {
        &self.address
    }

    async fn call(&self, function: &AbiFunction, args: &[AbiValue]) -> Result<Vec<AbiValue>> {
        let data = function.encode_call(args)?;
        let request = CallRequest {
            from: None,
            to: &self.address,
            data: encode_data(&data),
        };

        let result: String = self
            .client
            .call("eth_call", json!([request, "latest"]))
            .await
            .with_context(|| format!("Error while calling {}", function.get_signature()))?;

        let values = function.decode_output(&decode_data(&result)?)?;
        Ok(values)
    }

    async fn send(&self, function: &AbiFunction, args: &[AbiValue], options: &SendOptions) -> Result<PendingTransaction> {
        let data = function.encode_call(args)?;
        let request = serde_json::to_value(TransactionRequest {
            options,
            to: &self.address,
            data: encode_data(&data),
        })?;

        let (notifier, pending) = PendingTransaction::channel();
        let client = Arc::clone(&self.client);
        let poll_interval = self.poll_interval;
        let confirmations = self.confirmations;
        let name = format!("send-{}", function.get_name());
        spawn_task(name, async move {
            drive_transaction(client, request, notifier, poll_interval, confirmations).await;
        });

        Ok(pending)
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        let accounts: Vec<Address> = self.client.call("eth_accounts", json!([])).await?;
        Ok(accounts)
    }
}

// Submit the transaction and report each step of its lifecycle
async fn drive_transaction(
    client: Arc<JsonRpcClient>,
    request: Value,
    mut notifier: LifecycleNotifier,
    poll_interval: Duration,
    confirmations: u64,
) {
    let hash: TxHash = match client.call("eth_sendTransaction", json!([request])).await {
        Ok(hash) => hash,
        Err(e) => {
            notifier.error(e.to_string());
            return;
        }
    };

    if !notifier.hash_assigned(hash) {
        return;
    }

    let receipt = loop {
        if notifier.is_closed() {
            if log::log_enabled!(log::Level::Debug) {
                debug!("Nobody waits for {} anymore, stop polling", hash);
            }
            return;
        }

        match client
            .call_optional::<_, TransactionReceipt>("eth_getTransactionReceipt", json!([hash]))
            .await
        {
            Ok(Some(receipt)) => break receipt,
            Ok(None) => {
                if log::log_enabled!(log::Level::Trace) {
                    trace!("No receipt yet for {}", hash);
                }
            }
            Err(e) => {
                notifier.error(e.to_string());
                return;
            }
        }
        sleep(poll_interval).await;
    };

    if !receipt.is_success() {
        notifier.error(format!("transaction {} was reverted", hash));
        return;
    }

    let mined_at = match receipt.block_number {
        Some(number) => number,
        None => {
            notifier.receipt_available(receipt);
            return;
        }
    };

    if !notifier.receipt_available(receipt.clone()) {
        return;
    }

    let mut count = 0;
    while count < confirmations && !notifier.is_closed() {
        sleep(poll_interval).await;
        let block: U256 = match client.call("eth_blockNumber", json!([])).await {
            Ok(block) => block,
            Err(e) => {
                if log::log_enabled!(log::Level::Debug) {
                    debug!("Cannot fetch block number for confirmations of {}: {}", hash, e);
                }
                return;
            }
        };

        let depth = confirmation_depth(block, mined_at);
        while count < depth.min(confirmations) {
            count += 1;
            if !notifier.confirmation(count, receipt.clone()) {
                return;
            }
        }
    }
}

// Blocks mined on top of the receipt's block: the receipt block itself is
// confirmation 0, as web3 numbers them
pub fn confirmation_depth(block: U256, mined_at: U256) -> u64 {
    let depth = block.saturating_sub(mined_at);
    if depth > U256::from(u64::MAX) {
        u64::MAX
    } else {
        depth.low_u64()
    }
}

pub fn parse_network_id(raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| anyhow!("Invalid network id '{}' returned by the provider", raw))
}
