//! Turns the lifecycle notifications of a submitted transaction into a single
//! awaited outcome.
//!
//! A [`PendingTransaction`] is a stream of [`TransactionEvent`]s. The tracker
//! arms its timer when the transaction hash is first seen, resolves on the
//! receipt or on the first error, and drops everything that comes after.

use std::{fmt, time::Duration};

use dot_common::{
    prompt::{colorize, Color},
    tokio::{
        select,
        sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
        time::{sleep_until, Instant},
    },
};
use log::{debug, error, info, warn};
use primitive_types::{H256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// Receipt wait applied when none is configured
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_millis(30_000);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub H256);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_bytes()))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    #[serde(default)]
    pub block_hash: Option<H256>,
    #[serde(default)]
    pub block_number: Option<U256>,
    #[serde(default)]
    pub gas_used: Option<U256>,
    #[serde(default)]
    pub status: Option<U256>,
    #[serde(default)]
    pub logs: Vec<Value>,
}

impl TransactionReceipt {
    // Pre-byzantium receipts carry no status
    pub fn is_success(&self) -> bool {
        self.status.map_or(true, |status| !status.is_zero())
    }
}

#[derive(Debug, Clone)]
pub enum TransactionEvent {
    HashAssigned(TxHash),
    ReceiptAvailable(TransactionReceipt),
    Confirmation { count: u64, receipt: TransactionReceipt },
    Error(String),
}

// Producer side of a pending transaction
pub struct LifecycleNotifier {
    sender: UnboundedSender<TransactionEvent>,
    hash_sent: bool,
    receipt_sent: bool,
}

impl LifecycleNotifier {
    // Returns false when the hash was already notified or nobody listens anymore
    pub fn hash_assigned(&mut self, hash: TxHash) -> bool {
        if self.hash_sent {
            return false;
        }
        self.hash_sent = true;
        self.sender.send(TransactionEvent::HashAssigned(hash)).is_ok()
    }

    pub fn receipt_available(&mut self, receipt: TransactionReceipt) -> bool {
        if self.receipt_sent {
            return false;
        }
        self.receipt_sent = true;
        self.sender.send(TransactionEvent::ReceiptAvailable(receipt)).is_ok()
    }

    pub fn confirmation(&self, count: u64, receipt: TransactionReceipt) -> bool {
        self.sender
            .send(TransactionEvent::Confirmation { count, receipt })
            .is_ok()
    }

    pub fn error<S: Into<String>>(&self, message: S) -> bool {
        self.sender.send(TransactionEvent::Error(message.into())).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// Handle returned by a write, consumed by the tracker
pub struct PendingTransaction {
    events: UnboundedReceiver<TransactionEvent>,
}

impl PendingTransaction {
    pub fn channel() -> (LifecycleNotifier, Self) {
        let (sender, events) = unbounded_channel();
        let notifier = LifecycleNotifier {
            sender,
            hash_sent: false,
            receipt_sent: false,
        };
        (notifier, Self { events })
    }

    pub fn from_receiver(events: UnboundedReceiver<TransactionEvent>) -> Self {
        Self { events }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Transaction {} has no receipt after {:?}, it may still be mined", hash, waited)]
    Timeout { hash: TxHash, waited: Duration },
    #[error("Transaction error: {}", _0)]
    TransactionError(String),
}

pub type TransactionOutcome = Result<TransactionReceipt, TrackerError>;

// Await the terminal outcome of a pending transaction
// The timeout starts when the hash is assigned, no timer runs before that
pub async fn submit_and_track(mut pending: PendingTransaction, timeout: Duration) -> TransactionOutcome {
    let mut deadline: Option<(TxHash, Instant)> = None;

    loop {
        let event = match &deadline {
            None => pending.events.recv().await,
            Some((hash, at)) => {
                select! {
                    biased;
                    event = pending.events.recv() => event,
                    _ = sleep_until(*at) => {
                        if log::log_enabled!(log::Level::Warn) {
                            warn!("Transaction {} timed out after {:?}", colorize(Color::Yellow, hash), timeout);
                        }
                        return Err(TrackerError::Timeout { hash: *hash, waited: timeout });
                    }
                }
            }
        };

        match event {
            Some(TransactionEvent::HashAssigned(hash)) => {
                if deadline.is_some() {
                    if log::log_enabled!(log::Level::Debug) {
                        debug!("Ignoring duplicated hash notification {}", hash);
                    }
                    continue;
                }

                if log::log_enabled!(log::Level::Info) {
                    info!("Transaction hash: {}", colorize(Color::Green, hash));
                }
                deadline = Some((hash, Instant::now() + timeout));
            }
            Some(TransactionEvent::ReceiptAvailable(receipt)) => {
                if log::log_enabled!(log::Level::Info) {
                    info!(
                        "Receipt received for {} in block {}",
                        colorize(Color::Green, receipt.transaction_hash),
                        receipt
                            .block_number
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| "?".to_owned())
                    );
                }
                return Ok(receipt);
            }
            Some(TransactionEvent::Confirmation { count, receipt }) => {
                if log::log_enabled!(log::Level::Debug) {
                    debug!("Confirmation #{} for {}", count, receipt.transaction_hash);
                }
            }
            Some(TransactionEvent::Error(message)) => {
                if log::log_enabled!(log::Level::Error) {
                    error!("Transaction error: {}", colorize(Color::Red, &message));
                }
                return Err(TrackerError::TransactionError(message));
            }
            None => {
                return Err(TrackerError::TransactionError(
                    "lifecycle stream ended without a receipt".to_owned(),
                ));
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransactionTracker {
    timeout: Duration,
}

impl Default for TransactionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_RECEIPT_TIMEOUT)
    }
}

impl TransactionTracker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn get_timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn track(&self, pending: PendingTransaction) -> TransactionOutcome {
        submit_and_track(pending, self.timeout).await
    }
}

#[cfg(test)]
pub(crate) fn test_receipt(byte: u8) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: TxHash(H256::repeat_byte(byte)),
        block_hash: None,
        block_number: Some(U256::from(1)),
        gas_used: None,
        status: Some(U256::one()),
        logs: Vec::new(),
    }
}
