//! # Network Module
//!
//! The submission boundary. Peers accept batches of hex-encoded
//! transactions and answer with the ids they accepted, relayed, dropped for
//! capacity, or rejected, plus a structured error per rejected transaction.
//!
//! Peer selection and HTTP transport belong to the embedding application,
//! which implements [`TransactionPool`] over whatever client it uses. This
//! crate only prepares the payload and surfaces the answer; it never
//! retries.
//!
//! [`LocalPool`] is an in-process pool that decodes and verifies
//! submissions against a [`ConfigHandle`] snapshot. It is meant for dry
//! runs and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigHandle, NetworkConfig};
use crate::transaction::{verify_transaction, Transaction, TransactionError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Why a peer rejected one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRejection {
    /// Machine-readable code, e.g. `ERR_BAD_DATA`.
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// A peer's answer to a submission. Every list holds transaction ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolResponse {
    #[serde(default)]
    pub accept: Vec<String>,
    #[serde(default)]
    pub broadcast: Vec<String>,
    #[serde(default)]
    pub invalid: Vec<String>,
    /// Dropped because the sender already has too many pooled transactions.
    #[serde(default)]
    pub excess: Vec<String>,
    #[serde(default)]
    pub errors: BTreeMap<String, PoolRejection>,
}

impl PoolResponse {
    pub fn is_fully_accepted(&self) -> bool {
        self.invalid.is_empty() && self.excess.is_empty() && self.errors.is_empty()
    }
}

/// Errors at the submission boundary.
#[derive(Debug, Error)]
pub enum PoolError {
    /// A transaction could not be serialized for submission.
    #[error("failed to encode transaction: {0}")]
    Encode(#[from] TransactionError),

    /// The collaborator could not reach a peer or read its answer.
    #[error("transport error: {0}")]
    Transport(String),
}

// ---------------------------------------------------------------------------
// TransactionPool
// ---------------------------------------------------------------------------

/// Anything that accepts serialized transactions: a peer's HTTP API, a
/// relay, a local pool.
#[async_trait]
pub trait TransactionPool: Send + Sync {
    /// Submits hex-encoded transactions and returns the peer's answer.
    async fn submit(&self, transactions: Vec<String>) -> Result<PoolResponse, PoolError>;
}

/// Serializes `transactions` and submits them as one batch.
///
/// Per-transaction rejections are logged and returned, not turned into an
/// error.
pub async fn broadcast(
    pool: &dyn TransactionPool,
    transactions: &[Transaction],
    cfg: &NetworkConfig,
) -> Result<PoolResponse, PoolError> {
    let payload = transactions
        .iter()
        .map(|tx| tx.to_hex(cfg))
        .collect::<Result<Vec<_>, _>>()?;

    info!(count = payload.len(), "submitting transactions");
    let response = pool.submit(payload).await?;

    for (id, rejection) in &response.errors {
        warn!(%id, kind = %rejection.kind, message = %rejection.message, "transaction rejected");
    }
    debug!(
        accepted = response.accept.len(),
        invalid = response.invalid.len(),
        excess = response.excess.len(),
        "submission answered"
    );
    Ok(response)
}

// ---------------------------------------------------------------------------
// LocalPool
// ---------------------------------------------------------------------------

/// In-process pool: decodes, verifies and stores submissions.
///
/// Each submission reads one configuration snapshot up front, so a
/// concurrent [`ConfigHandle::swap`] never splits a batch across two
/// configurations.
#[derive(Debug)]
pub struct LocalPool {
    config: ConfigHandle,
    accepted: Mutex<Vec<Transaction>>,
}

impl LocalPool {
    pub fn new(config: ConfigHandle) -> Self {
        Self {
            config,
            accepted: Mutex::new(Vec::new()),
        }
    }

    /// Transactions accepted so far, in submission order.
    pub fn accepted(&self) -> Vec<Transaction> {
        self.accepted.lock().clone()
    }

    fn reject(response: &mut PoolResponse, key: String, kind: &str, message: String) {
        response.invalid.push(key.clone());
        response.errors.insert(
            key,
            PoolRejection {
                kind: kind.to_string(),
                message,
            },
        );
    }
}

#[async_trait]
impl TransactionPool for LocalPool {
    async fn submit(&self, transactions: Vec<String>) -> Result<PoolResponse, PoolError> {
        let cfg = self.config.snapshot();
        let mut response = PoolResponse::default();

        for (position, hex_tx) in transactions.iter().enumerate() {
            let tx = match Transaction::from_hex(hex_tx) {
                Ok(tx) => tx,
                Err(err) => {
                    let key = position.to_string();
                    Self::reject(&mut response, key, "ERR_DESERIALIZE", err.to_string());
                    continue;
                }
            };
            let id = tx.id.clone().unwrap_or_default();

            if tx.network != cfg.version {
                warn!(%id, network = tx.network, expected = cfg.version, "wrong network");
                let message = format!("network {} does not match {}", tx.network, cfg.version);
                Self::reject(&mut response, id, "ERR_WRONG_NETWORK", message);
                continue;
            }
            if let Err(err) = verify_transaction(&tx, &cfg) {
                Self::reject(&mut response, id, "ERR_BAD_DATA", err.to_string());
                continue;
            }

            response.accept.push(id);
            self.accepted.lock().push(tx);
        }
        Ok(response)
    }
}
