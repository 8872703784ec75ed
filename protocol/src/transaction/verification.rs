//! Transaction errors and signature verification.
//!
//! [`verify_transaction`] is what a client runs before broadcasting: it
//! checks that the transaction names a supported type, that its id (if
//! computed) matches its bytes, and that every signature its policy
//! requires is present and valid. Checks run cheapest first.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::{debug, warn};

use super::builder::Transaction;
use super::signing::SkipMask;
use super::types::{TransactionType, TypeGroup};
use crate::config::NetworkConfig;
use crate::crypto::hash::sha256_hex;
use crate::crypto::keys::{KeyError, PublicKey, Signature};
use crate::crypto::signatures::SignatureScheme;
use crate::identity::address::AddressError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

fn group_label(type_group: &u32) -> &'static str {
    if TypeGroup::is_custom(*type_group) {
        "custom"
    } else {
        "core"
    }
}

/// Errors raised while building, encoding, decoding, signing or verifying
/// a transaction.
///
/// All of them abort the current operation. A threshold signature that
/// matches no participant is not an error: the append returns `false`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    /// Bad base58 checksum or wrong decoded length.
    #[error("invalid wallet address: {address}")]
    InvalidWalletAddress { address: String },

    #[error("invalid username: {username:?}")]
    InvalidUsername { username: String },

    #[error(
        "unsupported transaction type {} in {} type group {}",
        .type_code,
        group_label(.type_group),
        .type_group
    )]
    UnsupportedTransactionType { type_group: u32, type_code: u16 },

    /// Decoding ran past the end of the input.
    #[error("truncated buffer: needed {needed} bytes, {remaining} remaining")]
    TruncatedBuffer { needed: usize, remaining: usize },

    #[error("invalid transaction marker 0x{0:02x}")]
    InvalidMarker(u8),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("malformed signature: {reason}")]
    MalformedSignature { reason: String },

    #[error("sender public key is not set")]
    MissingSenderPublicKey,

    /// Nonces start at 1; signing a transaction with nonce 0 is refused.
    #[error("nonce is not set")]
    MissingNonce,

    #[error("sender nonce overflow")]
    NonceOverflow,

    #[error("transaction is unsigned")]
    MissingSignature,

    /// Bytes after the signatures that do not form threshold entries.
    #[error("signature buffer not exhausted: {remaining} bytes left")]
    SignatureBufferNotExhausted { remaining: usize },

    #[error("invalid {role} signature")]
    InvalidSignature { role: &'static str },

    #[error("insufficient threshold signatures: have {have}, need {need}")]
    InsufficientSignatures { have: usize, need: usize },

    /// Threshold signing with neither a registration asset nor a bound
    /// wallet policy.
    #[error("no multi-signature policy for this transaction")]
    MissingMultiSignatureAsset,

    #[error("asset does not match transaction type {transaction_type}")]
    AssetMismatch { transaction_type: TransactionType },

    #[error("too many entries in {field}: {count}")]
    AssetOverflow { field: &'static str, count: usize },

    #[error("amount overflow")]
    AmountOverflow,

    #[error("invalid fee tier: {0:?}")]
    InvalidFeeTier(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("transaction id mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: String, actual: String },

    #[error(transparent)]
    Key(#[from] KeyError),
}

impl From<AddressError> for TransactionError {
    fn from(err: AddressError) -> Self {
        match err {
            AddressError::InvalidWalletAddress { address } => Self::InvalidWalletAddress { address },
            AddressError::Key(key) => Self::Key(key),
        }
    }
}

// ---------------------------------------------------------------------------
// Signature checks
// ---------------------------------------------------------------------------

fn parse_signature(role: &str, hex_sig: &str) -> Result<Signature, TransactionError> {
    Signature::from_hex(hex_sig).map_err(|e| TransactionError::MalformedSignature {
        reason: format!("{role}: {e}"),
    })
}

fn sender_key(tx: &Transaction) -> Result<PublicKey, TransactionError> {
    let key = tx
        .sender_public_key
        .as_deref()
        .ok_or(TransactionError::MissingSenderPublicKey)?;
    PublicKey::from_hex(key).map_err(|_| TransactionError::InvalidPublicKey)
}

/// Checks the primary signature against the sender public key.
pub fn verify_signature(tx: &Transaction, cfg: &NetworkConfig) -> Result<(), TransactionError> {
    let signature = tx
        .signature
        .as_deref()
        .ok_or(TransactionError::MissingSignature)?;
    let signature = parse_signature("primary", signature)?;
    let sender = sender_key(tx)?;
    let message = tx.serialize(cfg, SkipMask::PRIMARY | SkipMask::SECOND)?;

    if SignatureScheme::for_network(cfg).verify(&sender, &message, &signature) {
        Ok(())
    } else {
        Err(TransactionError::InvalidSignature { role: "primary" })
    }
}

/// Checks the second signature against the wallet's second public key.
pub fn verify_second_signature(
    tx: &Transaction,
    second_public_key: &PublicKey,
    cfg: &NetworkConfig,
) -> Result<(), TransactionError> {
    let signature = tx
        .sign_signature
        .as_deref()
        .or(tx.second_signature.as_deref())
        .ok_or(TransactionError::InvalidSignature { role: "second" })?;
    let signature = parse_signature("second", signature)?;
    let message = tx.serialize(cfg, SkipMask::SECOND)?;

    if SignatureScheme::for_network(cfg).verify(second_public_key, &message, &signature) {
        Ok(())
    } else {
        Err(TransactionError::InvalidSignature { role: "second" })
    }
}

// ---------------------------------------------------------------------------
// Threshold state
// ---------------------------------------------------------------------------

/// Progress of a transaction towards its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    /// No valid participant signature yet, and `min` is above zero.
    Unsigned,
    /// Some valid signatures, fewer than `need`.
    PartiallySigned { have: usize, need: usize },
    /// At least `min` valid signatures.
    Complete,
}

/// Counts the valid participant signatures on `tx` against its threshold
/// policy. Entries that fail verification, point past the participant
/// list, or repeat an index are not counted.
pub fn multi_signature_state(
    tx: &Transaction,
    cfg: &NetworkConfig,
) -> Result<SigningState, TransactionError> {
    let policy = tx
        .multi_signature_policy()
        .ok_or(TransactionError::MissingMultiSignatureAsset)?;
    let participants = policy.participants()?;
    let message = tx.serialize(cfg, SkipMask::ALL)?;
    let scheme = SignatureScheme::for_network(cfg);

    let mut valid = BTreeSet::new();
    for entry in &tx.signatures {
        let Some((index, signature)) = entry
            .get(..2)
            .and_then(|prefix| u8::from_str_radix(prefix, 16).ok())
            .zip(entry.get(2..))
        else {
            continue;
        };
        let Some(participant) = participants.get(index as usize) else {
            continue;
        };
        let Ok(signature) = Signature::from_hex(signature) else {
            continue;
        };
        if scheme.verify(participant, &message, &signature) {
            valid.insert(index);
        } else {
            warn!(index, "invalid threshold signature");
        }
    }

    let have = valid.len();
    let need = policy.min as usize;
    Ok(match have {
        _ if have >= need => SigningState::Complete,
        0 => SigningState::Unsigned,
        _ => SigningState::PartiallySigned { have, need },
    })
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verifies a signed transaction.
///
/// The checks, in order:
///
/// 1. **Type**: `(typeGroup, type)` names a supported kind.
/// 2. **Nonce**: must be > 0.
/// 3. **Id**: if set, must equal the hash of the complete serialization.
/// 4. **Threshold**: for a threshold registration, or a sender bound to a
///    threshold wallet, at least `min` valid participant signatures.
/// 5. **Primary signature**: required unless the sender is a threshold
///    wallet; checked whenever present.
/// 6. **Second signature**: if the bound wallet has a second public key.
pub fn verify_transaction(tx: &Transaction, cfg: &NetworkConfig) -> Result<(), TransactionError> {
    let kind = tx.transaction_type()?;

    if tx.nonce == 0 {
        return Err(TransactionError::MissingNonce);
    }

    if let Some(actual) = &tx.id {
        let expected = sha256_hex(&tx.to_bytes(cfg)?);
        if &expected != actual {
            return Err(TransactionError::IdMismatch {
                expected,
                actual: actual.clone(),
            });
        }
    }

    let threshold_sender = tx.wallet().is_some_and(|wallet| wallet.is_multi_signature());
    if kind == TransactionType::MultiSignature || threshold_sender {
        match multi_signature_state(tx, cfg)? {
            SigningState::Complete => {}
            SigningState::Unsigned => {
                let need = tx
                    .multi_signature_policy()
                    .map_or(0, |policy| policy.min as usize);
                return Err(TransactionError::InsufficientSignatures { have: 0, need });
            }
            SigningState::PartiallySigned { have, need } => {
                return Err(TransactionError::InsufficientSignatures { have, need });
            }
        }
    }

    if tx.signature.is_some() || !threshold_sender {
        verify_signature(tx, cfg)?;
    }

    if let Some(second) = tx
        .wallet()
        .and_then(|wallet| wallet.attributes.second_public_key.as_deref())
    {
        let second = PublicKey::from_hex(second).map_err(|_| TransactionError::InvalidPublicKey)?;
        verify_second_signature(tx, &second, cfg)?;
    }

    debug!(kind = %kind, nonce = tx.nonce, "transaction verified");
    Ok(())
}
