//! The signature envelope and the signing roles.
//!
//! Signatures trail the asset in a fixed order:
//!
//! ```text
//! primary [64] | second [64] | (index u8 || signature [64])*
//! ```
//!
//! Each role signs a serialization that leaves out its own section and
//! every section computed after it, selected with a [`SkipMask`]:
//!
//! | Role | Skipped sections |
//! |---|---|
//! | primary | primary, second |
//! | second | second |
//! | threshold participant | all |
//!
//! So the second signer commits to the primary signature, and participants
//! never see each other's signatures. Signers hash the message with SHA-256
//! before signing.

use std::fmt;
use std::ops::BitOr;

use tracing::{debug, warn};

use super::builder::Transaction;
use super::codec::{ByteReader, ByteWriter};
use super::verification::TransactionError;
use crate::config::{NetworkConfig, MULTI_SIGNATURE_ENTRY_LENGTH, SIGNATURE_LENGTH};
use crate::crypto::hash::sha256_hex;
use crate::crypto::keys::{PublicKey, Signature};
use crate::crypto::signatures::{SignatureScheme, TransactionSigner};

// ---------------------------------------------------------------------------
// SkipMask
// ---------------------------------------------------------------------------

/// Signature sections to leave out of a serialization.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SkipMask(u8);

impl SkipMask {
    pub const NONE: Self = Self(0);
    pub const PRIMARY: Self = Self(1);
    pub const SECOND: Self = Self(1 << 1);
    pub const MULTI: Self = Self(1 << 2);
    pub const ALL: Self = Self(0b111);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SkipMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for SkipMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::PRIMARY, "PRIMARY"),
            (Self::SECOND, "SECOND"),
            (Self::MULTI, "MULTI"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();
        write!(f, "SkipMask({})", names.join("|"))
    }
}

// ---------------------------------------------------------------------------
// Envelope codec
// ---------------------------------------------------------------------------

fn signature_bytes(role: &str, hex_sig: &str, len: usize) -> Result<Vec<u8>, TransactionError> {
    let bytes = hex::decode(hex_sig).map_err(|e| TransactionError::MalformedSignature {
        reason: format!("{role}: hex decode failed: {e}"),
    })?;
    if bytes.len() != len {
        return Err(TransactionError::MalformedSignature {
            reason: format!("{role}: expected {len} bytes, got {}", bytes.len()),
        });
    }
    Ok(bytes)
}

/// Serializes the signature sections of `tx` that `skip` leaves in.
pub fn serialize_signatures(tx: &Transaction, skip: SkipMask) -> Result<Vec<u8>, TransactionError> {
    let mut w = ByteWriter::default();
    write_signatures(tx, skip, &mut w)?;
    Ok(w.into_inner())
}

pub(crate) fn write_signatures(
    tx: &Transaction,
    skip: SkipMask,
    w: &mut ByteWriter,
) -> Result<(), TransactionError> {
    if !skip.contains(SkipMask::PRIMARY) {
        if let Some(signature) = &tx.signature {
            w.write_bytes(&signature_bytes("primary", signature, SIGNATURE_LENGTH)?);
        }
    }

    if !skip.contains(SkipMask::SECOND) {
        if let Some(second) = tx.sign_signature.as_ref().or(tx.second_signature.as_ref()) {
            w.write_bytes(&signature_bytes("second", second, SIGNATURE_LENGTH)?);
        }
    }

    if !skip.contains(SkipMask::MULTI) {
        for entry in &tx.signatures {
            w.write_bytes(&signature_bytes(
                "multi",
                entry,
                MULTI_SIGNATURE_ENTRY_LENGTH,
            )?);
        }
    }
    Ok(())
}

/// Reads the signature sections in `bytes` into `tx`.
///
/// The sections carry no length prefixes, so their boundaries are inferred
/// from the remaining length: a lone 64-byte signature is read while at
/// least 64 bytes remain and the remainder is a multiple of 64 or not a
/// multiple of 65. Whatever is left must split into 65-byte threshold
/// entries.
pub fn deserialize_signatures(bytes: &[u8], tx: &mut Transaction) -> Result<(), TransactionError> {
    read_signatures(&mut ByteReader::new(bytes), tx)
}

fn starts_with_single_signature(remaining: usize) -> bool {
    remaining >= SIGNATURE_LENGTH
        && (remaining % SIGNATURE_LENGTH == 0 || remaining % MULTI_SIGNATURE_ENTRY_LENGTH != 0)
}

pub(crate) fn read_signatures(
    r: &mut ByteReader<'_>,
    tx: &mut Transaction,
) -> Result<(), TransactionError> {
    if starts_with_single_signature(r.remaining()) {
        tx.signature = Some(hex::encode(r.take(SIGNATURE_LENGTH)?));
    }
    if starts_with_single_signature(r.remaining()) {
        tx.second_signature = Some(hex::encode(r.take(SIGNATURE_LENGTH)?));
    }

    if r.remaining() % MULTI_SIGNATURE_ENTRY_LENGTH != 0 {
        return Err(TransactionError::SignatureBufferNotExhausted {
            remaining: r.remaining(),
        });
    }
    while r.remaining() > 0 {
        tx.signatures
            .push(hex::encode(r.take(MULTI_SIGNATURE_ENTRY_LENGTH)?));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Signing roles
// ---------------------------------------------------------------------------

/// Signs `tx` as its sender.
///
/// The sender public key is taken from `signer`. The nonce must already be
/// set (directly or through [`Transaction::bind_sender`]).
///
/// # Example
///
/// ```
/// use mainsail_protocol::config::NetworkConfig;
/// use mainsail_protocol::crypto::{signer_for, PrivateKey};
/// use mainsail_protocol::transaction::{sign_transaction, Transaction};
///
/// let cfg = NetworkConfig::default();
/// let signer = signer_for(&cfg, PrivateKey::from_passphrase("sender").unwrap());
/// let mut tx = Transaction::validator_resignation(&cfg).with_nonce(1);
///
/// sign_transaction(&mut tx, signer.as_ref(), &cfg).unwrap();
/// assert!(tx.signature.is_some());
/// ```
pub fn sign_transaction(
    tx: &mut Transaction,
    signer: &dyn TransactionSigner,
    cfg: &NetworkConfig,
) -> Result<(), TransactionError> {
    if tx.nonce == 0 {
        return Err(TransactionError::MissingNonce);
    }
    tx.sender_public_key = Some(signer.public_key().to_hex());

    let message = tx.serialize(cfg, SkipMask::PRIMARY | SkipMask::SECOND)?;
    let signature = signer.sign(&message)?;
    tx.signature = Some(signature.to_hex());
    tx.id = None;

    debug!(
        sender = %signer.public_key(),
        nonce = tx.nonce,
        scheme = ?signer.scheme(),
        "signed transaction"
    );
    Ok(())
}

/// Adds the sender's second signature. The primary signature must already
/// be present; the second signature commits to it.
pub fn second_sign_transaction(
    tx: &mut Transaction,
    signer: &dyn TransactionSigner,
    cfg: &NetworkConfig,
) -> Result<(), TransactionError> {
    if tx.signature.is_none() {
        return Err(TransactionError::MissingSignature);
    }
    let message = tx.serialize(cfg, SkipMask::SECOND)?;
    let signature = signer.sign(&message)?;
    tx.second_signature = Some(signature.to_hex());
    tx.sign_signature = None;
    tx.id = None;

    debug!(second = %signer.public_key(), "second-signed transaction");
    Ok(())
}

/// Signs as a threshold participant and appends the result.
///
/// Returns `Ok(false)` if the signer is not a participant of the governing
/// policy.
pub fn multi_sign_transaction(
    tx: &mut Transaction,
    signer: &dyn TransactionSigner,
    cfg: &NetworkConfig,
) -> Result<bool, TransactionError> {
    let message = tx.serialize(cfg, SkipMask::ALL)?;
    let signature = signer.sign(&message)?;
    append_multi_signature(tx, &signature, Some(&signer.public_key()), cfg)
}

/// Verifies a participant signature and inserts it into `tx.signatures`.
///
/// The candidates are the participants of the threshold policy (the asset
/// of a threshold registration, otherwise the bound wallet's policy). With
/// `candidate` given, only that key is tried and it must be a participant;
/// without, the first participant the signature verifies for is taken.
///
/// On success the entry `index || signature` replaces any entry with the
/// same index, the list stays sorted by index, and `Ok(true)` is returned.
/// A signature that matches no candidate leaves `tx` untouched and returns
/// `Ok(false)`; the caller may retry with another key.
pub fn append_multi_signature(
    tx: &mut Transaction,
    signature: &Signature,
    candidate: Option<&PublicKey>,
    cfg: &NetworkConfig,
) -> Result<bool, TransactionError> {
    let participants = tx
        .multi_signature_policy()
        .ok_or(TransactionError::MissingMultiSignatureAsset)?
        .participants()?;
    let message = tx.serialize(cfg, SkipMask::ALL)?;
    let scheme = SignatureScheme::for_network(cfg);

    let matched = match candidate {
        Some(key) => participants
            .iter()
            .position(|participant| participant == key)
            .filter(|&i| scheme.verify(&participants[i], &message, signature)),
        None => participants
            .iter()
            .position(|participant| scheme.verify(participant, &message, signature)),
    };

    let Some(index) = matched else {
        warn!(
            candidate = ?candidate,
            participants = participants.len(),
            "threshold signature matched no participant"
        );
        return Ok(false);
    };
    let index = u8::try_from(index).map_err(|_| TransactionError::AssetOverflow {
        field: "publicKeys",
        count: participants.len(),
    })?;

    let prefix = format!("{index:02x}");
    tx.signatures.retain(|entry| !entry.starts_with(&prefix));
    tx.signatures.push(format!("{prefix}{}", signature.to_hex()));
    tx.signatures.sort_by(|a, b| a.get(..2).cmp(&b.get(..2)));
    tx.id = None;

    debug!(index, collected = tx.signatures.len(), "accepted threshold signature");
    Ok(true)
}

/// Computes and stores the id: hex SHA-256 of the complete serialization.
///
/// Call it after the last signature. Adding a signature afterwards drops
/// the id again.
pub fn identify(tx: &mut Transaction, cfg: &NetworkConfig) -> Result<String, TransactionError> {
    let id = sha256_hex(&tx.to_bytes(cfg)?);
    tx.id = Some(id.clone());
    debug!(%id, "identified transaction");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrivateKey;
    use crate::crypto::signatures::{LegacySigner, Bip340Signer};

    fn cfg() -> NetworkConfig {
        NetworkConfig::default()
    }

    fn signer(passphrase: &str) -> LegacySigner {
        LegacySigner::new(PrivateKey::from_passphrase(passphrase).unwrap())
    }

    fn resignation(cfg: &NetworkConfig) -> Transaction {
        Transaction::validator_resignation(cfg)
            .with_sender_public_key(&signer("s").public_key())
            .with_nonce(1)
    }

    fn threshold_registration(cfg: &NetworkConfig, owner: &LegacySigner) -> Transaction {
        let mut tx = Transaction::multi_signature(cfg)
            .min_required(2)
            .with_sender_public_key(&owner.public_key())
            .with_nonce(1);
        for name in ["p0", "p1", "p2"] {
            tx = tx.add_participant(&signer(name).public_key().to_hex()).unwrap();
        }
        tx
    }

    #[test]
    fn skip_mask_flags() {
        let mask = SkipMask::PRIMARY | SkipMask::SECOND;
        assert!(mask.contains(SkipMask::PRIMARY));
        assert!(!mask.contains(SkipMask::MULTI));
        assert!(SkipMask::ALL.contains(mask));
        assert_eq!(format!("{mask:?}"), "SkipMask(PRIMARY|SECOND)");
    }

    #[test]
    fn signing_requires_nonce() {
        let cfg = cfg();
        let mut tx = Transaction::validator_resignation(&cfg);
        assert_eq!(
            sign_transaction(&mut tx, &signer("s"), &cfg),
            Err(TransactionError::MissingNonce)
        );
    }

    #[test]
    fn primary_signature_excludes_all_signatures() {
        let cfg = cfg();
        let s = signer("s");
        let mut tx = resignation(&cfg);
        sign_transaction(&mut tx, &s, &cfg).unwrap();

        let unsigned = tx.serialize(&cfg, SkipMask::PRIMARY | SkipMask::SECOND).unwrap();
        let sig = Signature::from_hex(tx.signature.as_ref().unwrap()).unwrap();
        assert!(SignatureScheme::Legacy.verify(&s.public_key(), &unsigned, &sig));

        let full = tx.to_bytes(&cfg).unwrap();
        assert_eq!(full.len(), unsigned.len() + 64);
        assert_eq!(&full[unsigned.len()..], sig.as_bytes());
    }

    #[test]
    fn second_signature_commits_to_primary() {
        let cfg = cfg();
        let mut tx = resignation(&cfg);
        assert_eq!(
            second_sign_transaction(&mut tx, &signer("second"), &cfg),
            Err(TransactionError::MissingSignature)
        );

        sign_transaction(&mut tx, &signer("s"), &cfg).unwrap();
        let primary = tx.signature.clone();
        second_sign_transaction(&mut tx, &signer("second"), &cfg).unwrap();
        assert_eq!(tx.signature, primary);

        let message = tx.serialize(&cfg, SkipMask::SECOND).unwrap();
        let second = Signature::from_hex(tx.second_signature.as_ref().unwrap()).unwrap();
        assert!(SignatureScheme::Legacy.verify(&signer("second").public_key(), &message, &second));
    }

    #[test]
    fn sign_signature_wins_over_second_signature() {
        let cfg = cfg();
        let mut tx = resignation(&cfg);
        sign_transaction(&mut tx, &signer("s"), &cfg).unwrap();
        tx.second_signature = Some("11".repeat(64));
        tx.sign_signature = Some("22".repeat(64));

        let bytes = serialize_signatures(&tx, SkipMask::PRIMARY).unwrap();
        assert_eq!(bytes, vec![0x22; 64]);
    }

    fn malformed_reason(tx: &Transaction, cfg: &NetworkConfig) -> String {
        match tx.to_bytes(cfg) {
            Err(TransactionError::MalformedSignature { reason }) => reason,
            other => panic!("expected a malformed signature, got {other:?}"),
        }
    }

    #[test]
    fn malformed_stored_signature_is_reported() {
        let cfg = cfg();

        let mut tx = resignation(&cfg);
        tx.signature = Some("abcd".into());
        assert!(malformed_reason(&tx, &cfg).starts_with("primary"));

        let mut tx = resignation(&cfg);
        tx.signature = Some("zz".repeat(64));
        assert!(malformed_reason(&tx, &cfg).contains("hex decode failed"));

        let mut tx = resignation(&cfg);
        tx.signature = Some("aa".repeat(64));
        tx.second_signature = Some("bb".repeat(63));
        assert!(malformed_reason(&tx, &cfg).starts_with("second"));

        // A threshold entry without its index byte.
        let mut tx = resignation(&cfg);
        tx.signatures = vec!["cc".repeat(64)];
        assert_eq!(
            malformed_reason(&tx, &cfg),
            "multi: expected 65 bytes, got 64"
        );

        // Sections the mask skips are not inspected.
        assert!(tx.serialize(&cfg, SkipMask::MULTI).is_ok());
    }

    #[test]
    fn envelope_decoding_splits_sections_by_length() {
        let cfg = cfg();
        let mut tx = resignation(&cfg);
        tx.signature = Some("aa".repeat(64));
        tx.second_signature = Some("bb".repeat(64));
        tx.signatures = vec![format!("00{}", "cc".repeat(64)), format!("02{}", "dd".repeat(64))];
        let bytes = serialize_signatures(&tx, SkipMask::NONE).unwrap();
        assert_eq!(bytes.len(), 64 + 64 + 2 * 65);

        let mut decoded = resignation(&cfg);
        deserialize_signatures(&bytes, &mut decoded).unwrap();
        assert_eq!(decoded.signature, tx.signature);
        assert_eq!(decoded.second_signature, tx.second_signature);
        assert_eq!(decoded.signatures, tx.signatures);

        // Only threshold entries.
        let multi_only = serialize_signatures(&tx, SkipMask::PRIMARY | SkipMask::SECOND).unwrap();
        let mut decoded = resignation(&cfg);
        deserialize_signatures(&multi_only, &mut decoded).unwrap();
        assert_eq!(decoded.signature, None);
        assert_eq!(decoded.signatures.len(), 2);
    }

    #[test]
    fn leftover_signature_bytes_are_rejected() {
        let mut tx = resignation(&cfg());
        // One signature plus three stray bytes: 67 % 64 != 0 and 67 % 65 != 0,
        // so a signature is read and 3 bytes are left over.
        let bytes = vec![0u8; 67];
        assert_eq!(
            deserialize_signatures(&bytes, &mut tx),
            Err(TransactionError::SignatureBufferNotExhausted { remaining: 3 })
        );
    }

    #[test]
    fn threshold_signatures_accumulate_sorted() {
        let cfg = cfg();
        let owner = signer("owner");
        let mut tx = threshold_registration(&cfg, &owner);

        assert!(multi_sign_transaction(&mut tx, &signer("p2"), &cfg).unwrap());
        assert!(multi_sign_transaction(&mut tx, &signer("p0"), &cfg).unwrap());
        assert_eq!(tx.signatures.len(), 2);
        assert!(tx.signatures[0].starts_with("00"));
        assert!(tx.signatures[1].starts_with("02"));

        // Re-signing replaces instead of duplicating.
        assert!(multi_sign_transaction(&mut tx, &signer("p0"), &cfg).unwrap());
        assert_eq!(tx.signatures.len(), 2);
    }

    #[test]
    fn outsider_signature_is_refused_without_mutation() {
        let cfg = cfg();
        let owner = signer("owner");
        let mut tx = threshold_registration(&cfg, &owner);
        let before = tx.clone();

        assert!(!multi_sign_transaction(&mut tx, &signer("outsider"), &cfg).unwrap());
        assert_eq!(tx, before);
    }

    #[test]
    fn append_without_candidate_finds_the_signer() {
        let cfg = cfg();
        let owner = signer("owner");
        let mut tx = threshold_registration(&cfg, &owner);
        let message = tx.serialize(&cfg, SkipMask::ALL).unwrap();
        let sig = signer("p1").sign(&message).unwrap();

        assert!(append_multi_signature(&mut tx, &sig, None, &cfg).unwrap());
        assert!(tx.signatures[0].starts_with("01"));

        // A participant key that did not produce the signature is refused.
        let wrong = signer("p2").public_key();
        assert!(!append_multi_signature(&mut tx, &sig, Some(&wrong), &cfg).unwrap());
    }

    #[test]
    fn participant_messages_ignore_other_signatures() {
        let cfg = cfg();
        let owner = signer("owner");
        let mut tx = threshold_registration(&cfg, &owner);
        let before = tx.serialize(&cfg, SkipMask::ALL).unwrap();
        multi_sign_transaction(&mut tx, &signer("p0"), &cfg).unwrap();
        sign_transaction(&mut tx, &owner, &cfg).unwrap();
        assert_eq!(tx.serialize(&cfg, SkipMask::ALL).unwrap(), before);
    }

    #[test]
    fn append_needs_a_policy() {
        let cfg = cfg();
        let mut tx = resignation(&cfg).with_sender_public_key(&signer("s").public_key());
        let sig = Signature::from_slice(&[1u8; 64]).unwrap();
        assert_eq!(
            append_multi_signature(&mut tx, &sig, None, &cfg),
            Err(TransactionError::MissingMultiSignatureAsset)
        );
    }

    #[test]
    fn bip340_network_signs_with_bip340() {
        let cfg = NetworkConfig {
            bip340: true,
            ..NetworkConfig::default()
        };
        let s = Bip340Signer::new(PrivateKey::from_passphrase("s").unwrap());
        let mut tx = resignation(&cfg);
        sign_transaction(&mut tx, &s, &cfg).unwrap();

        let message = tx.serialize(&cfg, SkipMask::PRIMARY | SkipMask::SECOND).unwrap();
        let sig = Signature::from_hex(tx.signature.as_ref().unwrap()).unwrap();
        assert!(SignatureScheme::Bip340.verify(&s.public_key(), &message, &sig));
    }

    #[test]
    fn identify_is_stable_and_sensitive() {
        let cfg = cfg();
        let mut tx = resignation(&cfg);
        sign_transaction(&mut tx, &signer("s"), &cfg).unwrap();

        let id = identify(&mut tx, &cfg).unwrap();
        assert_eq!(identify(&mut tx, &cfg).unwrap(), id);
        assert_eq!(id.len(), 64);

        tx.fee += 1;
        assert_ne!(identify(&mut tx, &cfg).unwrap(), id);
    }
}
