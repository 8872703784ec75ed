//! # Key Management
//!
//! secp256k1 key material for Mainsail accounts.
//!
//! Public keys travel as 33-byte compressed SEC1 points (`02`/`03` prefix)
//! and signatures as 64 raw bytes (`r || s`). Private keys are 32-byte
//! scalars; the usual way to obtain one is the SHA-256 of a passphrase.
//!
//! Key bytes are never logged. `Debug` for [`PrivateKey`] prints the public
//! half only.

use std::fmt;

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{ProjectivePoint, PublicKey as K256PublicKey, SecretKey};
use rand::rngs::OsRng;
use thiserror::Error;

use super::hash::sha256;
use crate::config::{PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

/// Errors that can occur during key operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("invalid public key: not a compressed secp256k1 point")]
    InvalidPublicKey,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignature,

    #[error("public key combination produced the point at infinity")]
    PointAtInfinity,

    #[error("signing failed")]
    SigningFailed,
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// A compressed secp256k1 public key.
///
/// Always a valid curve point: every constructor goes through SEC1 parsing.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    bytes: [u8; PUBLIC_KEY_LENGTH],
}

impl PublicKey {
    /// Parses a 33-byte compressed point.
    pub fn from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        if slice.len() != PUBLIC_KEY_LENGTH {
            return Err(KeyError::InvalidPublicKey);
        }
        let point = K256PublicKey::from_sec1_bytes(slice).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self::from_point(&point))
    }

    /// Parses a hex-encoded compressed point.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::from_slice(&bytes)
    }

    pub(crate) fn from_point(point: &K256PublicKey) -> Self {
        let encoded = point.to_encoded_point(true);
        let mut bytes = [0u8; PUBLIC_KEY_LENGTH];
        bytes.copy_from_slice(encoded.as_bytes());
        Self { bytes }
    }

    /// The curve point behind this key.
    pub(crate) fn to_point(self) -> Result<K256PublicKey, KeyError> {
        K256PublicKey::from_sec1_bytes(&self.bytes).map_err(|_| KeyError::InvalidPublicKey)
    }

    /// Raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.bytes
    }

    /// The 32-byte x coordinate, as BIP-340 wants it.
    pub fn x_only(&self) -> [u8; 32] {
        let mut x = [0u8; 32];
        x.copy_from_slice(&self.bytes[1..]);
        x
    }

    /// Lowercase hex, 66 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

/// Adds compressed public keys together as curve points, in order.
///
/// This is the building block of threshold account addresses. Fails on an
/// empty list or when the sum is the point at infinity (e.g. `P + (-P)`).
pub fn combine_public_keys(keys: &[PublicKey]) -> Result<PublicKey, KeyError> {
    if keys.is_empty() {
        return Err(KeyError::PointAtInfinity);
    }
    let mut sum = ProjectivePoint::IDENTITY;
    for key in keys {
        sum += key.to_point()?.to_projective();
    }
    let combined =
        K256PublicKey::from_affine(sum.to_affine()).map_err(|_| KeyError::PointAtInfinity)?;
    Ok(PublicKey::from_point(&combined))
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// A raw 64-byte Schnorr signature. Opaque to the envelope codec; only the
/// signature schemes look inside.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Signature {
    /// Wraps raw signature bytes, checking the length.
    pub fn from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        if slice.len() != SIGNATURE_LENGTH {
            return Err(KeyError::InvalidSignature);
        }
        Ok(Self {
            bytes: slice.to_vec(),
        })
    }

    /// Parses a hex-encoded signature.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidSignature)?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        write!(f, "Signature({}...{})", &hex_str[..8], &hex_str[hex_str.len() - 8..])
    }
}

// ---------------------------------------------------------------------------
// PrivateKey
// ---------------------------------------------------------------------------

/// A secp256k1 private scalar.
///
/// Deliberately not `Serialize`. Exporting key material should be an
/// explicit call to [`to_bytes`](Self::to_bytes) or [`to_wif`](Self::to_wif).
#[derive(Clone)]
pub struct PrivateKey {
    secret: SecretKey,
}

impl PrivateKey {
    /// Fresh key from the OS RNG.
    pub fn random() -> Self {
        Self {
            secret: SecretKey::random(&mut OsRng),
        }
    }

    /// Reconstructs a key from its 32-byte big-endian scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let secret = SecretKey::from_slice(bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self { secret })
    }

    /// Reconstructs a key from hex.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidSecretKey)?;
        if bytes.len() != 32 {
            return Err(KeyError::InvalidSecretKey);
        }
        Self::from_bytes(&bytes)
    }

    /// Derives the key the wallets derive from a passphrase: the scalar is
    /// `SHA-256(passphrase)` taken as-is.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, KeyError> {
        Self::from_bytes(&sha256(passphrase.as_bytes()))
    }

    /// The matching compressed public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_point(&self.secret.public_key())
    }

    /// Raw 32-byte scalar. Handle with care.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes().into()
    }

    /// Wallet import format: base58check of `wif || secret || 0x01`, the
    /// trailing byte flagging a compressed public key.
    pub fn to_wif(&self, wif: u8) -> String {
        let mut payload = Vec::with_capacity(34);
        payload.push(wif);
        payload.extend_from_slice(&self.to_bytes());
        payload.push(0x01);
        bs58::encode(payload).with_check().into_string()
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(pub={})", self.public_key().to_hex())
    }
}

impl PartialEq for PrivateKey {
    /// Compares public halves; secret bytes are never compared directly.
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for PrivateKey {}
