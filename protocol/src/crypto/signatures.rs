//! # Schnorr Signatures
//!
//! Mainsail networks sign with one of two Schnorr flavours over secp256k1:
//!
//! - **Legacy**: the 2018 bip-schnorr draft as shipped in bcrypto 4.10:
//!   `k = H(d || m)`, `R.y` must be a quadratic residue, and the challenge
//!   commits to the *compressed* public key: `e = H(R.x || P || m)`.
//! - **BIP-340**: the final standard, with x-only keys, tagged hashes and even `y`.
//!
//! Which one is active is a network property (`NetworkConfig::bip340`).
//! Everything above this module talks to a [`TransactionSigner`] and to
//! [`SignatureScheme::verify`], and treats signatures as opaque bytes.
//!
//! Both schemes sign `SHA-256(message)`, never the message itself.

use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::point::AffineCoordinates;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::schnorr;
use k256::{AffinePoint, FieldBytes, FieldElement, ProjectivePoint, Scalar, U256};
use serde::{Deserialize, Serialize};
use signature::hazmat::{PrehashSigner, PrehashVerifier};

use super::hash::sha256;
use super::keys::{KeyError, PrivateKey, PublicKey, Signature};
use crate::config::{NetworkConfig, SIGNATURE_LENGTH};

// ---------------------------------------------------------------------------
// SignatureScheme
// ---------------------------------------------------------------------------

/// The Schnorr variant a network signs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureScheme {
    /// bcrypto 4.10 Schnorr.
    Legacy,
    /// BIP-340 Schnorr.
    Bip340,
}

impl SignatureScheme {
    /// The scheme selected by a network configuration.
    pub fn for_network(cfg: &NetworkConfig) -> Self {
        if cfg.bip340 {
            Self::Bip340
        } else {
            Self::Legacy
        }
    }

    /// Verifies `signature` over `SHA-256(message)` for `public_key`.
    ///
    /// A plain boolean: malformed input and a wrong signature both mean "no".
    pub fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
        let digest = sha256(message);
        match self {
            Self::Legacy => legacy_verify_digest(public_key, &digest, signature.as_bytes()),
            Self::Bip340 => bip340_verify_digest(public_key, &digest, signature.as_bytes()),
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionSigner
// ---------------------------------------------------------------------------

/// Something that can sign transactions: a key plus a scheme.
///
/// Kept object-safe so callers can pick an implementation at runtime with
/// [`signer_for`] and pass `&dyn TransactionSigner` around. A hardware or
/// remote signer would implement this too.
pub trait TransactionSigner: Send + Sync {
    /// The scheme the produced signatures verify under.
    fn scheme(&self) -> SignatureScheme;

    /// Compressed public key of the signing key.
    fn public_key(&self) -> PublicKey;

    /// Signs `SHA-256(message)`. Deterministic for a given key and message.
    fn sign(&self, message: &[u8]) -> Result<Signature, KeyError>;
}

/// Signer for networks on the legacy bcrypto scheme.
#[derive(Debug, Clone)]
pub struct LegacySigner {
    key: PrivateKey,
}

impl LegacySigner {
    pub fn new(key: PrivateKey) -> Self {
        Self { key }
    }
}

impl TransactionSigner for LegacySigner {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Legacy
    }

    fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    fn sign(&self, message: &[u8]) -> Result<Signature, KeyError> {
        legacy_sign_digest(&self.key, &sha256(message))
    }
}

/// Signer for networks on BIP-340.
#[derive(Debug, Clone)]
pub struct Bip340Signer {
    key: PrivateKey,
}

impl Bip340Signer {
    pub fn new(key: PrivateKey) -> Self {
        Self { key }
    }
}

impl TransactionSigner for Bip340Signer {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Bip340
    }

    fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    fn sign(&self, message: &[u8]) -> Result<Signature, KeyError> {
        bip340_sign_digest(&self.key, &sha256(message))
    }
}

/// Builds the signer the network expects for `key`.
pub fn signer_for(cfg: &NetworkConfig, key: PrivateKey) -> Box<dyn TransactionSigner> {
    match SignatureScheme::for_network(cfg) {
        SignatureScheme::Legacy => Box::new(LegacySigner::new(key)),
        SignatureScheme::Bip340 => Box::new(Bip340Signer::new(key)),
    }
}

// ---------------------------------------------------------------------------
// Legacy (bcrypto 4.10) Schnorr
// ---------------------------------------------------------------------------

fn reduce(bytes: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::from(*bytes))
}

/// `jacobi(R.y) == 1`, i.e. the y coordinate is a non-zero square mod p.
fn has_square_y(point: &AffinePoint) -> bool {
    let encoded = point.to_encoded_point(false);
    let Some(y) = encoded.y() else {
        return false;
    };
    let y: Option<FieldElement> = FieldElement::from_bytes(y).into();
    match y {
        Some(y) => bool::from(y.sqrt().is_some()),
        None => false,
    }
}

fn challenge(r: &[u8], public_key: &PublicKey, digest: &[u8; 32]) -> Scalar {
    let mut preimage = Vec::with_capacity(32 + 33 + 32);
    preimage.extend_from_slice(r);
    preimage.extend_from_slice(public_key.as_bytes());
    preimage.extend_from_slice(digest);
    reduce(&sha256(&preimage))
}

/// Legacy Schnorr signature over a 32-byte digest.
pub fn legacy_sign_digest(key: &PrivateKey, digest: &[u8; 32]) -> Result<Signature, KeyError> {
    let d: Scalar = *key.secret().to_nonzero_scalar();

    let mut nonce_preimage = Vec::with_capacity(64);
    nonce_preimage.extend_from_slice(&key.to_bytes());
    nonce_preimage.extend_from_slice(digest);
    let k0 = reduce(&sha256(&nonce_preimage));
    if k0 == Scalar::ZERO {
        return Err(KeyError::SigningFailed);
    }

    let r_point = (ProjectivePoint::GENERATOR * k0).to_affine();
    let k = if has_square_y(&r_point) { k0 } else { -k0 };
    let r = r_point.x();

    let e = challenge(&r, &key.public_key(), digest);
    let s = k + e * d;

    let mut bytes = Vec::with_capacity(SIGNATURE_LENGTH);
    bytes.extend_from_slice(&r);
    bytes.extend_from_slice(&s.to_bytes());
    Signature::from_slice(&bytes)
}

/// Verifies a legacy Schnorr signature over a 32-byte digest.
pub fn legacy_verify_digest(public_key: &PublicKey, digest: &[u8; 32], signature: &[u8]) -> bool {
    if signature.len() != SIGNATURE_LENGTH {
        return false;
    }
    let (r, s) = signature.split_at(32);
    let (Ok(r_bytes), Ok(s_bytes)) = (<[u8; 32]>::try_from(r), <[u8; 32]>::try_from(s)) else {
        return false;
    };

    // r must be a field element, s a scalar; both strictly below their moduli.
    let r_valid: Option<FieldElement> = FieldElement::from_bytes(&FieldBytes::from(r_bytes)).into();
    if r_valid.is_none() {
        return false;
    }
    let s: Option<Scalar> = Scalar::from_repr(FieldBytes::from(s_bytes)).into();
    let Some(s) = s else {
        return false;
    };
    let Ok(p) = public_key.to_point() else {
        return false;
    };

    let e = challenge(r, public_key, digest);
    let r_point = ProjectivePoint::GENERATOR * s - p.to_projective() * e;
    if r_point == ProjectivePoint::IDENTITY {
        return false;
    }
    let r_affine = r_point.to_affine();
    has_square_y(&r_affine) && r_affine.x()[..] == r_bytes[..]
}

// ---------------------------------------------------------------------------
// BIP-340 Schnorr
// ---------------------------------------------------------------------------

/// BIP-340 signature over a 32-byte digest with all-zero auxiliary
/// randomness, so signing stays deterministic.
pub fn bip340_sign_digest(key: &PrivateKey, digest: &[u8; 32]) -> Result<Signature, KeyError> {
    let signing_key =
        schnorr::SigningKey::from_bytes(&key.to_bytes()).map_err(|_| KeyError::InvalidSecretKey)?;
    let sig: schnorr::Signature = signing_key
        .sign_prehash(digest)
        .map_err(|_| KeyError::SigningFailed)?;
    Signature::from_slice(&sig.to_bytes())
}

/// Verifies a BIP-340 signature over a 32-byte digest. Only the x
/// coordinate of `public_key` takes part.
pub fn bip340_verify_digest(public_key: &PublicKey, digest: &[u8; 32], signature: &[u8]) -> bool {
    // k256 panics on short input instead of returning an error.
    if signature.len() != SIGNATURE_LENGTH {
        return false;
    }
    let Ok(verifying_key) = schnorr::VerifyingKey::from_bytes(&public_key.x_only()) else {
        return false;
    };
    let Ok(sig) = schnorr::Signature::try_from(signature) else {
        return false;
    };
    verifying_key.verify_prehash(digest, &sig).is_ok()
}
