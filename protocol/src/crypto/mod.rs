//! # Cryptographic Primitives
//!
//! Everything the transaction codec needs from cryptography, and nothing more:
//!
//! - **SHA-256** for transaction ids and signing digests.
//! - **RIPEMD-160** for the address payload.
//! - **secp256k1** keys, compressed on the wire.
//! - **Schnorr** signatures in two flavours (legacy bcrypto and BIP-340),
//!   selected per network.
//!
//! All of it is a thin wrapper around `k256`, `sha2` and `ripemd`. The one
//! place that does curve arithmetic by hand is the legacy Schnorr scheme,
//! because no maintained crate implements that draft anymore.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{ripemd160, sha256, sha256_hex};
pub use keys::{combine_public_keys, KeyError, PrivateKey, PublicKey, Signature};
pub use signatures::{
    signer_for, Bip340Signer, LegacySigner, SignatureScheme, TransactionSigner,
};
