//! # Wallet Addresses
//!
//! A wallet address is a checksummed, network-scoped encoding of a hashed
//! public key:
//!
//! ```text
//! compressed public key (33 bytes)
//!     -> RIPEMD-160          -> 20 bytes
//!     -> version || digest   -> 21 bytes
//!     -> base58check         -> "D6Z26L69gdk9qYmTv5uzk3uGepigtHY4ax"
//! ```
//!
//! Threshold (multi-signature) accounts have no private key of their own.
//! Their address comes from a synthetic public key: the participants' keys
//! point-added to a key whose secret is derived from `min`. Changing the
//! threshold or the participant list therefore moves the account.

use thiserror::Error;

use crate::config::ADDRESS_LENGTH;
use crate::crypto::hash::{ripemd160, sha256};
use crate::crypto::keys::{combine_public_keys, KeyError, PrivateKey, PublicKey};

/// Errors raised while deriving or validating addresses.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// Bad base58 alphabet, bad checksum, or wrong decoded length.
    #[error("invalid wallet address: {address}")]
    InvalidWalletAddress { address: String },

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Derives the wallet address of `public_key` on network `version`.
///
/// # Example
///
/// ```
/// use mainsail_protocol::crypto::PrivateKey;
/// use mainsail_protocol::identity::address_from_public_key;
///
/// let key = PrivateKey::from_passphrase("this is a top secret passphrase").unwrap();
/// let address = address_from_public_key(&key.public_key(), 30);
/// assert!(address.starts_with('D'));
/// ```
pub fn address_from_public_key(public_key: &PublicKey, version: u8) -> String {
    let mut payload = [0u8; ADDRESS_LENGTH];
    payload[0] = version;
    payload[1..].copy_from_slice(&ripemd160(public_key.as_bytes()));
    encode_address_bytes(&payload)
}

/// Base58check-encodes an already assembled 21-byte address payload.
pub fn encode_address_bytes(payload: &[u8; ADDRESS_LENGTH]) -> String {
    bs58::encode(payload).with_check().into_string()
}

/// Decodes and checks an address, returning its 21 raw bytes.
///
/// The network byte is not compared against any configuration: a foreign
/// address is well-formed, and whether it is acceptable is the network's
/// call.
pub fn validate_address(address: &str) -> Result<[u8; ADDRESS_LENGTH], AddressError> {
    let invalid = || AddressError::InvalidWalletAddress {
        address: address.to_string(),
    };
    let decoded = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|_| invalid())?;
    decoded.try_into().map_err(|_| invalid())
}

/// `true` if `address` is a well-formed address for network `version`.
pub fn is_valid_address(address: &str, version: u8) -> bool {
    matches!(validate_address(address), Ok(bytes) if bytes[0] == version)
}

// ---------------------------------------------------------------------------
// Threshold accounts
// ---------------------------------------------------------------------------

/// The synthetic public key that stands for a threshold account.
///
/// The seed secret is SHA-256 of `min` rendered as two lowercase hex digits;
/// its public key is added to every participant key, in list order.
pub fn multi_signature_public_key(
    min: u8,
    participants: &[PublicKey],
) -> Result<PublicKey, AddressError> {
    let seed = PrivateKey::from_bytes(&sha256(format!("{:02x}", min).as_bytes()))?;
    let mut keys = Vec::with_capacity(participants.len() + 1);
    keys.push(seed.public_key());
    keys.extend_from_slice(participants);
    Ok(combine_public_keys(&keys)?)
}

/// Address of the threshold account `(min, participants)` on network `version`.
pub fn multi_signature_address(
    min: u8,
    participants: &[PublicKey],
    version: u8,
) -> Result<String, AddressError> {
    let combined = multi_signature_public_key(min, participants)?;
    Ok(address_from_public_key(&combined, version))
}
