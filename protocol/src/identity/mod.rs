//! # Identity Module
//!
//! Who sends and who receives. Every account on a Mainsail network is a
//! secp256k1 key, and everyone else knows it by its wallet address.
//!
//! 1. **Address**: base58check over `version || RIPEMD-160(public key)`,
//!    plus the synthetic key and address of threshold accounts.
//! 2. **Wallet**: the sender state a peer reports (nonce, current vote,
//!    threshold policy), consumed when binding a sender to a transaction.

pub mod address;
pub mod wallet;

pub use address::{
    address_from_public_key, encode_address_bytes, is_valid_address, multi_signature_address,
    multi_signature_public_key, validate_address, AddressError,
};
pub use wallet::{WalletAttributes, WalletSnapshot};
