// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Mainsail Protocol: Transaction Library
//!
//! Builds, signs, serializes and verifies transactions for Mainsail
//! (ARK-style) networks. The library is pure computation: it never talks to
//! a peer by itself, and it reads network parameters from a
//! [`NetworkConfig`](config::NetworkConfig) passed in on every call.
//!
//! ## Architecture
//!
//! - **config**: Wire constants, network version, fee table, vendor field limit.
//! - **crypto**: SHA-256, RIPEMD-160, secp256k1 keys, both Schnorr schemes.
//! - **identity**: Wallet addresses, threshold addresses, wallet snapshots.
//! - **transaction**: The eight core types, their codec, signing and verification.
//! - **network**: The submission boundary a peer client implements.
//!
//! ## Example
//!
//! ```
//! use mainsail_protocol::config::NetworkConfig;
//! use mainsail_protocol::crypto::{signer_for, PrivateKey};
//! use mainsail_protocol::identity::address_from_public_key;
//! use mainsail_protocol::transaction::{identify, sign_transaction, Transaction};
//!
//! let cfg = NetworkConfig::default();
//! let key = PrivateKey::from_passphrase("this is a top secret passphrase").unwrap();
//! let recipient = address_from_public_key(&key.public_key(), cfg.version);
//!
//! let mut tx = Transaction::transfer(&cfg, &recipient, 100_000_000)
//!     .unwrap()
//!     .with_nonce(1)
//!     .with_vendor_field(&cfg, "hello");
//! sign_transaction(&mut tx, signer_for(&cfg, key).as_ref(), &cfg).unwrap();
//! identify(&mut tx, &cfg).unwrap();
//!
//! let decoded = Transaction::from_hex(&tx.to_hex(&cfg).unwrap()).unwrap();
//! assert_eq!(decoded.id, tx.id);
//! ```

pub mod config;
pub mod crypto;
pub mod identity;
pub mod network;
pub mod transaction;
