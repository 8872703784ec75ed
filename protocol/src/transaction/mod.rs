//! # Transaction Module
//!
//! Construction, encoding, signing and verification of Mainsail
//! transactions. Everything here is pure computation over in-memory
//! buffers; the network configuration comes in by reference on every call.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        TransactionType, TypeGroup, fee specs, vendor field
//! codec.rs        little-endian ByteWriter / ByteReader
//! header.rs       header codec shared by every type
//! asset.rs        per-type asset payloads and their codec registry
//! builder.rs      Transaction, constructors, builder methods, (de)serialization
//! fee.rs          fee resolution against the network fee table
//! signing.rs      signature envelope, signing roles, identification
//! verification.rs TransactionError, signature and threshold checks
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build**: a per-type constructor plus builder methods, optionally
//!    [`Transaction::bind_sender`] with a wallet snapshot.
//! 2. **Sign**: [`sign_transaction`], then [`second_sign_transaction`] or
//!    [`multi_sign_transaction`] as the sender's policy requires.
//! 3. **Identify**: [`identify`] once the last signature is in.
//! 4. **Broadcast**: [`Transaction::to_hex`] handed to a
//!    [`TransactionPool`](crate::network::TransactionPool).

pub mod asset;
pub mod builder;
pub mod codec;
pub mod fee;
pub mod header;
pub mod signing;
pub mod types;
pub mod verification;

pub use asset::{validate_username, Asset, MultiSignatureAsset, Payment};
pub use builder::Transaction;
pub use fee::resolve_fee;
pub use header::{decode_header, encode_header, Header};
pub use signing::{
    append_multi_signature, deserialize_signatures, identify, multi_sign_transaction,
    second_sign_transaction, serialize_signatures, sign_transaction, SkipMask,
};
pub use types::{coins_to_units, FeeSpec, FeeTier, TransactionType, TypeGroup, VendorField};
pub use verification::{
    multi_signature_state, verify_second_signature, verify_signature, verify_transaction,
    SigningState, TransactionError,
};
