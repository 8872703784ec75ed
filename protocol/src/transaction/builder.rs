//! The [`Transaction`] type, its per-type constructors and builder methods,
//! and whole-transaction serialization.
//!
//! Construction is a fluent chain over an owned value:
//!
//! ```
//! use mainsail_protocol::config::NetworkConfig;
//! use mainsail_protocol::crypto::PrivateKey;
//! use mainsail_protocol::identity::address_from_public_key;
//! use mainsail_protocol::transaction::Transaction;
//!
//! let cfg = NetworkConfig::default();
//! let recipient = address_from_public_key(&PrivateKey::random().public_key(), cfg.version);
//! let tx = Transaction::transfer(&cfg, &recipient, 100_000_000)
//!     .unwrap()
//!     .with_vendor_field(&cfg, "message")
//!     .with_nonce(1);
//! assert_eq!(tx.amount, 100_000_000);
//! ```
//!
//! Every builder method drops a previously computed `id`; signing happens
//! in [`super::signing`], which also computes the final id.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::asset::{
    decode_asset, encode_asset, validate_username, Asset, MultiSignatureAsset, Payment,
};
use super::codec::{ByteReader, ByteWriter};
use super::fee::resolve_fee;
use super::header::{read_header, write_header};
use super::signing::{read_signatures, write_signatures, SkipMask};
use super::types::{FeeSpec, FeeTier, TransactionType, VendorField};
use super::verification::TransactionError;
use crate::config::{deserialize_numeric, NetworkConfig, TRANSACTION_VERSION};
use crate::crypto::hash::sha256_hex;
use crate::crypto::keys::PublicKey;
use crate::identity::address::{address_from_public_key, validate_address};
use crate::identity::wallet::WalletSnapshot;

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A Mainsail transaction.
///
/// Public keys and signatures are kept as lowercase hex, the form they have
/// in the JSON export; the codec validates them when it serializes.
///
/// # Wire Format
///
/// `header || asset || signatures`, see [`super::header`], [`super::asset`]
/// and [`super::signing`]. `id` is the SHA-256 of the complete serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Hex SHA-256 of the full serialization. `None` until identified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub version: u8,

    /// Network version byte of the network this transaction is meant for.
    pub network: u8,

    pub type_group: u32,

    #[serde(rename = "type")]
    pub type_code: u16,

    /// Strictly positive per-sender sequence number.
    #[serde(deserialize_with = "deserialize_numeric")]
    pub nonce: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_public_key: Option<String>,

    /// Fee in the smallest unit.
    #[serde(deserialize_with = "deserialize_numeric")]
    pub fee: u64,

    /// Value moved, in the smallest unit. Transfers carry it on the wire;
    /// for multi-payments it is the sum of the payments; otherwise 0.
    #[serde(default, deserialize_with = "deserialize_numeric")]
    pub amount: u64,

    /// Transfer expiration height. 0 means none.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub expiration: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_field: Option<VendorField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<Asset>,

    /// Derived recipient address; not part of the wire format for any type
    /// except Transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_signature: Option<String>,

    /// Legacy name of the second-signature slot. Wins over
    /// `second_signature` when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_signature: Option<String>,

    /// Threshold signatures as hex `index || signature`, ascending by index.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<String>,

    /// Sender wallet state from [`Transaction::bind_sender`].
    #[serde(skip)]
    pub(crate) wallet: Option<WalletSnapshot>,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl Transaction {
    fn new(cfg: &NetworkConfig, kind: TransactionType) -> Self {
        Self {
            id: None,
            version: TRANSACTION_VERSION,
            network: cfg.version,
            type_group: kind.type_group().code(),
            type_code: kind.code(),
            nonce: 0,
            sender_public_key: None,
            fee: resolve_fee(
                &FeeSpec::Tier(FeeTier::Avg),
                cfg,
                TRANSACTION_VERSION,
                kind.fee_key(),
            ),
            amount: 0,
            expiration: 0,
            vendor_field: None,
            asset: Asset::empty_for(kind),
            recipient_id: None,
            signature: None,
            second_signature: None,
            sign_signature: None,
            signatures: Vec::new(),
            wallet: None,
        }
    }

    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// A transfer of `amount` units to `recipient_id`.
    pub fn transfer(
        cfg: &NetworkConfig,
        recipient_id: &str,
        amount: u64,
    ) -> Result<Self, TransactionError> {
        validate_address(recipient_id)?;
        let mut tx = Self::new(cfg, TransactionType::Transfer);
        tx.recipient_id = Some(recipient_id.to_string());
        tx.amount = amount;
        Ok(tx)
    }

    /// Registers the sender as a validator under `validator_public_key`.
    pub fn validator_registration(
        cfg: &NetworkConfig,
        validator_public_key: &str,
    ) -> Result<Self, TransactionError> {
        let key = PublicKey::from_hex(validator_public_key)
            .map_err(|_| TransactionError::InvalidPublicKey)?;
        let mut tx = Self::new(cfg, TransactionType::ValidatorRegistration);
        tx.asset = Some(Asset::ValidatorRegistration {
            validator_public_key: key.to_hex(),
        });
        Ok(tx)
    }

    /// An empty vote; fill it with [`up_vote`](Self::up_vote) and
    /// [`down_vote`](Self::down_vote).
    pub fn vote(cfg: &NetworkConfig) -> Self {
        Self::new(cfg, TransactionType::Vote)
    }

    /// An empty threshold registration; fill it with
    /// [`min_required`](Self::min_required) and
    /// [`add_participant`](Self::add_participant).
    pub fn multi_signature(cfg: &NetworkConfig) -> Self {
        Self::new(cfg, TransactionType::MultiSignature)
    }

    /// An empty multi-payment; fill it with [`add_payment`](Self::add_payment).
    pub fn multi_payment(cfg: &NetworkConfig) -> Self {
        Self::new(cfg, TransactionType::MultiPayment)
    }

    pub fn validator_resignation(cfg: &NetworkConfig) -> Self {
        Self::new(cfg, TransactionType::ValidatorResignation)
    }

    /// Claims `username` for the sender.
    pub fn username_registration(
        cfg: &NetworkConfig,
        username: &str,
    ) -> Result<Self, TransactionError> {
        Self::new(cfg, TransactionType::UsernameRegistration).set_username(username)
    }

    pub fn username_resignation(cfg: &NetworkConfig) -> Self {
        Self::new(cfg, TransactionType::UsernameResignation)
    }

    /// The kind named by `(type_group, type_code)`.
    pub fn transaction_type(&self) -> Result<TransactionType, TransactionError> {
        TransactionType::from_code(self.type_group, self.type_code)
    }

    // -----------------------------------------------------------------------
    // Common builder methods
    // -----------------------------------------------------------------------

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self.id = None;
        self
    }

    /// Sets the fee from units, whole coins or a fee-table tier.
    pub fn with_fee(mut self, cfg: &NetworkConfig, fee: impl Into<FeeSpec>) -> Self {
        // An unknown type has no fee table entry, so tiers fall back.
        let fee_key = self
            .transaction_type()
            .map(TransactionType::fee_key)
            .unwrap_or_default();
        self.fee = resolve_fee(&fee.into(), cfg, self.version, fee_key);
        self.id = None;
        self
    }

    /// Attaches a memo, cut to the network's vendor field limit. An empty
    /// memo clears the field.
    pub fn with_vendor_field(mut self, cfg: &NetworkConfig, field: impl Into<VendorField>) -> Self {
        let field = field.into().truncated(cfg.max_vendor_field_length());
        self.vendor_field = (!field.is_empty()).then_some(field);
        self.id = None;
        self
    }

    /// Attaches a memo given as hex.
    pub fn with_vendor_field_hex(
        self,
        cfg: &NetworkConfig,
        hex_field: &str,
    ) -> Result<Self, TransactionError> {
        let bytes = hex::decode(hex_field)
            .map_err(|e| TransactionError::InvalidHex(e.to_string()))?;
        Ok(self.with_vendor_field(cfg, VendorField::from_bytes(bytes)))
    }

    /// Sets the sender key without consulting any wallet state.
    pub fn with_sender_public_key(mut self, public_key: &PublicKey) -> Self {
        self.sender_public_key = Some(public_key.to_hex());
        self.id = None;
        self
    }

    pub fn with_expiration(mut self, expiration: u32) -> Self {
        self.expiration = expiration;
        self.id = None;
        self
    }

    /// Binds the sender from a wallet snapshot fetched by the caller.
    ///
    /// Takes the wallet's public key (when it has one) and sets the nonce to
    /// the wallet nonce plus one. The snapshot is kept: [`up_vote`](Self::up_vote)
    /// reads the current vote from it, and threshold signing reads the
    /// registered participants from it. Bind before voting.
    pub fn bind_sender(mut self, wallet: WalletSnapshot) -> Result<Self, TransactionError> {
        if let Some(key) = &wallet.public_key {
            let key = PublicKey::from_hex(key).map_err(|_| TransactionError::InvalidPublicKey)?;
            self.sender_public_key = Some(key.to_hex());
        }
        self.nonce = wallet.next_nonce().ok_or(TransactionError::NonceOverflow)?;
        debug!(address = %wallet.address, nonce = self.nonce, "bound sender wallet");
        self.wallet = Some(wallet);
        self.id = None;
        Ok(self)
    }

    /// The wallet snapshot bound with [`bind_sender`](Self::bind_sender).
    pub fn wallet(&self) -> Option<&WalletSnapshot> {
        self.wallet.as_ref()
    }

    /// Address of the sender public key on this transaction's network.
    pub fn sender_id(&self) -> Result<String, TransactionError> {
        let key = self
            .sender_public_key
            .as_deref()
            .ok_or(TransactionError::MissingSenderPublicKey)?;
        let key = PublicKey::from_hex(key).map_err(|_| TransactionError::InvalidPublicKey)?;
        Ok(address_from_public_key(&key, self.network))
    }

    // -----------------------------------------------------------------------
    // Type-specific builder methods
    // -----------------------------------------------------------------------

    /// Votes for `validator_public_key`, replacing any vote already on the
    /// transaction. If the bound wallet currently votes for someone, that
    /// vote is withdrawn in the same transaction.
    pub fn up_vote(mut self, validator_public_key: &str) -> Result<Self, TransactionError> {
        let key = PublicKey::from_hex(validator_public_key)
            .map_err(|_| TransactionError::InvalidPublicKey)?;
        let held = self
            .wallet
            .as_ref()
            .and_then(|wallet| wallet.attributes.vote.clone());

        let Some(Asset::Votes { votes, unvotes }) = &mut self.asset else {
            return Err(TransactionError::AssetMismatch {
                transaction_type: TransactionType::Vote,
            });
        };
        *votes = vec![key.to_hex()];
        if let Some(held) = held {
            *unvotes = vec![held];
        }
        self.id = None;
        Ok(self)
    }

    /// Withdraws the vote for `validator_public_key`.
    pub fn down_vote(mut self, validator_public_key: &str) -> Result<Self, TransactionError> {
        let key = PublicKey::from_hex(validator_public_key)
            .map_err(|_| TransactionError::InvalidPublicKey)?;
        let Some(Asset::Votes { unvotes, .. }) = &mut self.asset else {
            return Err(TransactionError::AssetMismatch {
                transaction_type: TransactionType::Vote,
            });
        };
        *unvotes = vec![key.to_hex()];
        self.id = None;
        Ok(self)
    }

    /// Sets the signature threshold of a threshold registration.
    pub fn min_required(mut self, min: u8) -> Self {
        if let Some(Asset::MultiSignature { multi_signature }) = &mut self.asset {
            multi_signature.min = min;
        }
        self.refresh_multi_signature_recipient();
        self.id = None;
        self
    }

    /// Appends a participant. The position in the list becomes the
    /// participant's signing index.
    pub fn add_participant(mut self, public_key: &str) -> Result<Self, TransactionError> {
        let key = PublicKey::from_hex(public_key).map_err(|_| TransactionError::InvalidPublicKey)?;
        let Some(Asset::MultiSignature { multi_signature }) = &mut self.asset else {
            return Err(TransactionError::AssetMismatch {
                transaction_type: TransactionType::MultiSignature,
            });
        };
        multi_signature.public_keys.push(key.to_hex());
        self.refresh_multi_signature_recipient();
        self.id = None;
        Ok(self)
    }

    fn refresh_multi_signature_recipient(&mut self) {
        if let Some(Asset::MultiSignature { multi_signature }) = &self.asset {
            self.recipient_id = multi_signature.address(self.network).ok();
        }
    }

    /// Appends a payment leg and adds its amount to the total.
    pub fn add_payment(mut self, recipient_id: &str, amount: u64) -> Result<Self, TransactionError> {
        validate_address(recipient_id)?;
        let total = self
            .amount
            .checked_add(amount)
            .ok_or(TransactionError::AmountOverflow)?;
        let Some(Asset::Payments { payments }) = &mut self.asset else {
            return Err(TransactionError::AssetMismatch {
                transaction_type: TransactionType::MultiPayment,
            });
        };
        payments.push(Payment {
            amount,
            recipient_id: recipient_id.to_string(),
        });
        self.amount = total;
        self.id = None;
        Ok(self)
    }

    /// Sets the username of a username registration.
    pub fn set_username(mut self, username: &str) -> Result<Self, TransactionError> {
        if self.transaction_type()? != TransactionType::UsernameRegistration {
            return Err(TransactionError::AssetMismatch {
                transaction_type: TransactionType::UsernameRegistration,
            });
        }
        validate_username(username)?;
        self.asset = Some(Asset::Username {
            username: username.to_string(),
        });
        self.id = None;
        Ok(self)
    }

    /// The threshold policy governing this transaction: the asset of a
    /// threshold registration, or the bound wallet's registered policy.
    pub fn multi_signature_policy(&self) -> Option<&MultiSignatureAsset> {
        match &self.asset {
            Some(Asset::MultiSignature { multi_signature }) => Some(multi_signature),
            _ => self
                .wallet
                .as_ref()
                .and_then(|wallet| wallet.attributes.multi_signature.as_ref()),
        }
    }

    // -----------------------------------------------------------------------
    // Wire format
    // -----------------------------------------------------------------------

    /// Serializes the transaction, leaving out the signature sections in
    /// `skip`.
    pub fn serialize(&self, cfg: &NetworkConfig, skip: SkipMask) -> Result<Vec<u8>, TransactionError> {
        let mut w = ByteWriter::with_capacity(256);
        write_header(self, cfg, &mut w)?;
        encode_asset(self, &mut w)?;
        write_signatures(self, skip, &mut w)?;
        trace!(len = w.len(), ?skip, "serialized transaction");
        Ok(w.into_inner())
    }

    /// The complete serialization, signatures included.
    pub fn to_bytes(&self, cfg: &NetworkConfig) -> Result<Vec<u8>, TransactionError> {
        self.serialize(cfg, SkipMask::NONE)
    }

    /// Lowercase hex of [`to_bytes`](Self::to_bytes): what gets broadcast.
    pub fn to_hex(&self, cfg: &NetworkConfig) -> Result<String, TransactionError> {
        self.to_bytes(cfg).map(hex::encode)
    }

    /// Parses a complete serialized transaction. The id is computed from
    /// the input bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut r = ByteReader::new(bytes);
        let header = read_header(&mut r)?;

        let mut tx = Self {
            id: None,
            version: header.version,
            network: header.network,
            type_group: header.type_group,
            type_code: header.type_code,
            nonce: header.nonce,
            sender_public_key: Some(header.sender_public_key),
            fee: header.fee,
            amount: 0,
            expiration: 0,
            vendor_field: header.vendor_field,
            asset: None,
            recipient_id: None,
            signature: None,
            second_signature: None,
            sign_signature: None,
            signatures: Vec::new(),
            wallet: None,
        };
        decode_asset(&mut r, &mut tx)?;
        read_signatures(&mut r, &mut tx)?;
        tx.id = Some(sha256_hex(bytes));

        debug!(
            id = tx.id.as_deref().unwrap_or_default(),
            type_group = tx.type_group,
            type_code = tx.type_code,
            len = bytes.len(),
            "decoded transaction"
        );
        Ok(tx)
    }

    /// Parses a hex-encoded serialized transaction.
    pub fn from_hex(hex_tx: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(hex_tx).map_err(|e| TransactionError::InvalidHex(e.to_string()))?;
        Self::deserialize(&bytes)
    }

    /// The JSON mapping of all non-empty attributes, as the network's API
    /// expects it.
    pub fn export(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
