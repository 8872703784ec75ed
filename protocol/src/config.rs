//! # Protocol Configuration & Constants
//!
//! Every magic number of the Mainsail transaction format lives here, next to
//! the [`NetworkConfig`] snapshot that the codec reads from.
//!
//! The codec never reads configuration from ambient global state. Callers
//! pass a `&NetworkConfig` into every encode/sign call. Applications that
//! reload network settings at runtime hold a [`ConfigHandle`] and hand out
//! [`ConfigHandle::snapshot`]s, so a reload can never race an in-flight
//! encode.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Wire Format
// ---------------------------------------------------------------------------

/// First byte of every serialized transaction.
pub const TRANSACTION_MARKER: u8 = 0xFF;

/// Transaction format version produced by the builders.
pub const TRANSACTION_VERSION: u8 = 1;

/// Hard ceiling for the vendor field: its length is written as a single byte.
pub const MAX_VENDOR_FIELD_LENGTH: usize = 255;

/// Vendor field length used when the network does not configure one.
pub const DEFAULT_VENDOR_FIELD_LENGTH: usize = 255;

/// Length of a compressed secp256k1 public key.
pub const PUBLIC_KEY_LENGTH: usize = 33;

/// Length of a raw Schnorr signature (`r || s`). Both schemes use 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Length of a multi-signature entry on the wire: index byte + signature.
pub const MULTI_SIGNATURE_ENTRY_LENGTH: usize = SIGNATURE_LENGTH + 1;

/// Length of a decoded wallet address: network byte + RIPEMD-160 digest.
pub const ADDRESS_LENGTH: usize = 21;

/// Length of a validator public key in a registration asset.
pub const VALIDATOR_PUBLIC_KEY_LENGTH: usize = 33;

/// Longest username accepted by a username registration.
pub const MAX_USERNAME_LENGTH: usize = 20;

// ---------------------------------------------------------------------------
// Currency & Fees
// ---------------------------------------------------------------------------

/// Smallest units per whole coin (8 decimals, same as Bitcoin).
pub const UNITS_PER_COIN: u64 = 100_000_000;

/// Fee applied when neither an explicit fee nor a fee table entry exists.
pub const FALLBACK_FEE: u64 = 10_000_000;

/// Default network version byte (public testnet, `D...` addresses).
pub const DEFAULT_NETWORK_VERSION: u8 = 30;

// ---------------------------------------------------------------------------
// Network Configuration
// ---------------------------------------------------------------------------

/// A fee table entry. Network APIs serve fees as decimal strings, but plain
/// JSON numbers show up in hand-written configs too, so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericValue {
    /// A JSON number.
    Number(u64),
    /// A decimal string, e.g. `"10000000"`.
    Text(String),
}

impl NumericValue {
    /// Returns the value as an integer, or `None` if the string form does
    /// not parse.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Serde helper for integer fields that peers may send as decimal strings.
pub(crate) fn deserialize_numeric<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = NumericValue::deserialize(deserializer)?;
    value
        .as_u64()
        .ok_or_else(|| serde::de::Error::custom("expected an unsigned integer"))
}

/// Fee table keyed by `transaction version -> type name -> tier`.
///
/// ```text
/// { "1": { "transfer": { "min": "...", "avg": "10000000", "max": "..." } } }
/// ```
pub type FeeTable = BTreeMap<String, BTreeMap<String, BTreeMap<String, NumericValue>>>;

/// Immutable network parameters consumed by the codec.
///
/// This is a snapshot: once handed to an encode or sign call it must not
/// change underneath it. Loading it (from a peer, a file, wherever) is the
/// embedding application's job; [`NetworkConfig::from_json`] only parses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// Network version byte. Prefixes every wallet address and is written
    /// into the transaction header.
    pub version: u8,

    /// Maximum vendor field length in bytes. Values above 255 are clamped
    /// at encode time because the length prefix is a single byte.
    #[serde(default = "default_vendor_field_length")]
    pub vendor_field_length: usize,

    /// Fee table used to resolve `min`/`avg`/`max` fee tiers.
    #[serde(default)]
    pub fees: FeeTable,

    /// `true` selects BIP-340 Schnorr, `false` the legacy bcrypto scheme.
    #[serde(default)]
    pub bip340: bool,

    /// Wallet import format prefix byte, when the network defines one.
    #[serde(default)]
    pub wif: Option<u8>,
}

fn default_vendor_field_length() -> usize {
    DEFAULT_VENDOR_FIELD_LENGTH
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_NETWORK_VERSION,
            vendor_field_length: DEFAULT_VENDOR_FIELD_LENGTH,
            fees: FeeTable::new(),
            bip340: false,
            wif: None,
        }
    }
}

impl NetworkConfig {
    /// Creates a configuration for the given network version byte with
    /// default limits and an empty fee table.
    pub fn new(version: u8) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Parses a configuration from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Effective vendor field limit: the configured value, clamped to what
    /// the one-byte length prefix can express.
    pub fn max_vendor_field_length(&self) -> usize {
        self.vendor_field_length.min(MAX_VENDOR_FIELD_LENGTH)
    }

    /// Looks up `fees[version][type_name][tier]`.
    ///
    /// Returns `None` when any level is missing or the value is not a
    /// valid integer; the caller decides on the fallback.
    pub fn fee_for(&self, version: u8, type_name: &str, tier: &str) -> Option<u64> {
        self.fees
            .get(&version.to_string())?
            .get(type_name)?
            .get(tier)?
            .as_u64()
    }
}

// ---------------------------------------------------------------------------
// ConfigHandle
// ---------------------------------------------------------------------------

/// Shared, swappable holder for the active [`NetworkConfig`].
///
/// Readers take an `Arc` snapshot and keep it for the duration of an
/// operation. [`swap`](Self::swap) replaces the pointer atomically; callers
/// already holding the old snapshot keep using it until they drop it.
#[derive(Debug, Clone, Default)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<NetworkConfig>>>,
}

impl ConfigHandle {
    /// Wraps an initial configuration.
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Returns the configuration currently in effect.
    pub fn snapshot(&self) -> Arc<NetworkConfig> {
        Arc::clone(&self.inner.read())
    }

    /// Installs a new configuration and returns the one it replaced.
    pub fn swap(&self, config: NetworkConfig) -> Arc<NetworkConfig> {
        let mut guard = self.inner.write();
        std::mem::replace(&mut *guard, Arc::new(config))
    }
}
