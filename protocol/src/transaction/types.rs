//! Core type definitions for Mainsail transactions.
//!
//! These types form the vocabulary of the codec: which kind of transaction
//! a `(typeGroup, type)` pair denotes, how fees are requested, and what a
//! vendor field holds. They are kept small and `Copy` where possible.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::verification::TransactionError;
use crate::config::UNITS_PER_COIN;

// ---------------------------------------------------------------------------
// TypeGroup
// ---------------------------------------------------------------------------

/// Namespace of transaction type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeGroup {
    /// Test-only types.
    Test,
    /// Built-in types, the only group this codec implements.
    Core,
    /// First group available to custom transaction types.
    Reserved,
}

impl TypeGroup {
    pub const fn code(self) -> u32 {
        match self {
            Self::Test => 0,
            Self::Core => 1,
            Self::Reserved => 1000,
        }
    }

    /// `true` for groups owned by custom (plugin) transaction types.
    pub const fn is_custom(code: u32) -> bool {
        code >= Self::Reserved.code()
    }
}

// ---------------------------------------------------------------------------
// TransactionType
// ---------------------------------------------------------------------------

/// Every transaction kind the codec can encode and decode.
///
/// Each variant fixes its wire `(typeGroup, type)` pair, so there is no
/// string-based dispatch anywhere: [`TransactionType::from_code`] is the
/// only way in from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Value transfer to a single recipient.
    Transfer,
    /// Registers the sender as a validator.
    ValidatorRegistration,
    /// Casts and/or withdraws a vote for a validator.
    Vote,
    /// Turns the sender into a threshold account.
    MultiSignature,
    /// Value transfer to many recipients at once.
    MultiPayment,
    /// Withdraws the sender's validator registration.
    ValidatorResignation,
    /// Claims a username for the sender.
    UsernameRegistration,
    /// Releases the sender's username.
    UsernameResignation,
}

impl TransactionType {
    /// All supported kinds, in wire-code order.
    pub const ALL: [TransactionType; 8] = [
        Self::Transfer,
        Self::ValidatorRegistration,
        Self::Vote,
        Self::MultiSignature,
        Self::MultiPayment,
        Self::ValidatorResignation,
        Self::UsernameRegistration,
        Self::UsernameResignation,
    ];

    /// Wire type code within [`TypeGroup::Core`].
    pub const fn code(self) -> u16 {
        match self {
            Self::Transfer => 0,
            Self::ValidatorRegistration => 2,
            Self::Vote => 3,
            Self::MultiSignature => 4,
            Self::MultiPayment => 6,
            Self::ValidatorResignation => 7,
            Self::UsernameRegistration => 8,
            Self::UsernameResignation => 9,
        }
    }

    pub const fn type_group(self) -> TypeGroup {
        TypeGroup::Core
    }

    /// Resolves a wire `(typeGroup, type)` pair.
    pub fn from_code(type_group: u32, type_code: u16) -> Result<Self, TransactionError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.type_group().code() == type_group && kind.code() == type_code)
            .ok_or(TransactionError::UnsupportedTransactionType {
                type_group,
                type_code,
            })
    }

    /// Key of this kind in the network fee table.
    pub const fn fee_key(self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::ValidatorRegistration => "validatorRegistration",
            Self::Vote => "vote",
            Self::MultiSignature => "multiSignature",
            Self::MultiPayment => "multiPayment",
            Self::ValidatorResignation => "validatorResignation",
            Self::UsernameRegistration => "usernameRegistration",
            Self::UsernameResignation => "usernameResignation",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer => write!(f, "Transfer"),
            Self::ValidatorRegistration => write!(f, "ValidatorRegistration"),
            Self::Vote => write!(f, "Vote"),
            Self::MultiSignature => write!(f, "MultiSignature"),
            Self::MultiPayment => write!(f, "MultiPayment"),
            Self::ValidatorResignation => write!(f, "ValidatorResignation"),
            Self::UsernameRegistration => write!(f, "UsernameRegistration"),
            Self::UsernameResignation => write!(f, "UsernameResignation"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// A fee tier from the network fee table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeTier {
    Min,
    Avg,
    Max,
}

impl FeeTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Avg => "avg",
            Self::Max => "max",
        }
    }
}

impl FromStr for FeeTier {
    type Err = TransactionError;

    /// Only the first three characters count: `"minimum"` is `Min`, while
    /// `"average"` (`"ave"`) names no tier.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.get(..3) {
            Some("min") => Ok(Self::Min),
            Some("avg") => Ok(Self::Avg),
            Some("max") => Ok(Self::Max),
            _ => Err(TransactionError::InvalidFeeTier(s.to_string())),
        }
    }
}

impl fmt::Display for FeeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a caller asks for a fee.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeeSpec {
    /// Exact fee in the smallest unit.
    Units(u64),
    /// Whole coins, converted with [`coins_to_units`].
    Coins(f64),
    /// Looked up in the network fee table.
    Tier(FeeTier),
}

impl From<u64> for FeeSpec {
    fn from(units: u64) -> Self {
        Self::Units(units)
    }
}

impl From<f64> for FeeSpec {
    fn from(coins: f64) -> Self {
        Self::Coins(coins)
    }
}

impl From<FeeTier> for FeeSpec {
    fn from(tier: FeeTier) -> Self {
        Self::Tier(tier)
    }
}

impl FromStr for FeeSpec {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self::Tier)
    }
}

/// Converts whole coins to the smallest unit: `coins * 10^8`, truncated.
/// Negative and NaN inputs give 0, values past `u64::MAX` saturate.
pub fn coins_to_units(coins: f64) -> u64 {
    (coins * UNITS_PER_COIN as f64) as u64
}

// ---------------------------------------------------------------------------
// VendorField
// ---------------------------------------------------------------------------

/// The memo attached to a transaction.
///
/// Decoding never fails on vendor field content: bytes that are valid UTF-8
/// come back as [`VendorField::Text`], anything else as [`VendorField::Raw`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VendorField {
    Text(String),
    Raw(Vec<u8>),
}

impl VendorField {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(err) => Self::Raw(err.into_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Raw(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Cuts the field to at most `max` bytes. A text field stays text only
    /// if the cut lands on a character boundary.
    pub(crate) fn truncated(&self, max: usize) -> Self {
        if self.len() <= max {
            return self.clone();
        }
        Self::from_bytes(self.as_bytes()[..max].to_vec())
    }
}

impl From<&str> for VendorField {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl fmt::Display for VendorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Raw(bytes) => write!(f, "0x{}", hex::encode(bytes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_resolve_both_ways() {
        for kind in TransactionType::ALL {
            assert_eq!(TransactionType::from_code(1, kind.code()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_pairs_are_unsupported() {
        for (group, code) in [(1u32, 1u16), (1, 5), (1, 10), (0, 0), (1000, 0)] {
            assert!(matches!(
                TransactionType::from_code(group, code),
                Err(TransactionError::UnsupportedTransactionType { .. })
            ));
        }
        assert!(TypeGroup::is_custom(1000));
        assert!(!TypeGroup::is_custom(TypeGroup::Core.code()));
    }

    #[test]
    fn fee_keys_are_lower_camel_case() {
        assert_eq!(TransactionType::Transfer.fee_key(), "transfer");
        assert_eq!(TransactionType::MultiPayment.fee_key(), "multiPayment");
        assert_eq!(
            TransactionType::UsernameResignation.fee_key(),
            "usernameResignation"
        );
    }

    #[test]
    fn fee_tier_parses_first_three_characters() {
        assert_eq!("avg".parse::<FeeTier>().unwrap(), FeeTier::Avg);
        assert_eq!(
            "average".parse::<FeeTier>(),
            Err(TransactionError::InvalidFeeTier("average".into()))
        );
        assert_eq!("minimum".parse::<FeeTier>().unwrap(), FeeTier::Min);
        assert_eq!("max".parse::<FeeSpec>().unwrap(), FeeSpec::Tier(FeeTier::Max));
        assert!("mi".parse::<FeeTier>().is_err());
        assert!("high".parse::<FeeTier>().is_err());
    }

    #[test]
    fn coins_convert_with_truncation() {
        assert_eq!(coins_to_units(1.0), 100_000_000);
        assert_eq!(coins_to_units(0.1), 10_000_000);
        assert_eq!(coins_to_units(0.000000019), 1);
        assert_eq!(coins_to_units(-1.0), 0);
    }

    #[test]
    fn vendor_field_keeps_invalid_utf8_as_raw() {
        assert_eq!(
            VendorField::from_bytes(b"message".to_vec()),
            VendorField::Text("message".into())
        );
        assert_eq!(
            VendorField::from_bytes(vec![0xff, 0xfe]),
            VendorField::Raw(vec![0xff, 0xfe])
        );
    }

    #[test]
    fn truncation_splitting_a_character_falls_back_to_raw() {
        // "é" is two bytes; cutting after the first leaves invalid UTF-8.
        let field = VendorField::from("aé");
        assert_eq!(field.truncated(2), VendorField::Raw(vec![b'a', 0xc3]));
        assert_eq!(field.truncated(3), field);
        assert_eq!(VendorField::from("abcdef").truncated(3), VendorField::from("abc"));
    }
}
