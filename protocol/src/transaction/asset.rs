//! Type-specific asset payloads and their wire codecs.
//!
//! The asset is everything a transaction carries beyond the common header.
//! [`codec`] maps every [`TransactionType`] to its encoder/decoder pair; the
//! `match` is exhaustive, so adding a transaction kind without a codec does
//! not compile.
//!
//! | Type | Asset layout |
//! |---|---|
//! | Transfer | u64 amount · u32 expiration · 21-byte recipient |
//! | ValidatorRegistration | 33-byte validator public key |
//! | Vote | u8 n · n×33 votes · u8 m · m×33 unvotes |
//! | MultiSignature | u8 min · u8 n · n×33 participant keys |
//! | MultiPayment | u16 n · n×(u64 amount · 21-byte recipient) |
//! | UsernameRegistration | u8 n · n bytes UTF-8 |
//! | ValidatorResignation, UsernameResignation | empty |

use serde::{Deserialize, Serialize};

use super::builder::Transaction;
use super::codec::{ByteReader, ByteWriter};
use super::types::TransactionType;
use super::verification::TransactionError;
use crate::config::{
    deserialize_numeric, ADDRESS_LENGTH, MAX_USERNAME_LENGTH, PUBLIC_KEY_LENGTH,
    VALIDATOR_PUBLIC_KEY_LENGTH,
};
use crate::crypto::keys::PublicKey;
use crate::identity::address::{encode_address_bytes, multi_signature_address, validate_address};

// ---------------------------------------------------------------------------
// Asset data
// ---------------------------------------------------------------------------

/// Threshold policy: `min` signatures out of `public_keys`. The position of
/// a key in the list is that participant's signing index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSignatureAsset {
    pub min: u8,
    pub public_keys: Vec<String>,
}

impl MultiSignatureAsset {
    /// Parses the participant keys, in order.
    pub fn participants(&self) -> Result<Vec<PublicKey>, TransactionError> {
        self.public_keys
            .iter()
            .map(|key| PublicKey::from_hex(key).map_err(|_| TransactionError::InvalidPublicKey))
            .collect()
    }

    /// Address of the threshold account this policy defines.
    pub fn address(&self, network_version: u8) -> Result<String, TransactionError> {
        let participants = self.participants()?;
        Ok(multi_signature_address(
            self.min,
            &participants,
            network_version,
        )?)
    }
}

/// One leg of a multi-payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(deserialize_with = "deserialize_numeric")]
    pub amount: u64,
    pub recipient_id: String,
}

/// The structured asset of a transaction. Transfers and resignations carry
/// none (`Transaction::asset` is `None`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Asset {
    #[serde(rename_all = "camelCase")]
    ValidatorRegistration { validator_public_key: String },
    Votes {
        votes: Vec<String>,
        unvotes: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    MultiSignature { multi_signature: MultiSignatureAsset },
    Payments { payments: Vec<Payment> },
    Username { username: String },
}

impl Asset {
    /// The asset a freshly constructed transaction of `kind` starts with.
    pub(crate) fn empty_for(kind: TransactionType) -> Option<Self> {
        match kind {
            TransactionType::Vote => Some(Self::Votes {
                votes: Vec::new(),
                unvotes: Vec::new(),
            }),
            TransactionType::MultiSignature => Some(Self::MultiSignature {
                multi_signature: MultiSignatureAsset::default(),
            }),
            TransactionType::MultiPayment => Some(Self::Payments {
                payments: Vec::new(),
            }),
            TransactionType::Transfer
            | TransactionType::ValidatorRegistration
            | TransactionType::ValidatorResignation
            | TransactionType::UsernameRegistration
            | TransactionType::UsernameResignation => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Checks a username: 1 to 20 characters of `[a-z0-9_]`, not starting or
/// ending with `_`, and no `__` anywhere.
pub fn validate_username(username: &str) -> Result<(), TransactionError> {
    let valid = !username.is_empty()
        && username.len() <= MAX_USERNAME_LENGTH
        && username
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        && !username.starts_with('_')
        && !username.ends_with('_')
        && !username.contains("__");

    if valid {
        Ok(())
    } else {
        Err(TransactionError::InvalidUsername {
            username: username.to_string(),
        })
    }
}

/// Decodes a hex key that must be exactly `N` bytes on the wire.
fn key_bytes<const N: usize>(key: &str) -> Result<[u8; N], TransactionError> {
    hex::decode(key)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(TransactionError::InvalidPublicKey)
}

fn count_u8(field: &'static str, count: usize) -> Result<u8, TransactionError> {
    u8::try_from(count).map_err(|_| TransactionError::AssetOverflow { field, count })
}

fn mismatch(kind: TransactionType) -> TransactionError {
    TransactionError::AssetMismatch {
        transaction_type: kind,
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type EncodeFn = fn(&Transaction, &mut ByteWriter) -> Result<(), TransactionError>;
type DecodeFn = fn(&mut ByteReader<'_>, &mut Transaction) -> Result<(), TransactionError>;

/// Encoder/decoder pair for one transaction kind.
#[derive(Clone, Copy)]
pub(crate) struct AssetCodec {
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

/// The codec for `kind`.
pub(crate) fn codec(kind: TransactionType) -> AssetCodec {
    match kind {
        TransactionType::Transfer => AssetCodec {
            encode: encode_transfer,
            decode: decode_transfer,
        },
        TransactionType::ValidatorRegistration => AssetCodec {
            encode: encode_validator_registration,
            decode: decode_validator_registration,
        },
        TransactionType::Vote => AssetCodec {
            encode: encode_vote,
            decode: decode_vote,
        },
        TransactionType::MultiSignature => AssetCodec {
            encode: encode_multi_signature,
            decode: decode_multi_signature,
        },
        TransactionType::MultiPayment => AssetCodec {
            encode: encode_multi_payment,
            decode: decode_multi_payment,
        },
        TransactionType::UsernameRegistration => AssetCodec {
            encode: encode_username_registration,
            decode: decode_username_registration,
        },
        TransactionType::ValidatorResignation | TransactionType::UsernameResignation => {
            AssetCodec {
                encode: encode_empty,
                decode: decode_empty,
            }
        }
    }
}

/// Writes the asset of `tx`, dispatching on its `(typeGroup, type)`.
pub fn encode_asset(tx: &Transaction, w: &mut ByteWriter) -> Result<(), TransactionError> {
    let kind = tx.transaction_type()?;
    (codec(kind).encode)(tx, w)
}

/// Reads the asset for the `(typeGroup, type)` already decoded into `tx`.
pub fn decode_asset(r: &mut ByteReader<'_>, tx: &mut Transaction) -> Result<(), TransactionError> {
    let kind = tx.transaction_type()?;
    (codec(kind).decode)(r, tx)
}

// ---------------------------------------------------------------------------
// Per-type codecs
// ---------------------------------------------------------------------------

fn encode_transfer(tx: &Transaction, w: &mut ByteWriter) -> Result<(), TransactionError> {
    let recipient = tx.recipient_id.as_deref().unwrap_or_default();
    let address = validate_address(recipient)?;
    w.write_u64(tx.amount);
    w.write_u32(tx.expiration);
    w.write_bytes(&address);
    Ok(())
}

fn decode_transfer(r: &mut ByteReader<'_>, tx: &mut Transaction) -> Result<(), TransactionError> {
    tx.amount = r.read_u64()?;
    tx.expiration = r.read_u32()?;
    tx.recipient_id = Some(encode_address_bytes(&r.read_array::<ADDRESS_LENGTH>()?));
    tx.asset = None;
    Ok(())
}

fn encode_validator_registration(
    tx: &Transaction,
    w: &mut ByteWriter,
) -> Result<(), TransactionError> {
    let Some(Asset::ValidatorRegistration {
        validator_public_key,
    }) = &tx.asset
    else {
        return Err(mismatch(TransactionType::ValidatorRegistration));
    };
    w.write_bytes(&key_bytes::<VALIDATOR_PUBLIC_KEY_LENGTH>(validator_public_key)?);
    Ok(())
}

fn decode_validator_registration(
    r: &mut ByteReader<'_>,
    tx: &mut Transaction,
) -> Result<(), TransactionError> {
    let key = r.take(VALIDATOR_PUBLIC_KEY_LENGTH)?;
    tx.asset = Some(Asset::ValidatorRegistration {
        validator_public_key: hex::encode(key),
    });
    Ok(())
}

fn write_key_list(
    w: &mut ByteWriter,
    field: &'static str,
    keys: &[String],
) -> Result<(), TransactionError> {
    w.write_u8(count_u8(field, keys.len())?);
    for key in keys {
        w.write_bytes(&key_bytes::<PUBLIC_KEY_LENGTH>(key)?);
    }
    Ok(())
}

fn read_key_list(r: &mut ByteReader<'_>, count: usize) -> Result<Vec<String>, TransactionError> {
    (0..count)
        .map(|_| r.take(PUBLIC_KEY_LENGTH).map(hex::encode))
        .collect()
}

fn encode_vote(tx: &Transaction, w: &mut ByteWriter) -> Result<(), TransactionError> {
    let Some(Asset::Votes { votes, unvotes }) = &tx.asset else {
        return Err(mismatch(TransactionType::Vote));
    };
    write_key_list(w, "votes", votes)?;
    write_key_list(w, "unvotes", unvotes)
}

fn decode_vote(r: &mut ByteReader<'_>, tx: &mut Transaction) -> Result<(), TransactionError> {
    let vote_count = r.read_u8()? as usize;
    let votes = read_key_list(r, vote_count)?;
    let unvote_count = r.read_u8()? as usize;
    let unvotes = read_key_list(r, unvote_count)?;
    tx.asset = Some(Asset::Votes { votes, unvotes });
    Ok(())
}

fn encode_multi_signature(tx: &Transaction, w: &mut ByteWriter) -> Result<(), TransactionError> {
    let Some(Asset::MultiSignature { multi_signature }) = &tx.asset else {
        return Err(mismatch(TransactionType::MultiSignature));
    };
    w.write_u8(multi_signature.min);
    write_key_list(w, "publicKeys", &multi_signature.public_keys)
}

fn decode_multi_signature(
    r: &mut ByteReader<'_>,
    tx: &mut Transaction,
) -> Result<(), TransactionError> {
    let min = r.read_u8()?;
    let count = r.read_u8()? as usize;
    let multi_signature = MultiSignatureAsset {
        min,
        public_keys: read_key_list(r, count)?,
    };

    // Keys that are not curve points leave the account address unknown; the
    // bytes themselves still round-trip.
    tx.recipient_id = multi_signature.address(tx.network).ok();
    tx.asset = Some(Asset::MultiSignature { multi_signature });
    Ok(())
}

fn encode_multi_payment(tx: &Transaction, w: &mut ByteWriter) -> Result<(), TransactionError> {
    let Some(Asset::Payments { payments }) = &tx.asset else {
        return Err(mismatch(TransactionType::MultiPayment));
    };
    let count = u16::try_from(payments.len()).map_err(|_| TransactionError::AssetOverflow {
        field: "payments",
        count: payments.len(),
    })?;
    w.write_u16(count);
    for payment in payments {
        let address = validate_address(&payment.recipient_id)?;
        w.write_u64(payment.amount);
        w.write_bytes(&address);
    }
    Ok(())
}

fn decode_multi_payment(
    r: &mut ByteReader<'_>,
    tx: &mut Transaction,
) -> Result<(), TransactionError> {
    let count = r.read_u16()? as usize;
    let mut payments = Vec::with_capacity(count.min(r.remaining() / (8 + ADDRESS_LENGTH)));
    let mut total: u64 = 0;
    for _ in 0..count {
        let amount = r.read_u64()?;
        let recipient_id = encode_address_bytes(&r.read_array::<ADDRESS_LENGTH>()?);
        total = total
            .checked_add(amount)
            .ok_or(TransactionError::AmountOverflow)?;
        payments.push(Payment {
            amount,
            recipient_id,
        });
    }
    tx.amount = total;
    tx.asset = Some(Asset::Payments { payments });
    Ok(())
}

fn encode_username_registration(
    tx: &Transaction,
    w: &mut ByteWriter,
) -> Result<(), TransactionError> {
    let Some(Asset::Username { username }) = &tx.asset else {
        return Err(mismatch(TransactionType::UsernameRegistration));
    };
    validate_username(username)?;
    w.write_u8(count_u8("username", username.len())?);
    w.write_bytes(username.as_bytes());
    Ok(())
}

fn decode_username_registration(
    r: &mut ByteReader<'_>,
    tx: &mut Transaction,
) -> Result<(), TransactionError> {
    let len = r.read_u8()? as usize;
    let bytes = r.take(len)?;
    let username = String::from_utf8(bytes.to_vec()).map_err(|_| {
        TransactionError::InvalidUsername {
            username: String::from_utf8_lossy(bytes).into_owned(),
        }
    })?;
    tx.asset = Some(Asset::Username { username });
    Ok(())
}

fn encode_empty(_tx: &Transaction, _w: &mut ByteWriter) -> Result<(), TransactionError> {
    Ok(())
}

fn decode_empty(_r: &mut ByteReader<'_>, tx: &mut Transaction) -> Result<(), TransactionError> {
    tx.asset = None;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::crypto::keys::PrivateKey;
    use crate::identity::address::address_from_public_key;

    fn key_hex(passphrase: &str) -> String {
        PrivateKey::from_passphrase(passphrase)
            .unwrap()
            .public_key()
            .to_hex()
    }

    fn encoded(tx: &Transaction) -> Vec<u8> {
        let mut w = ByteWriter::default();
        encode_asset(tx, &mut w).unwrap();
        w.into_inner()
    }

    #[test]
    fn username_rules() {
        for ok in ["username", "a", "user_name", "abc123", "12345678901234567890"] {
            assert!(validate_username(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in [
            "_leading",
            "trailing_",
            "double__u",
            "UPPER",
            "has space",
            "hyphen-ated",
            "",
            "123456789012345678901",
        ] {
            assert_eq!(
                validate_username(bad),
                Err(TransactionError::InvalidUsername {
                    username: bad.to_string()
                }),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn transfer_layout() {
        let cfg = NetworkConfig::default();
        let recipient = address_from_public_key(
            &PrivateKey::from_passphrase("recipient").unwrap().public_key(),
            30,
        );
        let tx = Transaction::transfer(&cfg, &recipient, 0x0102)
            .unwrap()
            .with_expiration(7);

        let bytes = encoded(&tx);
        assert_eq!(bytes.len(), 8 + 4 + 21);
        assert_eq!(&bytes[..8], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[7, 0, 0, 0]);
        assert_eq!(bytes[12], 30);
    }

    #[test]
    fn vote_layout_has_two_counted_lists() {
        let cfg = NetworkConfig::default();
        let tx = Transaction::vote(&cfg)
            .down_vote(&key_hex("old"))
            .unwrap()
            .up_vote(&key_hex("new"))
            .unwrap();

        let bytes = encoded(&tx);
        assert_eq!(bytes.len(), 1 + 33 + 1 + 33);
        assert_eq!(bytes[0], 1);
        assert_eq!(hex::encode(&bytes[1..34]), key_hex("new"));
        assert_eq!(bytes[34], 1);
        assert_eq!(hex::encode(&bytes[35..]), key_hex("old"));
    }

    #[test]
    fn multi_signature_layout_preserves_order() {
        let cfg = NetworkConfig::default();
        let keys = [key_hex("p1"), key_hex("p2"), key_hex("p3")];
        let mut tx = Transaction::multi_signature(&cfg).min_required(2);
        for key in &keys {
            tx = tx.add_participant(key).unwrap();
        }

        let bytes = encoded(&tx);
        assert_eq!(&bytes[..2], &[2, 3]);
        for (i, key) in keys.iter().enumerate() {
            let start = 2 + i * 33;
            assert_eq!(&hex::encode(&bytes[start..start + 33]), key);
        }
    }

    #[test]
    fn empty_assets_encode_to_nothing() {
        let cfg = NetworkConfig::default();
        assert!(encoded(&Transaction::validator_resignation(&cfg)).is_empty());
        assert!(encoded(&Transaction::username_resignation(&cfg)).is_empty());
    }

    #[test]
    fn wrong_asset_shape_is_rejected() {
        let cfg = NetworkConfig::default();
        let mut tx = Transaction::vote(&cfg);
        tx.asset = Some(Asset::Username {
            username: "name".into(),
        });
        let mut w = ByteWriter::default();
        assert_eq!(
            encode_asset(&tx, &mut w),
            Err(TransactionError::AssetMismatch {
                transaction_type: TransactionType::Vote
            })
        );
    }

    #[test]
    fn too_many_votes_overflow_the_count_byte() {
        let cfg = NetworkConfig::default();
        let mut tx = Transaction::vote(&cfg);
        tx.asset = Some(Asset::Votes {
            votes: vec![key_hex("v"); 256],
            unvotes: Vec::new(),
        });
        let mut w = ByteWriter::default();
        assert_eq!(
            encode_asset(&tx, &mut w),
            Err(TransactionError::AssetOverflow {
                field: "votes",
                count: 256
            })
        );
    }

    #[test]
    fn unsupported_type_fails_both_ways() {
        let cfg = NetworkConfig::default();
        let mut tx = Transaction::validator_resignation(&cfg);
        tx.type_group = 1000;
        let mut w = ByteWriter::default();
        assert!(matches!(
            encode_asset(&tx, &mut w),
            Err(TransactionError::UnsupportedTransactionType {
                type_group: 1000,
                ..
            })
        ));
        let mut r = ByteReader::new(&[]);
        assert!(decode_asset(&mut r, &mut tx).is_err());
    }

    #[test]
    fn multi_payment_decode_sums_amounts() {
        let cfg = NetworkConfig::default();
        let a = address_from_public_key(&PrivateKey::from_passphrase("a").unwrap().public_key(), 30);
        let b = address_from_public_key(&PrivateKey::from_passphrase("b").unwrap().public_key(), 30);
        let tx = Transaction::multi_payment(&cfg)
            .add_payment(&a, 10)
            .unwrap()
            .add_payment(&b, 32)
            .unwrap();
        let bytes = encoded(&tx);

        let mut decoded = Transaction::multi_payment(&cfg);
        decode_asset(&mut ByteReader::new(&bytes), &mut decoded).unwrap();
        assert_eq!(decoded.amount, 42);
        assert_eq!(decoded.asset, tx.asset);
    }

    #[test]
    fn truncated_asset_is_reported() {
        let cfg = NetworkConfig::default();
        let mut tx = Transaction::vote(&cfg);
        // Claims one vote but carries only 10 key bytes.
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&[2u8; 10]);
        assert_eq!(
            decode_asset(&mut ByteReader::new(&bytes), &mut tx),
            Err(TransactionError::TruncatedBuffer {
                needed: 33,
                remaining: 10
            })
        );
    }
}
