//! The header shared by every transaction type.
//!
//! ```text
//! 0xFF | version u8 | network u8 | typeGroup u32 | type u16 | nonce u64
//!      | senderPublicKey [33] | fee u64 | vendorFieldLength u8 | vendorField
//! ```
//!
//! All integers little-endian. The vendor field is cut to the network's
//! limit before its length byte is written.

use super::builder::Transaction;
use super::codec::{ByteReader, ByteWriter};
use super::types::VendorField;
use super::verification::TransactionError;
use crate::config::{NetworkConfig, PUBLIC_KEY_LENGTH, TRANSACTION_MARKER};

/// Decoded header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub network: u8,
    pub type_group: u32,
    pub type_code: u16,
    pub nonce: u64,
    /// Hex of the 33-byte compressed key.
    pub sender_public_key: String,
    pub fee: u64,
    pub vendor_field: Option<VendorField>,
}

/// Serializes the header of `tx`.
pub fn encode_header(tx: &Transaction, cfg: &NetworkConfig) -> Result<Vec<u8>, TransactionError> {
    let mut w = ByteWriter::with_capacity(59 + cfg.max_vendor_field_length());
    write_header(tx, cfg, &mut w)?;
    Ok(w.into_inner())
}

/// Parses a header from the start of `bytes`, returning it with the number
/// of bytes it occupied.
pub fn decode_header(bytes: &[u8]) -> Result<(Header, usize), TransactionError> {
    let mut r = ByteReader::new(bytes);
    let header = read_header(&mut r)?;
    Ok((header, r.position()))
}

pub(crate) fn write_header(
    tx: &Transaction,
    cfg: &NetworkConfig,
    w: &mut ByteWriter,
) -> Result<(), TransactionError> {
    let sender = tx
        .sender_public_key
        .as_deref()
        .ok_or(TransactionError::MissingSenderPublicKey)?;
    let sender: [u8; PUBLIC_KEY_LENGTH] = hex::decode(sender)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(TransactionError::InvalidPublicKey)?;

    w.write_u8(TRANSACTION_MARKER);
    w.write_u8(tx.version);
    w.write_u8(tx.network);
    w.write_u32(tx.type_group);
    w.write_u16(tx.type_code);
    w.write_u64(tx.nonce);
    w.write_bytes(&sender);
    w.write_u64(tx.fee);

    match &tx.vendor_field {
        Some(field) => {
            let field = field.truncated(cfg.max_vendor_field_length());
            // max_vendor_field_length() never exceeds 255.
            w.write_u8(field.len() as u8);
            w.write_bytes(field.as_bytes());
        }
        None => w.write_u8(0),
    }
    Ok(())
}

pub(crate) fn read_header(r: &mut ByteReader<'_>) -> Result<Header, TransactionError> {
    let marker = r.read_u8()?;
    if marker != TRANSACTION_MARKER {
        return Err(TransactionError::InvalidMarker(marker));
    }

    let version = r.read_u8()?;
    let network = r.read_u8()?;
    let type_group = r.read_u32()?;
    let type_code = r.read_u16()?;
    let nonce = r.read_u64()?;
    let sender_public_key = hex::encode(r.take(PUBLIC_KEY_LENGTH)?);
    let fee = r.read_u64()?;

    let vendor_len = r.read_u8()? as usize;
    let vendor_field = match r.take(vendor_len)? {
        [] => None,
        bytes => Some(VendorField::from_bytes(bytes.to_vec())),
    };

    Ok(Header {
        version,
        network,
        type_group,
        type_code,
        nonce,
        sender_public_key,
        fee,
        vendor_field,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrivateKey;

    fn sample(cfg: &NetworkConfig) -> Transaction {
        let pk = PrivateKey::from_passphrase("header").unwrap().public_key();
        Transaction::validator_resignation(cfg)
            .with_sender_public_key(&pk)
            .with_nonce(5)
            .with_fee(cfg, 25u64)
    }

    #[test]
    fn fixed_layout() {
        let cfg = NetworkConfig::default();
        let tx = sample(&cfg);
        let bytes = encode_header(&tx, &cfg).unwrap();

        assert_eq!(bytes.len(), 1 + 1 + 1 + 4 + 2 + 8 + 33 + 8 + 1);
        assert_eq!(&bytes[..3], &[0xff, 0x01, 30]);
        assert_eq!(&bytes[3..7], &1u32.to_le_bytes());
        assert_eq!(&bytes[7..9], &7u16.to_le_bytes());
        assert_eq!(&bytes[9..17], &5u64.to_le_bytes());
        assert_eq!(hex::encode(&bytes[17..50]), tx.sender_public_key.clone().unwrap());
        assert_eq!(&bytes[50..58], &25u64.to_le_bytes());
        assert_eq!(bytes[58], 0);
    }

    #[test]
    fn decode_reports_consumed_bytes() {
        let cfg = NetworkConfig::default();
        let tx = sample(&cfg).with_vendor_field(&cfg, "memo");
        let mut bytes = encode_header(&tx, &cfg).unwrap();
        bytes.extend_from_slice(&[0xaa; 10]);

        let (header, consumed) = decode_header(&bytes).unwrap();
        assert_eq!(consumed, bytes.len() - 10);
        assert_eq!(header.nonce, 5);
        assert_eq!(header.fee, 25);
        assert_eq!(header.network, 30);
        assert_eq!(header.vendor_field, Some(VendorField::from("memo")));
    }

    #[test]
    fn vendor_field_is_truncated_to_network_limit() {
        let mut cfg = NetworkConfig::default();
        let mut tx = sample(&cfg);
        tx.vendor_field = Some(VendorField::from("0123456789"));
        cfg.vendor_field_length = 4;

        let bytes = encode_header(&tx, &cfg).unwrap();
        let (header, _) = decode_header(&bytes).unwrap();
        assert_eq!(header.vendor_field, Some(VendorField::from("0123")));
    }

    #[test]
    fn binary_vendor_field_decodes_as_raw() {
        let cfg = NetworkConfig::default();
        let mut tx = sample(&cfg);
        tx.vendor_field = Some(VendorField::Raw(vec![0xc3, 0x28]));
        let (header, _) = decode_header(&encode_header(&tx, &cfg).unwrap()).unwrap();
        assert_eq!(header.vendor_field, Some(VendorField::Raw(vec![0xc3, 0x28])));
    }

    #[test]
    fn wrong_marker_is_rejected() {
        let cfg = NetworkConfig::default();
        let mut bytes = encode_header(&sample(&cfg), &cfg).unwrap();
        bytes[0] = 0x00;
        assert_eq!(
            decode_header(&bytes).unwrap_err(),
            TransactionError::InvalidMarker(0x00)
        );
    }

    #[test]
    fn truncated_header_is_rejected() {
        let cfg = NetworkConfig::default();
        let bytes = encode_header(&sample(&cfg), &cfg).unwrap();
        assert!(matches!(
            decode_header(&bytes[..20]),
            Err(TransactionError::TruncatedBuffer { .. })
        ));
    }

    #[test]
    fn missing_sender_key_cannot_be_encoded() {
        let cfg = NetworkConfig::default();
        let tx = Transaction::validator_resignation(&cfg);
        assert_eq!(
            encode_header(&tx, &cfg).unwrap_err(),
            TransactionError::MissingSenderPublicKey
        );
    }
}
