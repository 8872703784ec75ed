//! Sender wallet state as reported by the network.
//!
//! The codec never fetches this itself. A collaborator asks a peer for the
//! wallet, deserializes the response into a [`WalletSnapshot`] and hands it
//! to [`Transaction::bind_sender`](crate::transaction::Transaction::bind_sender).

use serde::{Deserialize, Serialize};

use super::address::address_from_public_key;
use crate::config::deserialize_numeric;
use crate::crypto::keys::PublicKey;
use crate::transaction::asset::MultiSignatureAsset;

/// A point-in-time view of a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSnapshot {
    pub address: String,

    /// Hex public key. Absent for wallets that never sent a transaction.
    #[serde(default)]
    pub public_key: Option<String>,

    /// Nonce of the last transaction the wallet sent. Peers serve it as a
    /// decimal string.
    #[serde(default, deserialize_with = "deserialize_numeric")]
    pub nonce: u64,

    #[serde(default)]
    pub attributes: WalletAttributes,
}

/// The wallet attributes the builders care about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAttributes {
    /// Validator public key the wallet currently votes for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote: Option<String>,

    /// Registered threshold policy, for wallets that are multi-signature
    /// accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_signature: Option<MultiSignatureAsset>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_public_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl WalletSnapshot {
    /// A wallet the network has never seen: nonce 0, no attributes.
    pub fn cold(public_key: &PublicKey, network_version: u8) -> Self {
        Self {
            address: address_from_public_key(public_key, network_version),
            public_key: Some(public_key.to_hex()),
            nonce: 0,
            attributes: WalletAttributes::default(),
        }
    }

    /// Nonce the wallet's next transaction must carry.
    pub fn next_nonce(&self) -> Option<u64> {
        self.nonce.checked_add(1)
    }

    pub fn is_multi_signature(&self) -> bool {
        self.attributes.multi_signature.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrivateKey;

    #[test]
    fn parses_peer_response_with_string_nonce() {
        let json = r#"{
            "address": "D6Z26L69gdk9qYmTv5uzk3uGepigtHY4ax",
            "publicKey": "03287bfebba4c7881a0509717e71b34b63f31e40021c321f89ae04f84be6d6ac37",
            "nonce": "12",
            "attributes": {
                "vote": "022cca9529ec97a772156c152a00aad155ee6708243e65c9d211a589cb5d43234d",
                "username": "genesis_1"
            }
        }"#;
        let wallet: WalletSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(wallet.nonce, 12);
        assert_eq!(wallet.next_nonce(), Some(13));
        assert_eq!(wallet.attributes.username.as_deref(), Some("genesis_1"));
        assert!(!wallet.is_multi_signature());
    }

    #[test]
    fn parses_numeric_nonce_and_multisig_attributes() {
        let json = r#"{
            "address": "D6Z26L69gdk9qYmTv5uzk3uGepigtHY4ax",
            "nonce": 4,
            "attributes": { "multiSignature": { "min": 2, "publicKeys": [] } }
        }"#;
        let wallet: WalletSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(wallet.nonce, 4);
        assert!(wallet.public_key.is_none());
        assert_eq!(wallet.attributes.multi_signature.unwrap().min, 2);
    }

    #[test]
    fn cold_wallet_starts_at_nonce_zero() {
        let pk = PrivateKey::from_passphrase("cold").unwrap().public_key();
        let wallet = WalletSnapshot::cold(&pk, 30);
        assert_eq!(wallet.next_nonce(), Some(1));
        assert_eq!(wallet.public_key, Some(pk.to_hex()));
        assert!(wallet.address.starts_with('D'));
    }

    #[test]
    fn nonce_overflow_is_reported() {
        let pk = PrivateKey::from_passphrase("full").unwrap().public_key();
        let mut wallet = WalletSnapshot::cold(&pk, 30);
        wallet.nonce = u64::MAX;
        assert_eq!(wallet.next_nonce(), None);
    }
}
