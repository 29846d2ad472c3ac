use crate::util::errors::{Error, Result, StdError};
use k256::ecdsa::SigningKey;
use k8s_openapi::ByteString;
use rand::rngs::OsRng;
use sha3::{Digest, Keccak256};
use std::collections::BTreeMap;

/// Secret data key holding the raw private key (64 hex chars, no prefix).
pub const PRIVATE_KEY_KEY: &str = "privateKey";
/// Secret data key holding the checksummed account address.
pub const PUBLIC_KEY_KEY: &str = "publicKey";

/// A secp256k1 key pair for an externally-owned account.
#[derive(Debug, Clone)]
pub struct EthereumKeyPair {
    signing_key: SigningKey,
}

impl EthereumKeyPair {
    pub fn generate() -> Result<Self> {
        let signing_key = SigningKey::random(&mut OsRng);
        Ok(EthereumKeyPair { signing_key })
    }

    /// Reconstruct a key pair from a raw private key in hex (with or without
    /// a `0x` prefix).
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self> {
        let trimmed = hex_key.strip_prefix("0x").unwrap_or(hex_key);
        let bytes = hex::decode(trimmed)
            .map_err(|e| Error::StdError(StdError::DecodingError(e.to_string())))?;
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|e| Error::StdError(StdError::CryptoError(e.to_string())))?;
        Ok(EthereumKeyPair { signing_key })
    }

    /// The private key as 64 lowercase hex characters, no prefix.
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// The account address: Keccak-256 of the 64-byte uncompressed public
    /// key, lower 20 bytes, EIP-55 checksum casing, `0x` prefix.
    pub fn address(&self) -> String {
        let verifying_key = self.signing_key.verifying_key();
        let point = verifying_key.to_encoded_point(false);
        // skip the 0x04 uncompressed-point tag
        let digest = Keccak256::digest(&point.as_bytes()[1..]);
        let mut raw = [0u8; 20];
        raw.copy_from_slice(&digest[12..]);
        to_checksum_address(&raw)
    }

    pub fn to_secret_data(&self) -> BTreeMap<String, ByteString> {
        let mut data = BTreeMap::new();
        data.insert(
            PRIVATE_KEY_KEY.to_string(),
            ByteString(self.private_key_hex().into_bytes()),
        );
        data.insert(
            PUBLIC_KEY_KEY.to_string(),
            ByteString(self.address().into_bytes()),
        );
        data
    }
}

/// EIP-55 mixed-case checksum encoding of a 20-byte account address.
pub fn to_checksum_address(address: &[u8; 20]) -> String {
    let hex_addr = hex::encode(address);
    let hash = Keccak256::digest(hex_addr.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in hex_addr.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if nibble >= 8 {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // anvil's well-known developer account #0
    const ANVIL_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const ANVIL_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn derives_known_address_from_private_key() {
        let pair = EthereumKeyPair::from_private_key_hex(ANVIL_PRIVATE_KEY).unwrap();
        assert_eq!(pair.address(), ANVIL_ADDRESS);
        assert_eq!(pair.private_key_hex(), ANVIL_PRIVATE_KEY);
    }

    #[test]
    fn accepts_prefixed_private_key() {
        let prefixed = format!("0x{ANVIL_PRIVATE_KEY}");
        let pair = EthereumKeyPair::from_private_key_hex(&prefixed).unwrap();
        assert_eq!(pair.address(), ANVIL_ADDRESS);
    }

    #[test]
    fn generated_pair_has_wellformed_material() {
        let pair = EthereumKeyPair::generate().unwrap();
        let private = pair.private_key_hex();
        assert_eq!(private.len(), 64);
        assert!(private.chars().all(|c| c.is_ascii_hexdigit()));

        let address = pair.address();
        assert_eq!(address.len(), 42);
        assert!(address.starts_with("0x"));
    }

    #[test]
    fn checksum_matches_eip55_reference_vectors() {
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let raw: [u8; 20] = hex::decode(expected.trim_start_matches("0x"))
                .unwrap()
                .try_into()
                .unwrap();
            assert_eq!(to_checksum_address(&raw), expected);
        }
    }

    #[test]
    fn secret_data_roundtrips_through_import() {
        let pair = EthereumKeyPair::generate().unwrap();
        let data = pair.to_secret_data();

        let private = String::from_utf8(data[PRIVATE_KEY_KEY].0.clone()).unwrap();
        let public = String::from_utf8(data[PUBLIC_KEY_KEY].0.clone()).unwrap();

        let recovered = EthereumKeyPair::from_private_key_hex(&private).unwrap();
        assert_eq!(recovered.address(), public);
    }
}
