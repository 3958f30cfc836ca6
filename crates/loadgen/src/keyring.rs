//! Secp256k1 wallets and address derivation for both ledger kinds.

use core::fmt;

use bech32::{FromBase32, ToBase32, Variant};
use rand::RngCore;
use ripemd::Ripemd160;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

pub mod errors;

use errors::Error;

/// How a public key is turned into a user-facing account address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddressType {
    /// `bech32(prefix, ripemd160(sha256(compressed_pubkey)))`
    Cosmos { account_prefix: String },
    /// `0x` + lowercase hex of `keccak256(uncompressed_pubkey[1..])[12..]`
    Ethereum,
}

pub fn keccak256_hash(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(bytes);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Derive the 20-byte account hash of a public key.
pub fn get_address(public_key: &PublicKey, address_type: &AddressType) -> [u8; 20] {
    match address_type {
        AddressType::Ethereum => {
            let public_key = public_key.serialize_uncompressed();
            // 0x04 is SECP256K1_TAG_PUBKEY_UNCOMPRESSED
            debug_assert_eq!(public_key[0], 0x04);

            let hashed_key = keccak256_hash(&public_key[1..]);
            // right-most 20 bytes of the 32-byte keccak hash
            hashed_key[12..].try_into().unwrap()
        }
        AddressType::Cosmos { .. } => {
            Ripemd160::digest(Sha256::digest(public_key.serialize())).into()
        }
    }
}

pub fn encode_bech32(account_prefix: &str, address: &[u8]) -> Result<String, Error> {
    bech32::encode(account_prefix, address.to_base32(), Variant::Bech32)
        .map_err(Error::bech32_encoding)
}

pub fn decode_bech32(input: &str) -> Result<Vec<u8>, Error> {
    let (_, data, _) = bech32::decode(input).map_err(Error::bech32_decoding)?;

    Vec::<u8>::from_base32(&data).map_err(Error::bech32_decoding)
}

/// Render the address bytes the way the ledger kind displays them.
///
/// Pure function of its inputs: no process-global prefix state is consulted
/// or mutated.
pub fn render_address(address: &[u8; 20], address_type: &AddressType) -> Result<String, Error> {
    match address_type {
        AddressType::Cosmos { account_prefix } => encode_bech32(account_prefix, address),
        AddressType::Ethereum => Ok(format!("0x{}", hex::encode(address))),
    }
}

/// A funded account on one chain: identifier, rendered address, and the
/// secp256k1 key controlling it.
#[derive(Clone)]
pub struct Wallet {
    id: String,
    address: String,
    address_bytes: [u8; 20],
    private_key: SecretKey,
}

impl Wallet {
    /// Import a wallet from a hex-encoded 32-byte private key.
    ///
    /// A leading `0x` is accepted and ignored, so Ethereum-style key dumps
    /// can be pasted as-is.
    pub fn from_private_key_hex(
        id: impl Into<String>,
        private_key_hex: &str,
        address_type: &AddressType,
    ) -> Result<Self, Error> {
        let trimmed = private_key_hex.trim_start_matches("0x");
        let key_bytes = hex::decode(trimmed).map_err(Error::invalid_hex_key)?;

        if key_bytes.len() != 32 {
            return Err(Error::invalid_key_length(key_bytes.len()));
        }

        let private_key = SecretKey::from_slice(&key_bytes).map_err(Error::invalid_secret_key)?;

        Self::from_secret_key(id, private_key, address_type)
    }

    /// Generate a wallet with a fresh random key.
    pub fn generate(id: impl Into<String>, address_type: &AddressType) -> Result<Self, Error> {
        let mut rng = rand::thread_rng();

        // Rejection-sample until the bytes form a valid scalar. A retry is
        // astronomically unlikely but `from_slice` is fallible.
        let private_key = loop {
            let mut key_bytes = [0u8; 32];
            rng.fill_bytes(&mut key_bytes);

            if let Ok(key) = SecretKey::from_slice(&key_bytes) {
                break key;
            }
        };

        Self::from_secret_key(id, private_key, address_type)
    }

    fn from_secret_key(
        id: impl Into<String>,
        private_key: SecretKey,
        address_type: &AddressType,
    ) -> Result<Self, Error> {
        let public_key = private_key.public_key(&Secp256k1::signing_only());
        let address_bytes = get_address(&public_key, address_type);
        let address = render_address(&address_bytes, address_type)?;

        Ok(Self {
            id: id.into(),
            address,
            address_bytes,
            private_key,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn address_bytes(&self) -> [u8; 20] {
        self.address_bytes
    }

    pub fn public_key(&self) -> PublicKey {
        self.private_key.public_key(&Secp256k1::signing_only())
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(self.private_key.secret_bytes())
    }

    pub(crate) fn secret_bytes(&self) -> [u8; 32] {
        self.private_key.secret_bytes()
    }

    /// Sign `message` the Cosmos SDK way: sha256 digest, compact ECDSA,
    /// no recovery byte.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let digest = Sha256::digest(message);
        let message = Message::from_digest(digest.into());

        Secp256k1::signing_only()
            .sign_ecdsa(&message, &self.private_key)
            .serialize_compact()
            .to_vec()
    }
}

// The private key must never end up in logs.
impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("id", &self.id)
            .field("address", &self.address)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use ethers::signers::Signer;

    use super::*;

    const TEST_KEY: &str = "2e09165b257a4f2b05b8acff46a28e2c861e0cbad4a3e7989bd53e2992b847d7";

    fn cosmos() -> AddressType {
        AddressType::Cosmos {
            account_prefix: "cosmos".to_string(),
        }
    }

    #[test]
    fn cosmos_address_is_deterministic() {
        let a = Wallet::from_private_key_hex("w", TEST_KEY, &cosmos()).unwrap();
        let b = Wallet::from_private_key_hex("w", TEST_KEY, &cosmos()).unwrap();

        assert_eq!(a.address(), b.address());
        assert!(a.address().starts_with("cosmos1"));
    }

    #[test]
    fn cosmos_address_round_trips_through_bech32() {
        let wallet = Wallet::from_private_key_hex("w", TEST_KEY, &cosmos()).unwrap();
        let decoded = decode_bech32(wallet.address()).unwrap();

        assert_eq!(decoded, wallet.address_bytes().to_vec());
    }

    #[test]
    fn ethereum_address_matches_ethers_derivation() {
        let wallet =
            Wallet::from_private_key_hex("w", TEST_KEY, &AddressType::Ethereum).unwrap();

        let ethers_wallet =
            ethers::signers::LocalWallet::from_bytes(&wallet.secret_bytes()).unwrap();

        assert_eq!(
            wallet.address(),
            format!("0x{}", hex::encode(ethers_wallet.address().as_bytes()))
        );
    }

    #[test]
    fn hex_prefix_is_accepted() {
        let bare = Wallet::from_private_key_hex("w", TEST_KEY, &AddressType::Ethereum).unwrap();
        let prefixed = Wallet::from_private_key_hex(
            "w",
            &format!("0x{TEST_KEY}"),
            &AddressType::Ethereum,
        )
        .unwrap();

        assert_eq!(bare.address(), prefixed.address());
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(Wallet::from_private_key_hex("w", "zz", &AddressType::Ethereum).is_err());
        assert!(Wallet::from_private_key_hex("w", "abcd", &AddressType::Ethereum).is_err());
    }

    #[test]
    fn debug_redacts_private_key() {
        let wallet = Wallet::from_private_key_hex("w", TEST_KEY, &cosmos()).unwrap();
        let rendered = format!("{wallet:?}");

        assert!(!rendered.contains(TEST_KEY));
        assert!(rendered.contains(wallet.address()));
    }

    #[test]
    fn generated_wallets_are_distinct() {
        let a = Wallet::generate("a", &AddressType::Ethereum).unwrap();
        let b = Wallet::generate("b", &AddressType::Ethereum).unwrap();

        assert_ne!(a.address(), b.address());
    }
}
