//! Keys - family seed → keypair → classic address
//!
//! ```text
//! seed (16 bytes, base58 "s…")
//!     ├── secp256k1: root = SHA512Half(seed ‖ seq), key = root + SHA512Half(rootPub ‖ 0 ‖ seq)
//!     └── ed25519:   key = SHA512Half(seed)
//!                         │
//!                         ▼
//!               account id = RIPEMD160(SHA256(pubkey)) → base58check "r…"
//! ```

use crate::error::{LedgerError, LedgerResult};
use bitcoin::hashes::{hash160, Hash};
use bitcoin::secp256k1::{self, Message, PublicKey, Scalar, Secp256k1, SecretKey};
use ed25519_dalek::Signer as _;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

const ALPHABET: &[u8; 58] = b"rpshnaf39wBUDNEGHJKLM4PQRST7VWXYZ2bcdeCg65jkm8oFqi1tuvAxyz";

const SECP256K1_SEED_PREFIX: &[u8] = &[0x21];
const ED25519_SEED_PREFIX: &[u8] = &[0x01, 0xE1, 0x4B];
const ACCOUNT_ID_PREFIX: u8 = 0x00;
const ED25519_KEY_PREFIX: u8 = 0xED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyType {
    #[default]
    Secp256k1,
    Ed25519,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Secp256k1 => "secp256k1",
            KeyType::Ed25519 => "ed25519",
        }
    }
}

/// 16 bytes of seed entropy. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    entropy: [u8; 16],
    #[zeroize(skip)]
    key_type: KeyType,
}

impl Seed {
    pub fn from_entropy(entropy: [u8; 16], key_type: KeyType) -> Self {
        Self { entropy, key_type }
    }

    pub fn random(key_type: KeyType) -> Self {
        Self::from_entropy(rand::random(), key_type)
    }

    /// Parse a base58 seed string (`s…` or `sEd…`).
    pub fn decode(secret: &str) -> LedgerResult<Self> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(LedgerError::InvalidSecret("empty seed".into()));
        }
        let payload = base58check_decode(secret)
            .ok_or_else(|| LedgerError::InvalidSecret("not a base58check string".into()))?;

        let (key_type, body) = if let Some(body) = payload.strip_prefix(ED25519_SEED_PREFIX) {
            (KeyType::Ed25519, body)
        } else if let Some(body) = payload.strip_prefix(SECP256K1_SEED_PREFIX) {
            (KeyType::Secp256k1, body)
        } else {
            return Err(LedgerError::InvalidSecret("unrecognised seed prefix".into()));
        };
        let entropy: [u8; 16] = body
            .try_into()
            .map_err(|_| LedgerError::InvalidSecret(format!("seed must hold 16 bytes, got {}", body.len())))?;
        Ok(Self { entropy, key_type })
    }

    pub fn encode(&self) -> String {
        let prefix = match self.key_type {
            KeyType::Secp256k1 => SECP256K1_SEED_PREFIX,
            KeyType::Ed25519 => ED25519_SEED_PREFIX,
        };
        let mut payload = prefix.to_vec();
        payload.extend_from_slice(&self.entropy);
        let encoded = base58check_encode(&payload);
        payload.zeroize();
        encoded
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed").field("key_type", &self.key_type).finish_non_exhaustive()
    }
}

/// Signing keypair derived from a [`Seed`].
pub enum Keypair {
    Secp256k1 { secret: SecretKey, public: PublicKey },
    Ed25519(ed25519_dalek::SigningKey),
}

impl Keypair {
    pub fn from_seed(seed: &Seed) -> LedgerResult<Self> {
        match seed.key_type {
            KeyType::Secp256k1 => {
                let secp = Secp256k1::new();
                let secret = derive_secp256k1(&secp, &seed.entropy)?;
                let public = PublicKey::from_secret_key(&secp, &secret);
                Ok(Keypair::Secp256k1 { secret, public })
            }
            KeyType::Ed25519 => {
                let mut key = sha512_half(&seed.entropy);
                let signing = ed25519_dalek::SigningKey::from_bytes(&key);
                key.zeroize();
                Ok(Keypair::Ed25519(signing))
            }
        }
    }

    /// 33-byte public key as the ledger expects it in `SigningPubKey`.
    pub fn public_key(&self) -> Vec<u8> {
        match self {
            Keypair::Secp256k1 { public, .. } => public.serialize().to_vec(),
            Keypair::Ed25519(signing) => {
                let mut out = Vec::with_capacity(33);
                out.push(ED25519_KEY_PREFIX);
                out.extend_from_slice(signing.verifying_key().as_bytes());
                out
            }
        }
    }

    pub fn account_id(&self) -> [u8; 20] {
        hash160::Hash::hash(&self.public_key()).to_byte_array()
    }

    pub fn address(&self) -> String {
        encode_address(&self.account_id())
    }

    /// secp256k1 signs SHA512Half(message) as DER; ed25519 signs the raw message.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Keypair::Secp256k1 { secret, .. } => {
                let secp = Secp256k1::signing_only();
                let digest = Message::from_digest(sha512_half(message));
                secp.sign_ecdsa(&digest, secret).serialize_der().to_vec()
            }
            Keypair::Ed25519(signing) => signing.sign(message).to_bytes().to_vec(),
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair").field("public_key", &hex::encode_upper(self.public_key())).finish_non_exhaustive()
    }
}

fn derive_secp256k1(secp: &Secp256k1<secp256k1::All>, entropy: &[u8; 16]) -> LedgerResult<SecretKey> {
    let root_bytes = first_valid_scalar(|seq| {
        let mut input = entropy.to_vec();
        input.extend_from_slice(&seq.to_be_bytes());
        input
    })?;
    let root = SecretKey::from_slice(&root_bytes).map_err(|e| LedgerError::InvalidSecret(e.to_string()))?;
    let root_public = PublicKey::from_secret_key(secp, &root).serialize();

    // Account index 0
    let tweak_bytes = first_valid_scalar(|seq| {
        let mut input = root_public.to_vec();
        input.extend_from_slice(&0u32.to_be_bytes());
        input.extend_from_slice(&seq.to_be_bytes());
        input
    })?;
    let tweak = Scalar::from_be_bytes(tweak_bytes).map_err(|e| LedgerError::InvalidSecret(e.to_string()))?;
    root.add_tweak(&tweak).map_err(|e| LedgerError::InvalidSecret(e.to_string()))
}

fn first_valid_scalar(input: impl Fn(u32) -> Vec<u8>) -> LedgerResult<[u8; 32]> {
    for seq in 0..=u32::MAX {
        let candidate = sha512_half(&input(seq));
        if SecretKey::from_slice(&candidate).is_ok() {
            return Ok(candidate);
        }
    }
    Err(LedgerError::InvalidSecret("no valid key for seed".into()))
}

/// First 32 bytes of SHA-512.
pub fn sha512_half(data: &[u8]) -> [u8; 32] {
    let digest = Sha512::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    out
}

pub fn encode_address(account_id: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(ACCOUNT_ID_PREFIX);
    payload.extend_from_slice(account_id);
    base58check_encode(&payload)
}

/// Classic `r…` address → 20-byte account id.
pub fn decode_address(address: &str) -> Option<[u8; 20]> {
    let payload = base58check_decode(address.trim())?;
    match payload.split_first() {
        Some((&ACCOUNT_ID_PREFIX, body)) => body.try_into().ok(),
        _ => None,
    }
}

pub fn is_valid_address(address: &str) -> bool {
    decode_address(address).is_some()
}

fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(Sha256::digest(payload));
    [digest[0], digest[1], digest[2], digest[3]]
}

fn base58check_encode(payload: &[u8]) -> String {
    let mut data = payload.to_vec();
    data.extend_from_slice(&checksum(payload));
    base58_encode(&data)
}

fn base58check_decode(encoded: &str) -> Option<Vec<u8>> {
    let mut data = base58_decode(encoded)?;
    if data.len() < 5 {
        return None;
    }
    let sum = data.split_off(data.len() - 4);
    (checksum(&data)[..] == sum[..]).then_some(data)
}

fn base58_encode(input: &[u8]) -> String {
    let zeros = input.iter().take_while(|&&b| b == 0).count();
    // Little-endian base-58 digits
    let mut digits: Vec<u8> = Vec::with_capacity(input.len() * 138 / 100 + 1);
    for &byte in input {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }
    let mut out = String::with_capacity(zeros + digits.len());
    out.extend(std::iter::repeat(ALPHABET[0] as char).take(zeros));
    out.extend(digits.iter().rev().map(|&d| ALPHABET[d as usize] as char));
    out
}

fn base58_decode(input: &str) -> Option<Vec<u8>> {
    let zeros = input.bytes().take_while(|&c| c == ALPHABET[0]).count();
    // Little-endian base-256 bytes
    let mut bytes: Vec<u8> = Vec::with_capacity(input.len());
    for c in input.bytes() {
        let mut carry = ALPHABET.iter().position(|&a| a == c)? as u32;
        for byte in bytes.iter_mut() {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }
    let mut out = vec![0u8; zeros];
    out.extend(bytes.iter().rev());
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTROPY: [u8; 16] = [
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08,
        0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10,
    ];

    #[test]
    fn base58_preserves_leading_zeros() {
        let data = [0u8, 0, 1, 2, 255];
        let encoded = base58_encode(&data);
        assert!(encoded.starts_with("rr"));
        assert_eq!(base58_decode(&encoded).unwrap(), data);
        assert!(base58_decode("0OIl").is_none());
    }

    #[test]
    fn seed_encoding_prefixes() {
        let secp = Seed::from_entropy(ENTROPY, KeyType::Secp256k1).encode();
        assert!(secp.starts_with('s'));
        let ed = Seed::from_entropy(ENTROPY, KeyType::Ed25519).encode();
        assert!(ed.starts_with("sEd"));

        assert_eq!(Seed::decode(&secp).unwrap().key_type(), KeyType::Secp256k1);
        assert_eq!(Seed::decode(&ed).unwrap().key_type(), KeyType::Ed25519);
        assert_eq!(Seed::decode(&format!("  {}\n", secp)).unwrap().encode(), secp);
    }

    #[test]
    fn seed_rejects_garbage() {
        for bad in ["", "   ", "hello world", "s0000", "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh"] {
            assert!(matches!(Seed::decode(bad), Err(LedgerError::InvalidSecret(_))), "{bad:?}");
        }
    }

    #[test]
    fn seed_rejects_bad_checksum() {
        let good = Seed::from_entropy(ENTROPY, KeyType::Secp256k1).encode();
        let mut chars: Vec<char> = good.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == 'r' { 'p' } else { 'r' };
        let bad: String = chars.into_iter().collect();
        assert!(matches!(Seed::decode(&bad), Err(LedgerError::InvalidSecret(_))));
    }

    #[test]
    fn address_derivation_is_deterministic() {
        for key_type in [KeyType::Secp256k1, KeyType::Ed25519] {
            let seed = Seed::from_entropy(ENTROPY, key_type);
            let a = Keypair::from_seed(&seed).unwrap();
            let b = Keypair::from_seed(&Seed::decode(&seed.encode()).unwrap()).unwrap();
            assert_eq!(a.address(), b.address());
            assert!(a.address().starts_with('r'));
            assert_eq!(decode_address(&a.address()).unwrap(), a.account_id());
            assert_eq!(a.public_key().len(), 33);
        }
        let secp = Keypair::from_seed(&Seed::from_entropy(ENTROPY, KeyType::Secp256k1)).unwrap();
        let ed = Keypair::from_seed(&Seed::from_entropy(ENTROPY, KeyType::Ed25519)).unwrap();
        assert_ne!(secp.address(), ed.address());
        assert_eq!(ed.public_key()[0], ED25519_KEY_PREFIX);
    }

    #[test]
    fn secp256k1_signature_verifies() {
        let keypair = Keypair::from_seed(&Seed::from_entropy(ENTROPY, KeyType::Secp256k1)).unwrap();
        let message = b"escrow";
        let der = keypair.sign(message);
        let sig = secp256k1::ecdsa::Signature::from_der(&der).unwrap();
        let public = PublicKey::from_slice(&keypair.public_key()).unwrap();
        let digest = Message::from_digest(sha512_half(message));
        assert!(Secp256k1::verification_only().verify_ecdsa(&digest, &sig, &public).is_ok());
    }

    #[test]
    fn ed25519_signature_verifies() {
        use ed25519_dalek::Verifier;
        let keypair = Keypair::from_seed(&Seed::from_entropy(ENTROPY, KeyType::Ed25519)).unwrap();
        let bytes = keypair.sign(b"escrow");
        let sig = ed25519_dalek::Signature::from_slice(&bytes).unwrap();
        let Keypair::Ed25519(signing) = &keypair else { panic!("ed25519 expected") };
        assert!(signing.verifying_key().verify(b"escrow", &sig).is_ok());
    }

    #[test]
    fn published_secp256k1_vector() {
        let keypair = Keypair::from_seed(&Seed::decode("snoPBrXtMeMyMHUVTgbuqAfg1SUTb").unwrap()).unwrap();
        assert_eq!(
            hex::encode_upper(keypair.public_key()),
            "0330E7FC9D56BB25D6893BA3F317AE5BCF33B3291BD63DB32654A313222F7FD020"
        );
        assert_eq!(keypair.address(), "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh");
    }

    #[test]
    fn published_ed25519_vector() {
        let seed = Seed::decode("sEdSKaCy2JT7JaM7v95H9SxkhP9wS2r").unwrap();
        assert_eq!(seed.key_type(), KeyType::Ed25519);
        let keypair = Keypair::from_seed(&seed).unwrap();
        assert_eq!(
            hex::encode_upper(keypair.public_key()),
            "ED01FA53FA5A7E77798F882ECE20B1ABC00BB358A9E55A202D0D0676BD0CE37A63"
        );
        assert_eq!(keypair.address(), "rLUEXYuLiQptky37CqLcm9USQpPiz5rkpD");
    }

    #[test]
    fn seed_encoding_vectors() {
        assert_eq!(Seed::from_entropy([7; 16], KeyType::Ed25519).encode(), "sEdSPx8CLbFUna3DJdvJ74aQPLdemqu");
        assert_eq!(Seed::from_entropy([8; 16], KeyType::Secp256k1).encode(), "spo8qe5zAf3jdZPHGM3ouXW21LPup");
    }

    #[test]
    fn random_seeds_differ() {
        assert_ne!(Seed::random(KeyType::Secp256k1).encode(), Seed::random(KeyType::Secp256k1).encode());
    }
}
