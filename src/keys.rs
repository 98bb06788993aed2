//! Key material: legacy single keys, BIP32 HD keys and secret parsing

use std::str::FromStr;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bip39::{Language, Mnemonic};
use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv, Xpub};
use bitcoin::Network;
use secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use serde::Deserialize;

use crate::address::{self, AddressKind, Destination};
use crate::config::ChainParams;
use crate::error::{Result, WalletError};
use crate::hashes::hash160;

/// Path reported for the single key of a legacy wallet
pub const LEGACY_PATH: &str = "legacy";

/// Word counts accepted for an imported seed phrase
const SEED_PHRASE_WORDS: [usize; 2] = [12, 24];

fn key_error<E: std::fmt::Display>(e: E) -> WalletError {
    WalletError::Key(e.to_string())
}

/// A source of addresses and signing keys for one wallet
pub trait MasterKey: Send + Sync {
    fn is_hd(&self) -> bool;

    /// No private key material is held
    fn is_view_only(&self) -> bool;

    /// Signing happens on an external device
    fn is_hardware_wallet(&self) -> bool {
        false
    }

    fn derivation_path(&self, account: u32, chain: u32, index: u32) -> String;

    /// Standard address at `path`
    fn address(&self, path: &str) -> Result<String>;

    fn private_key(&self, path: &str) -> Result<SecretKey>;

    /// Public identifier used to query explorers: an account xpub or the
    /// single address of a legacy key
    fn key_to_export(&self, account: u32) -> Result<String>;

    /// The most private form of the key available
    fn key_to_backup(&self) -> Result<String>;
}

/// Parse a `m/44'/coin'/account'/chain/index` path
pub fn parse_path(path: &str) -> Result<DerivationPath> {
    DerivationPath::from_str(path)
        .map_err(|e| WalletError::Key(format!("invalid derivation path {}: {}", path, e)))
}

/// `(chain, index)` of a full BIP44 path
pub fn chain_and_index(path: &str) -> Option<(u32, u32)> {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() != 6 {
        return None;
    }
    Some((parts[4].parse().ok()?, parts[5].parse().ok()?))
}

/// Lowercase a seed phrase and collapse its whitespace, then check it is a
/// 12 or 24 word English BIP39 mnemonic with a valid checksum
pub fn clean_seed_phrase(phrase: &str) -> Result<Mnemonic> {
    let cleaned = phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    let words = cleaned.split_whitespace().count();
    if !SEED_PHRASE_WORDS.contains(&words) {
        return Err(WalletError::Key(format!(
            "seed phrase has {} words, expected 12 or 24",
            words
        )));
    }
    Mnemonic::parse_in_normalized(Language::English, &cleaned)
        .map_err(|e| WalletError::Key(format!("invalid seed phrase: {}", e)))
}

/// BIP39 seed of a mnemonic phrase
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<[u8; 64]> {
    Ok(clean_seed_phrase(phrase)?.to_seed(passphrase))
}

// ============================================================================
// LEGACY KEYS
// ============================================================================

/// A single key, or a single watched address
pub struct LegacyMasterKey {
    secret: Option<SecretKey>,
    address: String,
    secret_key_prefix: u8,
}

impl LegacyMasterKey {
    pub fn from_secret(secret: SecretKey, params: &ChainParams) -> Self {
        let secp = Secp256k1::signing_only();
        let pubkey = PublicKey::from_secret_key(&secp, &secret);
        let address = address::address_from_hash(
            params,
            &hash160(&pubkey.serialize()),
            AddressKind::Standard,
        );
        Self {
            secret: Some(secret),
            address,
            secret_key_prefix: params.secret_key_prefix,
        }
    }

    pub fn from_bytes(bytes: &[u8], params: &ChainParams) -> Result<Self> {
        let secret = SecretKey::from_slice(bytes).map_err(key_error)?;
        Ok(Self::from_secret(secret, params))
    }

    /// View-only key watching a standard address
    pub fn from_address(address: &str, params: &ChainParams) -> Result<Self> {
        match Destination::parse(address, params)? {
            Destination::Standard(_) => Ok(Self {
                secret: None,
                address: address.to_string(),
                secret_key_prefix: params.secret_key_prefix,
            }),
            _ => Err(WalletError::InvalidAddress(format!(
                "{} is not a standard address",
                address
            ))),
        }
    }

    pub fn wif(&self) -> Option<String> {
        self.secret.map(|secret| {
            let mut payload = Vec::with_capacity(34);
            payload.push(self.secret_key_prefix);
            payload.extend_from_slice(&secret.secret_bytes());
            payload.push(0x01);
            address::encode_base58(&payload)
        })
    }
}

impl MasterKey for LegacyMasterKey {
    fn is_hd(&self) -> bool {
        false
    }

    fn is_view_only(&self) -> bool {
        self.secret.is_none()
    }

    fn derivation_path(&self, _account: u32, _chain: u32, _index: u32) -> String {
        LEGACY_PATH.to_string()
    }

    fn address(&self, _path: &str) -> Result<String> {
        Ok(self.address.clone())
    }

    fn private_key(&self, _path: &str) -> Result<SecretKey> {
        self.secret
            .ok_or_else(|| WalletError::StateInvariant("view-only key cannot sign".to_string()))
    }

    fn key_to_export(&self, _account: u32) -> Result<String> {
        Ok(self.address.clone())
    }

    fn key_to_backup(&self) -> Result<String> {
        Ok(self.wif().unwrap_or_else(|| self.address.clone()))
    }
}

/// Decode a WIF private key of the given network
pub fn parse_wif(wif: &str, params: &ChainParams) -> Result<SecretKey> {
    let payload = address::decode_base58(wif).map_err(|_| WalletError::Key("invalid WIF".to_string()))?;
    let compressed = payload.len() == 34 && payload[33] == 0x01;
    if payload.is_empty() || payload[0] != params.secret_key_prefix || !(compressed || payload.len() == 33) {
        return Err(WalletError::Key("invalid WIF".to_string()));
    }
    SecretKey::from_slice(&payload[1..33]).map_err(key_error)
}

// ============================================================================
// HD KEYS
// ============================================================================

/// Extended keys always carry the mainnet `xprv`/`xpub` version bytes,
/// whatever chain the wallet runs on
const EXTENDED_KEY_NETWORK: Network = Network::Bitcoin;

#[derive(Clone)]
enum HdRoot {
    Private(Xpriv),
    Public(Xpub),
}

/// BIP44 wallet rooted either at a master key (seed or xprv) or at an
/// account-level xpub
pub struct HdMasterKey {
    root: HdRoot,
    /// `root` is an account key; only chain/index are derived from it
    account_level: bool,
    params: ChainParams,
    secp: Secp256k1<All>,
}

impl HdMasterKey {
    fn new(root: HdRoot, account_level: bool, params: &ChainParams) -> Self {
        Self {
            root,
            account_level,
            params: params.clone(),
            secp: Secp256k1::new(),
        }
    }

    pub fn from_seed(seed: &[u8], params: &ChainParams) -> Result<Self> {
        let root = Xpriv::new_master(EXTENDED_KEY_NETWORK, seed).map_err(key_error)?;
        Ok(Self::new(HdRoot::Private(root), false, params))
    }

    pub fn from_mnemonic(phrase: &str, passphrase: &str, params: &ChainParams) -> Result<Self> {
        Self::from_seed(&mnemonic_to_seed(phrase, passphrase)?, params)
    }

    pub fn from_xprv(xprv: &str, params: &ChainParams) -> Result<Self> {
        let root = Xpriv::from_str(xprv)
            .map_err(|e| WalletError::Key(format!("expected an extended private key: {}", e)))?;
        Ok(Self::new(HdRoot::Private(root), false, params))
    }

    pub fn from_xpub(xpub: &str, params: &ChainParams) -> Result<Self> {
        let root = Xpub::from_str(xpub)
            .map_err(|e| WalletError::Key(format!("expected an extended public key: {}", e)))?;
        Ok(Self::new(HdRoot::Public(root), true, params))
    }

    fn derive(&self, path: &str) -> Result<HdRoot> {
        let path = parse_path(path)?;
        let children: &[ChildNumber] = path.as_ref();
        if self.account_level {
            // m/44'/coin'/account' is already applied
            self.derive_children(children.get(3..).unwrap_or_default())
        } else {
            self.derive_children(children)
        }
    }

    fn derive_children(&self, children: &[ChildNumber]) -> Result<HdRoot> {
        let path = DerivationPath::from(children.to_vec());
        match &self.root {
            HdRoot::Private(xprv) => Ok(HdRoot::Private(
                xprv.derive_priv(&self.secp, &path).map_err(key_error)?,
            )),
            HdRoot::Public(xpub) => Ok(HdRoot::Public(
                xpub.derive_pub(&self.secp, &path).map_err(key_error)?,
            )),
        }
    }

    fn public_key(&self, key: &HdRoot) -> PublicKey {
        match key {
            HdRoot::Private(xprv) => PublicKey::from_secret_key(&self.secp, &xprv.private_key),
            HdRoot::Public(xpub) => xpub.public_key,
        }
    }

    fn account_key(&self, account: u32) -> Result<Xpub> {
        let key = if self.account_level {
            self.root.clone()
        } else {
            self.derive_children(&[
                ChildNumber::from_hardened_idx(44).map_err(key_error)?,
                ChildNumber::from_hardened_idx(self.params.bip44_type).map_err(key_error)?,
                ChildNumber::from_hardened_idx(account).map_err(key_error)?,
            ])?
        };
        Ok(match key {
            HdRoot::Private(xprv) => Xpub::from_priv(&self.secp, &xprv),
            HdRoot::Public(xpub) => xpub,
        })
    }
}

impl MasterKey for HdMasterKey {
    fn is_hd(&self) -> bool {
        true
    }

    fn is_view_only(&self) -> bool {
        matches!(self.root, HdRoot::Public(_))
    }

    fn derivation_path(&self, account: u32, chain: u32, index: u32) -> String {
        format!(
            "m/44'/{}'/{}'/{}/{}",
            self.params.bip44_type, account, chain, index
        )
    }

    fn address(&self, path: &str) -> Result<String> {
        let pubkey = self.public_key(&self.derive(path)?);
        Ok(address::address_from_hash(
            &self.params,
            &hash160(&pubkey.serialize()),
            AddressKind::Standard,
        ))
    }

    fn private_key(&self, path: &str) -> Result<SecretKey> {
        match self.derive(path)? {
            HdRoot::Private(xprv) => Ok(xprv.private_key),
            HdRoot::Public(_) => Err(WalletError::StateInvariant(
                "extended public key has no private key".to_string(),
            )),
        }
    }

    fn key_to_export(&self, account: u32) -> Result<String> {
        Ok(self.account_key(account)?.to_string())
    }

    fn key_to_backup(&self) -> Result<String> {
        Ok(match &self.root {
            HdRoot::Private(xprv) => xprv.to_string(),
            HdRoot::Public(xpub) => xpub.to_string(),
        })
    }
}

// ============================================================================
// SECRET CLASSIFICATION
// ============================================================================

#[derive(Deserialize)]
struct BackupJson {
    mk: String,
    #[serde(default)]
    shield: Option<String>,
}

/// Every form of key material the wallet can be created from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretKind {
    RawKey(Vec<u8>),
    /// Base64 ciphertext of another secret
    Encrypted(String),
    ExtendedPrivate(String),
    ExtendedPublic(String),
    /// Watch-only standard address
    Address(String),
    Wif(String),
    /// Seed phrase, validated when the key is built
    Mnemonic(String),
    /// JSON backup carrying a master key and optionally a shield spending key
    Backup { mk: String, shield: Option<String> },
}

impl SecretKind {
    /// Classify a textual secret. `None` when nothing matches.
    pub fn classify(secret: &str, params: &ChainParams) -> Option<Self> {
        let secret = secret.trim();
        if secret.len() >= 128 && STANDARD.decode(secret).is_ok() {
            Some(SecretKind::Encrypted(secret.to_string()))
        } else if secret.starts_with("xprv") {
            Some(SecretKind::ExtendedPrivate(secret.to_string()))
        } else if secret.starts_with("xpub") {
            Some(SecretKind::ExtendedPublic(secret.to_string()))
        } else if matches!(Destination::parse(secret, params), Ok(Destination::Standard(_))) {
            Some(SecretKind::Address(secret.to_string()))
        } else if parse_wif(secret, params).is_ok() {
            Some(SecretKind::Wif(secret.to_string()))
        } else if secret.contains(' ') {
            Some(SecretKind::Mnemonic(secret.to_string()))
        } else if let Ok(backup) = serde_json::from_str::<BackupJson>(secret) {
            Some(SecretKind::Backup {
                mk: backup.mk,
                shield: backup.shield,
            })
        } else {
            None
        }
    }

    /// Build the master key this secret describes
    pub fn into_master_key(self, params: &ChainParams, passphrase: &str) -> Result<Arc<dyn MasterKey>> {
        match self {
            SecretKind::RawKey(bytes) => Ok(Arc::new(LegacyMasterKey::from_bytes(&bytes, params)?)),
            SecretKind::Wif(wif) => Ok(Arc::new(LegacyMasterKey::from_secret(
                parse_wif(&wif, params)?,
                params,
            ))),
            SecretKind::Address(address) => Ok(Arc::new(LegacyMasterKey::from_address(&address, params)?)),
            SecretKind::ExtendedPrivate(xprv) => Ok(Arc::new(HdMasterKey::from_xprv(&xprv, params)?)),
            SecretKind::ExtendedPublic(xpub) => Ok(Arc::new(HdMasterKey::from_xpub(&xpub, params)?)),
            SecretKind::Mnemonic(phrase) => Ok(Arc::new(HdMasterKey::from_mnemonic(
                &phrase, passphrase, params,
            )?)),
            SecretKind::Backup { mk, .. } => SecretKind::classify(&mk, params)
                .ok_or_else(|| WalletError::Key("unrecognised backup master key".to_string()))?
                .into_master_key(params, passphrase),
            SecretKind::Encrypted(_) => Err(WalletError::Key(
                "encrypted secret must be decrypted first".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "000102030405060708090a0b0c0d0e0f";
    const TREZOR_PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn vector_key() -> HdMasterKey {
        HdMasterKey::from_seed(&hex::decode(SEED).unwrap(), &ChainParams::mainnet()).unwrap()
    }

    #[test]
    fn test_bip32_master_vector() {
        let key = vector_key();
        assert_eq!(
            key.key_to_backup().unwrap(),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
        let root = key.derive_children(&[]).unwrap();
        assert_eq!(
            Xpub::from_str("xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8")
                .unwrap()
                .public_key,
            key.public_key(&root)
        );
    }

    #[test]
    fn test_bip32_child_vector() {
        let key = vector_key();
        let child = key
            .derive_children(&[
                ChildNumber::from_hardened_idx(0).unwrap(),
                ChildNumber::from_normal_idx(1).unwrap(),
            ])
            .unwrap();
        let HdRoot::Private(xprv) = child else {
            panic!("seed wallet derived a public key");
        };
        assert_eq!(
            Xpub::from_priv(&key.secp, &xprv).to_string(),
            "xpub6ASuArnXKPbfEwhqN6e3mwBcDTgzisQN1wXN9BJcM47sSikHjJf3UFHKkNAWbWMiGj7Wf5uMash7SyYq527Hqck2AxYysAA7xmALppuCkwQ"
        );
    }

    #[test]
    fn test_xprv_backup_restores_same_wallet() {
        let params = ChainParams::mainnet();
        let key = vector_key();
        let restored = HdMasterKey::from_xprv(&key.key_to_backup().unwrap(), &params).unwrap();
        let path = key.derivation_path(0, 0, 4);
        assert_eq!(restored.address(&path).unwrap(), key.address(&path).unwrap());
        assert!(HdMasterKey::from_xprv(&key.key_to_export(0).unwrap(), &params).is_err());
    }

    #[test]
    fn test_public_derivation_rejects_hardened() {
        let params = ChainParams::mainnet();
        let watch = HdMasterKey::from_xpub(&vector_key().key_to_export(0).unwrap(), &params).unwrap();
        assert!(watch
            .derive_children(&[ChildNumber::from_hardened_idx(0).unwrap()])
            .is_err());
        assert!(watch
            .derive_children(&[ChildNumber::from_normal_idx(0).unwrap()])
            .is_ok());
    }

    #[test]
    fn test_hd_addresses() {
        let params = ChainParams::mainnet();
        let key = HdMasterKey::from_seed(&hex::decode(SEED).unwrap(), &params).unwrap();
        let path = key.derivation_path(0, 0, 0);
        assert_eq!(path, "m/44'/119'/0'/0/0");
        assert_eq!(key.address(&path).unwrap(), "DRcqJGocMs8CfvVgnt9MjKUdJCfzeiduyV");
        assert_eq!(
            key.address(&key.derivation_path(0, 1, 1)).unwrap(),
            "DRHCK1v4Wf5CD9diCjYTZdb4LmhMFdw9MV"
        );
    }

    #[test]
    fn test_xpub_wallet_matches_seed_wallet() {
        let params = ChainParams::mainnet();
        let full = HdMasterKey::from_seed(&hex::decode(SEED).unwrap(), &params).unwrap();
        let xpub = full.key_to_export(0).unwrap();
        assert_eq!(
            xpub,
            "xpub6D75Aonnt6kx5pCEG3kSd88AtuwYUH41A43f1Xj9ACdh4z8PucR5znRQXiCv5PaTsGsVGYeVqhpjB5HmPmxNtc8AhCKFCiuLrGVxvehjwGu"
        );

        let watch = HdMasterKey::from_xpub(&xpub, &params).unwrap();
        assert!(watch.is_view_only());
        let path = watch.derivation_path(0, 1, 0);
        assert_eq!(watch.address(&path).unwrap(), full.address(&path).unwrap());
        assert!(watch.private_key(&path).is_err());
    }

    #[test]
    fn test_legacy_key() {
        let params = ChainParams::mainnet();
        let key = LegacyMasterKey::from_bytes(&[0x42; 32], &params).unwrap();
        assert!(!key.is_hd());
        assert_eq!(key.address(LEGACY_PATH).unwrap(), "D73NiBcVFv7VaRFp36yKHiUqRAgJ7zeYdc");
        assert_eq!(
            key.wif().unwrap(),
            "YQ9UXMGqUeDaASNoSn5JrLsPkkpYYidH4Sb8sqqLAQQTDCvv6TtY"
        );
        assert_eq!(parse_wif(&key.wif().unwrap(), &params).unwrap().secret_bytes(), [0x42; 32]);
    }

    #[test]
    fn test_view_only_legacy_key_cannot_sign() {
        let params = ChainParams::mainnet();
        let key = LegacyMasterKey::from_address("D73NiBcVFv7VaRFp36yKHiUqRAgJ7zeYdc", &params).unwrap();
        assert!(key.is_view_only());
        assert!(matches!(key.private_key(LEGACY_PATH), Err(WalletError::StateInvariant(_))));
    }

    #[test]
    fn test_mnemonic_seed_vector() {
        let seed = mnemonic_to_seed(TREZOR_PHRASE, "TREZOR").unwrap();
        assert_eq!(
            hex::encode(seed),
            "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e53495531f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04"
        );
    }

    #[test]
    fn test_seed_phrase_is_cleaned() {
        let messy = format!("  {}\n", TREZOR_PHRASE.to_uppercase().replace(' ', "   "));
        assert_eq!(
            clean_seed_phrase(&messy).unwrap().to_string(),
            TREZOR_PHRASE
        );
        assert_eq!(
            mnemonic_to_seed(&messy, "TREZOR").unwrap(),
            mnemonic_to_seed(TREZOR_PHRASE, "TREZOR").unwrap()
        );
    }

    #[test]
    fn test_invalid_seed_phrases_rejected() {
        // wrong word count
        assert!(matches!(clean_seed_phrase("hello world"), Err(WalletError::Key(_))));
        // bad checksum
        let bad = TREZOR_PHRASE.replace("about", "abandon");
        assert!(matches!(clean_seed_phrase(&bad), Err(WalletError::Key(_))));
        // not in the word list
        let typo = TREZOR_PHRASE.replace("about", "abuot");
        assert!(matches!(mnemonic_to_seed(&typo, ""), Err(WalletError::Key(_))));
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(chain_and_index("m/44'/119'/0'/1/7"), Some((1, 7)));
        assert_eq!(chain_and_index(LEGACY_PATH), None);
        assert_eq!(
            parse_path("m/44'/1'/0'/0/3").unwrap(),
            DerivationPath::from(vec![
                ChildNumber::from_hardened_idx(44).unwrap(),
                ChildNumber::from_hardened_idx(1).unwrap(),
                ChildNumber::from_hardened_idx(0).unwrap(),
                ChildNumber::from_normal_idx(0).unwrap(),
                ChildNumber::from_normal_idx(3).unwrap(),
            ])
        );
        assert!(matches!(parse_path("44/x"), Err(WalletError::Key(_))));
    }

    #[test]
    fn test_secret_classification() {
        let params = ChainParams::mainnet();
        assert_eq!(
            SecretKind::classify("D73NiBcVFv7VaRFp36yKHiUqRAgJ7zeYdc", &params),
            Some(SecretKind::Address("D73NiBcVFv7VaRFp36yKHiUqRAgJ7zeYdc".to_string()))
        );
        assert!(matches!(
            SecretKind::classify("YQ9UXMGqUeDaASNoSn5JrLsPkkpYYidH4Sb8sqqLAQQTDCvv6TtY", &params),
            Some(SecretKind::Wif(_))
        ));
        assert!(matches!(
            SecretKind::classify("xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8", &params),
            Some(SecretKind::ExtendedPublic(_))
        ));
        assert!(matches!(
            SecretKind::classify("abandon abandon about", &params),
            Some(SecretKind::Mnemonic(_))
        ));
        assert_eq!(
            SecretKind::classify(r#"{"mk":"xprv123","shield":"secret-extsk"}"#, &params),
            Some(SecretKind::Backup {
                mk: "xprv123".to_string(),
                shield: Some("secret-extsk".to_string())
            })
        );
        assert!(matches!(
            SecretKind::classify(&"QUJD".repeat(40), &params),
            Some(SecretKind::Encrypted(_))
        ));
        assert_eq!(SecretKind::classify("nonsense", &params), None);
    }

    #[test]
    fn test_secret_into_master_key() {
        let params = ChainParams::mainnet();
        let key = SecretKind::RawKey(vec![0x42; 32])
            .into_master_key(&params, "")
            .unwrap();
        assert_eq!(key.key_to_export(0).unwrap(), "D73NiBcVFv7VaRFp36yKHiUqRAgJ7zeYdc");

        let backup = SecretKind::Backup {
            mk: "YQ9UXMGqUeDaASNoSn5JrLsPkkpYYidH4Sb8sqqLAQQTDCvv6TtY".to_string(),
            shield: None,
        };
        let key = backup.into_master_key(&params, "").unwrap();
        assert!(!key.is_view_only());

        assert!(SecretKind::Encrypted("AAAA".to_string())
            .into_master_key(&params, "")
            .is_err());

        let key = SecretKind::classify(TREZOR_PHRASE, &params)
            .unwrap()
            .into_master_key(&params, "")
            .unwrap();
        assert!(key.is_hd() && !key.is_view_only());
    }

    #[test]
    fn test_free_text_is_not_a_seed_phrase() {
        let params = ChainParams::testnet();
        let secret = SecretKind::classify("hello world", &params).unwrap();
        assert!(matches!(
            secret.into_master_key(&params, ""),
            Err(WalletError::Key(_))
        ));
    }

    #[test]
    fn test_encrypted_detection_needs_real_base64() {
        let params = ChainParams::mainnet();
        // right alphabet, broken padding
        let broken = format!("{}=A==", "QUJD".repeat(40));
        assert_eq!(SecretKind::classify(&broken, &params), None);
    }
}
