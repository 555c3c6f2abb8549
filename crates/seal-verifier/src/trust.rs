//! Key trust store for signature verification.
//!
//! Keys live on disk as `truststore/<store>/*.pem` (Ed25519 SPKI PEM).
//! A key id is the SHA-256 digest of the key's SPKI DER encoding.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use ed25519_dalek::VerifyingKey;
use pkcs8::{DecodePublicKey, EncodePublicKey};
use tracing::debug;

use crate::error::{VerifyError, VerifyResult};

/// Compute the key id of a public key (`sha256:<hex>` over SPKI DER).
pub fn compute_key_id(key: &VerifyingKey) -> VerifyResult<String> {
    let doc = key
        .to_public_key_der()
        .map_err(|e| VerifyError::store(format!("failed to encode public key: {}", e)))?;
    Ok(seal_registry::sha256_digest(doc.as_bytes()))
}

/// Decode an Ed25519 public key from SPKI PEM.
pub fn decode_public_key_pem(pem: &str) -> VerifyResult<VerifyingKey> {
    VerifyingKey::from_public_key_pem(pem)
        .map_err(|e| VerifyError::store(format!("invalid Ed25519 public key: {}", e)))
}

/// Named collections of trusted keys.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    /// Store name -> key id -> key.
    stores: HashMap<String, BTreeMap<String, VerifyingKey>>,
}

impl TrustStore {
    /// Create an empty trust store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the named stores from `<dir>/<store>/*.pem`.
    ///
    /// Every named store must exist and hold at least one key.
    pub fn load<S: AsRef<str>>(dir: &Path, names: &[S]) -> VerifyResult<Self> {
        let mut store = Self::new();
        for name in names {
            let name = name.as_ref();
            validate_store_name(name)?;
            let keys = load_store_dir(&dir.join(name))?;
            if keys.is_empty() {
                return Err(VerifyError::store(format!(
                    "trust store \"{}\" contains no keys",
                    name
                )));
            }
            debug!(store = %name, keys = keys.len(), "loaded trust store");
            for key in keys {
                store.add_key(name, key)?;
            }
        }
        Ok(store)
    }

    /// Add a key to a named store, returning its key id.
    pub fn add_key(&mut self, store: &str, key: VerifyingKey) -> VerifyResult<String> {
        let key_id = compute_key_id(&key)?;
        self.stores
            .entry(store.to_string())
            .or_default()
            .insert(key_id.clone(), key);
        Ok(key_id)
    }

    /// Whether a store with this name was loaded.
    pub fn has_store(&self, store: &str) -> bool {
        self.stores.contains_key(store)
    }

    /// Keys of the given stores as `(key_id, key)` pairs.
    pub fn keys_in<'a, S: AsRef<str>>(&'a self, names: &'a [S]) -> Vec<(&'a str, &'a VerifyingKey)> {
        names
            .iter()
            .filter_map(|name| self.stores.get(name.as_ref()))
            .flat_map(|keys| keys.iter().map(|(id, key)| (id.as_str(), key)))
            .collect()
    }
}

fn validate_store_name(name: &str) -> VerifyResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && name != "."
        && name != "..";
    if !valid {
        return Err(VerifyError::store(format!(
            "invalid trust store name \"{}\"",
            name
        )));
    }
    Ok(())
}

fn load_store_dir(dir: &Path) -> VerifyResult<Vec<VerifyingKey>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        VerifyError::store(format!("failed to read {}: {}", dir.display(), e))
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| VerifyError::store(e.to_string()))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("pem") {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let pem = std::fs::read_to_string(path).map_err(|e| {
                VerifyError::store(format!("failed to read {}: {}", path.display(), e))
            })?;
            decode_public_key_pem(&pem).map_err(|e| {
                VerifyError::store(format!("{}: {}", path.display(), e))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use pkcs8::LineEnding;

    fn generate_keypair() -> SigningKey {
        SigningKey::generate(&mut rand::thread_rng())
    }

    fn write_key(dir: &Path, store: &str, file: &str, key: &VerifyingKey) {
        let store_dir = dir.join(store);
        std::fs::create_dir_all(&store_dir).unwrap();
        let pem = key.to_public_key_pem(LineEnding::LF).unwrap();
        std::fs::write(store_dir.join(file), pem).unwrap();
    }

    #[test]
    fn test_key_id_format() {
        let key = generate_keypair().verifying_key();
        let id = compute_key_id(&key).unwrap();
        assert!(id.starts_with("sha256:"));
        assert_eq!(id.len(), 7 + 64);
        assert_eq!(id, compute_key_id(&key).unwrap());
    }

    #[test]
    fn test_load_named_stores() {
        let dir = tempfile::tempdir().unwrap();
        let a = generate_keypair().verifying_key();
        let b = generate_keypair().verifying_key();
        write_key(dir.path(), "release", "a.pem", &a);
        write_key(dir.path(), "release", "b.pem", &b);
        std::fs::write(dir.path().join("release").join("README"), "ignored").unwrap();

        let store = TrustStore::load(dir.path(), &["release"]).unwrap();
        assert!(store.has_store("release"));
        let keys = store.keys_in(&["release"]);
        assert_eq!(keys.len(), 2);
        let id_a = compute_key_id(&a).unwrap();
        assert!(keys.iter().any(|(id, _)| *id == id_a));
    }

    #[test]
    fn test_missing_store_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TrustStore::load(dir.path(), &["absent"]).unwrap_err();
        assert!(matches!(err, VerifyError::TrustStore { .. }));
    }

    #[test]
    fn test_empty_store_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        let err = TrustStore::load(dir.path(), &["empty"]).unwrap_err();
        assert!(err.to_string().contains("contains no keys"));
    }

    #[test]
    fn test_invalid_pem_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("bad")).unwrap();
        std::fs::write(dir.path().join("bad").join("k.pem"), "garbage").unwrap();
        assert!(TrustStore::load(dir.path(), &["bad"]).is_err());
    }

    #[test]
    fn test_store_name_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TrustStore::load(dir.path(), &["../etc"]).is_err());
        assert!(TrustStore::load(dir.path(), &[".."]).is_err());
    }
}
