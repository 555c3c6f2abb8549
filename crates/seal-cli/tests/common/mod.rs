//! Signed OCI layout and configuration directory fixtures.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use chrono::{Duration, Utc};
use ed25519_dalek::SigningKey;
use pkcs8::{EncodePublicKey, LineEnding};
use seal_registry::{
    Descriptor, Index, Manifest, ANNOTATION_REF_NAME, ARTIFACT_TYPE_SIGNATURE,
    MEDIA_TYPE_DSSE_ENVELOPE, MEDIA_TYPE_EMPTY_JSON, MEDIA_TYPE_IMAGE_MANIFEST,
};
use seal_verifier::{sign_envelope, SignedPayload};
use tempfile::TempDir;

pub const SCOPE: &str = "local/net-monitor";

pub fn seal_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_seal"))
}

pub fn generate_keypair() -> SigningKey {
    SigningKey::generate(&mut rand::thread_rng())
}

fn write_blob(root: &Path, bytes: &[u8]) -> Descriptor {
    let desc = Descriptor::for_content(MEDIA_TYPE_IMAGE_MANIFEST, bytes);
    let dir = root.join("blobs").join("sha256");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(&desc.digest["sha256:".len()..]), bytes).unwrap();
    desc
}

fn manifest(artifact_type: &str, subject: Option<Descriptor>, layers: Vec<Descriptor>) -> Vec<u8> {
    serde_json::to_vec(&Manifest {
        schema_version: 2,
        media_type: Some(MEDIA_TYPE_IMAGE_MANIFEST.to_string()),
        artifact_type: Some(artifact_type.to_string()),
        config: Descriptor::for_content(MEDIA_TYPE_EMPTY_JSON, b"{}"),
        layers,
        subject,
        annotations: None,
    })
    .unwrap()
}

/// An OCI layout with one artifact tagged `v1`, signed by `signer` with
/// `buildId=42`, and a configuration directory trusting `trusted`.
pub struct Fixture {
    pub layout: TempDir,
    pub config: TempDir,
    pub target: Descriptor,
}

impl Fixture {
    pub fn new(signer: &SigningKey, trusted: &SigningKey, level: &str) -> Self {
        Self::with_annotations(signer, trusted, level, &[("buildId", "42")])
    }

    /// Same as [`Fixture::new`], signing `annotations` instead of `buildId=42`.
    pub fn with_annotations(
        signer: &SigningKey,
        trusted: &SigningKey,
        level: &str,
        annotations: &[(&str, &str)],
    ) -> Self {
        let layout = TempDir::new().unwrap();
        let root = layout.path();
        std::fs::write(root.join("oci-layout"), r#"{"imageLayoutVersion":"1.0.0"}"#).unwrap();

        let target = write_blob(root, &manifest("application/vnd.example.app", None, vec![]));

        let mut signed = target.clone();
        if !annotations.is_empty() {
            signed.annotations = Some(
                annotations
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        }
        let payload = SignedPayload {
            target_artifact: signed,
            signed_at: Utc::now(),
            expires_at: Some(Utc::now() + Duration::days(30)),
        };
        let mut layer = write_blob(root, &sign_envelope(&payload, signer).unwrap());
        layer.media_type = MEDIA_TYPE_DSSE_ENVELOPE.to_string();
        let signature = Descriptor {
            artifact_type: Some(ARTIFACT_TYPE_SIGNATURE.to_string()),
            ..write_blob(
                root,
                &manifest(ARTIFACT_TYPE_SIGNATURE, Some(target.clone()), vec![layer]),
            )
        };

        let tagged = Descriptor {
            annotations: Some(BTreeMap::from([(
                ANNOTATION_REF_NAME.to_string(),
                "v1".to_string(),
            )])),
            ..target.clone()
        };
        let index = Index {
            schema_version: 2,
            media_type: None,
            manifests: vec![tagged, signature],
        };
        std::fs::write(root.join("index.json"), serde_json::to_vec(&index).unwrap()).unwrap();

        let config = TempDir::new().unwrap();
        let policy = serde_json::json!({
            "version": "1.0",
            "trustPolicies": [{
                "name": "local",
                "registryScopes": [SCOPE],
                "signatureVerification": { "level": level },
                "trustStores": ["local"],
            }],
        });
        std::fs::write(
            config.path().join("trustpolicy.json"),
            serde_json::to_vec_pretty(&policy).unwrap(),
        )
        .unwrap();
        let store = config.path().join("truststore").join("local");
        std::fs::create_dir_all(&store).unwrap();
        let pem = trusted
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        std::fs::write(store.join("signer.pem"), pem).unwrap();

        Self {
            layout,
            config,
            target,
        }
    }

    pub fn digest_ref(&self) -> String {
        format!("{}@{}", self.layout.path().display(), self.target.digest)
    }

    pub fn tag_ref(&self) -> String {
        format!("{}:v1", self.layout.path().display())
    }

    /// `seal verify --oci-layout <reference> --scope <SCOPE>` with experimental flags on.
    pub fn verify_cmd(&self, reference: &str) -> Command {
        let mut cmd = seal_cmd();
        cmd.env("SEAL_EXPERIMENTAL", "1")
            .env("SEAL_CONFIG_DIR", self.config.path())
            .env_remove("RUST_LOG")
            .args(["verify", "--oci-layout", "--scope", SCOPE])
            .arg(reference);
        cmd
    }
}
