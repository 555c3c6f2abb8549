//! Signature verification for seal.
//!
//! This crate provides:
//!
//! - The [`Verifier`] trait and the verification outcome model
//! - A key-based DSSE verifier ([`DsseVerifier`]) driven by a trust policy
//!   document and a trust store of Ed25519 public keys
//! - The [`verify`] driver that walks the signatures attached to an artifact
//!
//! # Quick Start
//!
//! ```no_run
//! use seal_registry::{open_repository, ArtifactRef, InputType, RegistryConfig};
//! use seal_verifier::{verify, DsseVerifier, VerifyOptions};
//!
//! # async fn example() -> Result<(), seal_verifier::VerifyError> {
//! let reference = "localhost:5000/net-monitor@sha256:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a";
//! let artifact = ArtifactRef::parse(InputType::Registry, reference)?;
//! let repo = open_repository(InputType::Registry, &artifact, &RegistryConfig::from_env())?;
//! let verifier = DsseVerifier::from_config()?;
//! let (_, outcomes) = verify(&verifier, repo.as_ref(), &VerifyOptions::new(reference)).await?;
//! println!("verified at level {}", outcomes[0].level);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Path | Description |
//! |------|-------------|
//! | `$SEAL_CONFIG_DIR` | Configuration directory (default: `<user config dir>/seal`) |
//! | `trustpolicy.json` | Trust policy statements |
//! | `truststore/<store>/*.pem` | Trusted Ed25519 public keys (SPKI PEM) |

pub mod config;
pub mod dsse;
pub mod error;
pub mod outcome;
pub mod policy;
pub mod trust;
pub mod verifier;
pub mod verify;

// Re-export main types
pub use config::{config_dir, CONFIG_DIR_ENV, TRUST_POLICY_FILE, TRUST_STORE_DIR};
pub use dsse::{build_pae, sign_envelope, DsseEnvelope, DsseSignature, PAYLOAD_TYPE_SEAL_V1};
pub use error::{VerifyError, VerifyResult};
pub use outcome::{
    SignedPayload, VerificationAction, VerificationLevel, VerificationOutcome,
    VerificationResult, VerificationType,
};
pub use policy::{TrustPolicy, TrustPolicyDocument};
pub use trust::{compute_key_id, decode_public_key_pem, TrustStore};
pub use verifier::{DsseVerifier, Verifier};
pub use verify::{verify, VerifyOptions, MAX_SIGNATURE_ATTEMPTS};
