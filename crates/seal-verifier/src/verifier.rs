//! Signature verifier backed by a trust policy and a key trust store.

use std::path::Path;

use chrono::Utc;
use seal_registry::Descriptor;
use tracing::{debug, info};

use crate::config::{config_dir, TRUST_POLICY_FILE, TRUST_STORE_DIR};
use crate::dsse::{open_envelope, verify_envelope_signatures};
use crate::error::{VerifyError, VerifyResult};
use crate::outcome::{
    SignedPayload, VerificationAction, VerificationLevel, VerificationOutcome,
    VerificationResult, VerificationType,
};
use crate::policy::{TrustPolicy, TrustPolicyDocument};
use crate::trust::TrustStore;
use crate::verify::VerifyOptions;

/// Verifies one signature envelope against the applicable trust policy.
pub trait Verifier: Send + Sync {
    /// `Some(level)` when the applicable statement skips verification.
    ///
    /// Fails with `NoApplicablePolicy` when no statement applies.
    fn skip_level(&self, opts: &VerifyOptions) -> VerifyResult<Option<VerificationLevel>>;

    /// Verify `envelope` as a signature over `target`.
    ///
    /// Returns `VerificationFailed` when the signature is rejected; any other
    /// error aborts verification of the artifact.
    fn verify(
        &self,
        target: &Descriptor,
        envelope: &[u8],
        opts: &VerifyOptions,
    ) -> VerifyResult<VerificationOutcome>;
}

/// Ed25519 DSSE verifier.
#[derive(Debug, Clone)]
pub struct DsseVerifier {
    policy: TrustPolicyDocument,
    store: TrustStore,
}

impl DsseVerifier {
    /// Build from the user configuration directory.
    pub fn from_config() -> VerifyResult<Self> {
        Self::from_dir(&config_dir()?)
    }

    /// Build from `<dir>/trustpolicy.json` and `<dir>/truststore/`.
    pub fn from_dir(dir: &Path) -> VerifyResult<Self> {
        let policy = TrustPolicyDocument::load(&dir.join(TRUST_POLICY_FILE))?;
        let store = TrustStore::load(&dir.join(TRUST_STORE_DIR), &policy.trust_store_names())?;
        debug!(dir = %dir.display(), statements = policy.trust_policies.len(), "loaded verifier configuration");
        Ok(Self::with_components(policy, store))
    }

    /// Build from an already loaded policy and store.
    pub fn with_components(policy: TrustPolicyDocument, store: TrustStore) -> Self {
        Self { policy, store }
    }

    fn check_integrity(target: &Descriptor, payload: &SignedPayload) -> Result<(), String> {
        let signed = &payload.target_artifact;
        if signed.digest != target.digest {
            return Err(format!(
                "signature is for {}, not {}",
                signed.digest, target.digest
            ));
        }
        if signed.size != target.size || signed.media_type != target.media_type {
            return Err(format!(
                "signed descriptor of {} does not match the artifact (size {} vs {}, media type {} vs {})",
                target.digest, signed.size, target.size, signed.media_type, target.media_type
            ));
        }
        Ok(())
    }
}

/// Apply a check result under its configured action.
///
/// Enforced failures reject the signature; logged failures are kept.
fn record(
    results: &mut Vec<VerificationResult>,
    kind: VerificationType,
    action: VerificationAction,
    check: Result<(), String>,
) -> VerifyResult<()> {
    match (action, check) {
        (VerificationAction::Skip, _) => Ok(()),
        (VerificationAction::Enforce, Err(reason)) => {
            Err(VerifyError::failed(format!("{} check failed: {}", kind, reason)))
        }
        (action, check) => {
            if let Err(reason) = &check {
                info!(check = %kind, %action, error = %reason, "logged verification failure");
            }
            results.push(VerificationResult {
                kind,
                action,
                error: check.err(),
            });
            Ok(())
        }
    }
}

impl Verifier for DsseVerifier {
    fn skip_level(&self, opts: &VerifyOptions) -> VerifyResult<Option<VerificationLevel>> {
        let statement = self.policy.statement_for(&opts.artifact_reference)?;
        let level = statement.signature_verification.level;
        Ok((level == VerificationLevel::Skip).then_some(level))
    }

    fn verify(
        &self,
        target: &Descriptor,
        envelope: &[u8],
        opts: &VerifyOptions,
    ) -> VerifyResult<VerificationOutcome> {
        let statement: &TrustPolicy = self.policy.statement_for(&opts.artifact_reference)?;
        let level = statement.signature_verification.level;
        if level == VerificationLevel::Skip {
            return Ok(VerificationOutcome::skipped());
        }

        if !opts.plugin_config.is_empty() {
            debug!(entries = opts.plugin_config.len(), "plugin config ignored by key-based verifier");
        }

        let mut results = Vec::new();

        let (envelope, payload_bytes, payload) = open_envelope(envelope)
            .and_then(|opened| {
                Self::check_integrity(target, &opened.2)?;
                Ok(opened)
            })
            .map_err(|reason| {
                VerifyError::failed(format!("{} check failed: {}", VerificationType::Integrity, reason))
            })?;
        results.push(VerificationResult {
            kind: VerificationType::Integrity,
            action: VerificationAction::Enforce,
            error: None,
        });

        let keys = self.store.keys_in(&statement.trust_stores);
        let authenticity = verify_envelope_signatures(&envelope, &payload_bytes, keys).map(|key_id| {
            debug!(key_id = %key_id, statement = %statement.name, "signature made by trusted key");
        });
        record(
            &mut results,
            VerificationType::Authenticity,
            statement.action(VerificationType::Authenticity),
            authenticity,
        )?;

        let expiry = match payload.expires_at {
            Some(expires_at) if expires_at <= Utc::now() => {
                Err(format!("signature expired at {}", expires_at.to_rfc3339()))
            }
            _ => Ok(()),
        };
        record(
            &mut results,
            VerificationType::Expiry,
            statement.action(VerificationType::Expiry),
            expiry,
        )?;

        for (key, value) in &opts.user_metadata {
            if payload.target_artifact.annotation(key) != Some(value.as_str()) {
                return Err(VerifyError::failed(format!(
                    "unable to find specified metadata {}={} in the signature",
                    key, value
                )));
            }
        }

        Ok(VerificationOutcome {
            level,
            results,
            payload: Some(payload),
        })
    }
}
