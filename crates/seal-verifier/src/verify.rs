//! Artifact verification driver.
//!
//! Walks the signatures attached to an artifact and returns the first one the
//! verifier accepts.

use std::collections::BTreeMap;

use seal_registry::{validate_digest, Descriptor, Repository, MEDIA_TYPE_DSSE_ENVELOPE};
use tracing::{debug, info};

use crate::error::{VerifyError, VerifyResult};
use crate::outcome::VerificationOutcome;
use crate::verifier::Verifier;

/// Evaluate every signature attached to an artifact.
pub const MAX_SIGNATURE_ATTEMPTS: usize = usize::MAX;

/// Options of a single artifact verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Digest-qualified reference (`<scope>@<digest>`) used for policy lookup.
    pub artifact_reference: String,

    /// Plugin configuration passed through to the verifier.
    pub plugin_config: BTreeMap<String, String>,

    /// Upper bound on signatures evaluated.
    pub max_signature_attempts: usize,

    /// Metadata that must have been signed alongside the artifact.
    pub user_metadata: BTreeMap<String, String>,
}

impl VerifyOptions {
    /// Options for `artifact_reference` evaluating every signature.
    pub fn new(artifact_reference: impl Into<String>) -> Self {
        Self {
            artifact_reference: artifact_reference.into(),
            plugin_config: BTreeMap::new(),
            max_signature_attempts: MAX_SIGNATURE_ATTEMPTS,
            user_metadata: BTreeMap::new(),
        }
    }

    fn digest(&self) -> VerifyResult<&str> {
        let invalid = |reason: String| VerifyError::InvalidReference {
            reference: self.artifact_reference.clone(),
            reason,
        };
        let (_, digest) = self
            .artifact_reference
            .rsplit_once('@')
            .ok_or_else(|| invalid("reference is not digest-qualified".to_string()))?;
        validate_digest(digest).map_err(|e| invalid(e.to_string()))?;
        Ok(digest)
    }
}

/// Verify the artifact named by `opts.artifact_reference`.
///
/// Returns the artifact descriptor and the outcome of the accepted signature
/// (or the single skip outcome). Rejected signatures surface as
/// `VerificationFailed`.
pub async fn verify(
    verifier: &dyn Verifier,
    repo: &dyn Repository,
    opts: &VerifyOptions,
) -> VerifyResult<(Descriptor, Vec<VerificationOutcome>)> {
    let digest = opts.digest()?;
    let target = repo.resolve(digest).await?;

    if verifier.skip_level(opts)?.is_some() {
        info!(reference = %opts.artifact_reference, "trust policy skips verification");
        return Ok((target, vec![VerificationOutcome::skipped()]));
    }

    if opts.max_signature_attempts == 0 {
        return Err(VerifyError::Config {
            message: "max_signature_attempts must be greater than 0".to_string(),
        });
    }

    let signatures = repo.list_signatures(&target).await?;
    if signatures.is_empty() {
        return Err(VerifyError::failed(format!(
            "no signature is associated with \"{}\", make sure the artifact was signed successfully",
            opts.artifact_reference
        )));
    }
    debug!(count = signatures.len(), "found signatures");

    for (attempt, signature) in signatures.iter().enumerate() {
        if attempt >= opts.max_signature_attempts {
            return Err(VerifyError::failed(format!(
                "signature evaluation stopped. The configured limit of {} signatures to verify per artifact exceeded",
                opts.max_signature_attempts
            )));
        }

        let manifest = repo.fetch_manifest(signature).await?;
        let Some(layer) = manifest
            .layers
            .iter()
            .find(|layer| layer.media_type == MEDIA_TYPE_DSSE_ENVELOPE)
        else {
            info!(signature = %signature.digest, "signature manifest has no envelope layer");
            continue;
        };
        let envelope = repo.fetch_blob(layer).await?;

        match verifier.verify(&target, &envelope, opts) {
            Ok(outcome) => {
                debug!(signature = %signature.digest, level = %outcome.level, "signature accepted");
                return Ok((target, vec![outcome]));
            }
            Err(e) if e.is_verification_failed() => {
                debug!(signature = %signature.digest, error = %e, "signature rejected");
            }
            Err(e) => return Err(e),
        }
    }

    Err(VerifyError::failed(format!(
        "no signature associated with \"{}\" passed verification",
        opts.artifact_reference
    )))
}
