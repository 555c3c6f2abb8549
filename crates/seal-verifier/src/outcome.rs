//! Verification outcome model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use seal_registry::Descriptor;
use serde::{Deserialize, Serialize};

use crate::error::{VerifyError, VerifyResult};

/// A single check performed on a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VerificationType {
    /// Envelope is well-formed and signs this artifact.
    Integrity,
    /// Signed by a trusted key.
    Authenticity,
    /// Signature has not expired.
    Expiry,
}

impl std::fmt::Display for VerificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integrity => write!(f, "integrity"),
            Self::Authenticity => write!(f, "authenticity"),
            Self::Expiry => write!(f, "expiry"),
        }
    }
}

/// What a failed check does to the overall result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationAction {
    /// Failure rejects the signature.
    Enforce,
    /// Failure is reported but the signature is accepted.
    Log,
    /// Check is not performed.
    Skip,
}

impl std::fmt::Display for VerificationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enforce => write!(f, "enforce"),
            Self::Log => write!(f, "log"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Preset enforcement level of a trust policy statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationLevel {
    Strict,
    Permissive,
    Audit,
    Skip,
}

impl VerificationLevel {
    /// Default action of `kind` under this level.
    pub fn action(self, kind: VerificationType) -> VerificationAction {
        use VerificationAction::*;
        use VerificationType::*;

        match (self, kind) {
            (Self::Skip, _) => Skip,
            (_, Integrity) => Enforce,
            (Self::Strict, _) => Enforce,
            (Self::Permissive, Authenticity) => Enforce,
            (Self::Permissive, Expiry) => Log,
            (Self::Audit, _) => Log,
        }
    }
}

impl std::fmt::Display for VerificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Permissive => write!(f, "permissive"),
            Self::Audit => write!(f, "audit"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    /// Which check.
    pub kind: VerificationType,

    /// Action configured for the check.
    pub action: VerificationAction,

    /// Failure reason; `None` when the check passed.
    pub error: Option<String>,
}

/// Signed statement carried in the envelope payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPayload {
    /// Descriptor of the signed artifact; annotations hold user metadata.
    pub target_artifact: Descriptor,

    /// When the signature was produced.
    pub signed_at: DateTime<Utc>,

    /// When the signature stops being valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of verifying one artifact against its trust policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    /// Level of the trust policy statement that applied.
    pub level: VerificationLevel,

    /// Per-check results, in evaluation order.
    pub results: Vec<VerificationResult>,

    /// Payload of the accepted signature (absent when skipped).
    pub payload: Option<SignedPayload>,
}

impl VerificationOutcome {
    /// Outcome for a trust policy that skips verification.
    pub fn skipped() -> Self {
        Self {
            level: VerificationLevel::Skip,
            results: Vec::new(),
            payload: None,
        }
    }

    /// User metadata signed alongside the artifact.
    pub fn user_metadata(&self) -> VerifyResult<BTreeMap<String, String>> {
        let payload = self.payload.as_ref().ok_or_else(|| VerifyError::Config {
            message: "outcome carries no verified payload".to_string(),
        })?;
        Ok(payload
            .target_artifact
            .annotations
            .clone()
            .unwrap_or_default())
    }
}
