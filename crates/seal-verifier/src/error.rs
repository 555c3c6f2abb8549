//! Error types for signature verification.

use seal_registry::RegistryError;

/// Verification errors.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// No signature passed verification (or none exist).
    #[error("{reason}")]
    VerificationFailed { reason: String },

    /// The artifact reference is not digest-qualified or malformed.
    #[error("invalid artifact reference: {reference} - {reason}")]
    InvalidReference { reference: String, reason: String },

    /// No trust policy statement applies to the artifact.
    #[error("artifact {reference} has no applicable trust policy statement")]
    NoApplicablePolicy { reference: String },

    /// Trust policy missing or invalid.
    #[error("trust policy error: {message}")]
    TrustPolicy { message: String },

    /// Trust store missing or invalid.
    #[error("trust store error: {message}")]
    TrustStore { message: String },

    /// Verifier configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Repository access failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl VerifyError {
    /// Whether this is the "signatures were evaluated and rejected" kind.
    pub fn is_verification_failed(&self) -> bool {
        matches!(self, Self::VerificationFailed { .. })
    }

    pub(crate) fn failed(reason: impl Into<String>) -> Self {
        Self::VerificationFailed {
            reason: reason.into(),
        }
    }

    pub(crate) fn policy(message: impl Into<String>) -> Self {
        Self::TrustPolicy {
            message: message.into(),
        }
    }

    pub(crate) fn store(message: impl Into<String>) -> Self {
        Self::TrustStore {
            message: message.into(),
        }
    }
}

/// Result type for verification operations.
pub type VerifyResult<T> = Result<T, VerifyError>;
