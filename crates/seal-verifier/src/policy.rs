//! Trust policy document (`trustpolicy.json`).
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "trustPolicies": [
//!     {
//!       "name": "wabbit-networks",
//!       "registryScopes": ["localhost:5000/net-monitor"],
//!       "signatureVerification": { "level": "strict", "override": { "expiry": "log" } },
//!       "trustStores": ["wabbit-networks"]
//!     }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{VerifyError, VerifyResult};
use crate::outcome::{VerificationAction, VerificationLevel, VerificationType};

/// Supported trust policy document version.
pub const TRUST_POLICY_VERSION: &str = "1.0";

/// Scope matching every repository.
pub const WILDCARD_SCOPE: &str = "*";

/// Parsed trust policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustPolicyDocument {
    pub version: String,
    pub trust_policies: Vec<TrustPolicy>,
}

/// A single trust policy statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustPolicy {
    pub name: String,
    pub registry_scopes: Vec<String>,
    pub signature_verification: SignatureVerification,
    #[serde(default)]
    pub trust_stores: Vec<String>,
}

/// Level plus per-check overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureVerification {
    pub level: VerificationLevel,
    #[serde(default, rename = "override", skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<VerificationType, VerificationAction>,
}

impl TrustPolicy {
    /// Effective action of `kind` after overrides.
    pub fn action(&self, kind: VerificationType) -> VerificationAction {
        let level = self.signature_verification.level;
        if level == VerificationLevel::Skip {
            return VerificationAction::Skip;
        }
        self.signature_verification
            .overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| level.action(kind))
    }

    fn is_wildcard(&self) -> bool {
        self.registry_scopes.iter().any(|s| s == WILDCARD_SCOPE)
    }
}

impl TrustPolicyDocument {
    /// Read and validate a trust policy file.
    pub fn load(path: &Path) -> VerifyResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VerifyError::policy(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse and validate a trust policy document.
    pub fn parse(content: &str) -> VerifyResult<Self> {
        let doc: Self = serde_json::from_str(content)
            .map_err(|e| VerifyError::policy(format!("malformed trust policy: {}", e)))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Check structural rules across statements.
    pub fn validate(&self) -> VerifyResult<()> {
        if self.version != TRUST_POLICY_VERSION {
            return Err(VerifyError::policy(format!(
                "unsupported trust policy version {:?}, expected {:?}",
                self.version, TRUST_POLICY_VERSION
            )));
        }
        if self.trust_policies.is_empty() {
            return Err(VerifyError::policy(
                "trust policy document has no statements",
            ));
        }

        let mut names = HashSet::new();
        let mut scopes = HashSet::new();
        let mut wildcard_seen = false;

        for statement in &self.trust_policies {
            if statement.name.trim().is_empty() {
                return Err(VerifyError::policy("statement name cannot be empty"));
            }
            if !names.insert(statement.name.as_str()) {
                return Err(VerifyError::policy(format!(
                    "multiple statements use the same name {:?}",
                    statement.name
                )));
            }
            if statement.registry_scopes.is_empty() {
                return Err(VerifyError::policy(format!(
                    "statement {:?} has no registry scopes",
                    statement.name
                )));
            }

            if statement.is_wildcard() {
                if statement.registry_scopes.len() > 1 {
                    return Err(VerifyError::policy(format!(
                        "statement {:?} uses wildcard scope \"*\" together with other scopes",
                        statement.name
                    )));
                }
                if wildcard_seen {
                    return Err(VerifyError::policy(
                        "wildcard scope \"*\" is used by more than one statement",
                    ));
                }
                wildcard_seen = true;
            } else {
                for scope in &statement.registry_scopes {
                    validate_scope(&statement.name, scope)?;
                    if !scopes.insert(scope.as_str()) {
                        return Err(VerifyError::policy(format!(
                            "registry scope {:?} is used by more than one statement",
                            scope
                        )));
                    }
                }
            }

            if statement
                .signature_verification
                .overrides
                .contains_key(&VerificationType::Integrity)
            {
                return Err(VerifyError::policy(format!(
                    "statement {:?} overrides integrity, which is always enforced",
                    statement.name
                )));
            }

            let skip = statement.signature_verification.level == VerificationLevel::Skip;
            if !skip && statement.trust_stores.is_empty() {
                return Err(VerifyError::policy(format!(
                    "statement {:?} needs at least one trust store",
                    statement.name
                )));
            }
        }

        Ok(())
    }

    /// Statement applying to `artifact_reference` (`<scope>@<digest>`).
    ///
    /// An exact scope match wins over the wildcard statement.
    pub fn statement_for(&self, artifact_reference: &str) -> VerifyResult<&TrustPolicy> {
        let scope = match artifact_reference.rsplit_once('@') {
            Some((scope, _)) => scope,
            None => artifact_reference,
        };

        self.trust_policies
            .iter()
            .find(|p| p.registry_scopes.iter().any(|s| s == scope))
            .or_else(|| self.trust_policies.iter().find(|p| p.is_wildcard()))
            .ok_or_else(|| VerifyError::NoApplicablePolicy {
                reference: artifact_reference.to_string(),
            })
    }

    /// Trust stores named by any statement.
    pub fn trust_store_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .trust_policies
            .iter()
            .flat_map(|p| p.trust_stores.iter().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

fn validate_scope(statement: &str, scope: &str) -> VerifyResult<()> {
    if scope.contains('@') || scope.contains(char::is_whitespace) || scope.is_empty() {
        return Err(VerifyError::policy(format!(
            "statement {:?} has invalid registry scope {:?}",
            statement, scope
        )));
    }
    Ok(())
}
