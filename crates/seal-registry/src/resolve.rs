//! Reference resolution.
//!
//! Verification always runs against a digest. Tag references are resolved
//! once, up front, and the caller is told so it can warn that tags are mutable.

use tracing::{debug, info};

use crate::error::RegistryResult;
use crate::reference::ArtifactRef;
use crate::repository::Repository;
use crate::types::Descriptor;

/// How a reference was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMethod {
    /// Looked up through a mutable tag.
    Tag,

    /// Already digest-qualified; existence checked only.
    Digest,
}

/// A reference pinned to a digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    /// Reference as given by the user.
    pub original: ArtifactRef,

    /// Digest-qualified reference.
    pub resolved: ArtifactRef,

    /// How it was resolved.
    pub method: ResolutionMethod,
}

impl std::fmt::Display for ResolvedReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.resolved)
    }
}

/// Resolve `reference` to a manifest descriptor and a digest-qualified reference.
///
/// `on_tag` is called once with the tag and the descriptor it resolved to when
/// the reference was tag-qualified.
pub async fn resolve_reference<F>(
    repo: &dyn Repository,
    reference: &ArtifactRef,
    on_tag: F,
) -> RegistryResult<(Descriptor, ResolvedReference)>
where
    F: FnOnce(&str, &Descriptor),
{
    let desc = repo.resolve(reference.reference()).await?;

    let method = match reference.tag() {
        Some(tag) => {
            info!(tag, digest = %desc.digest, "resolved tag to digest");
            on_tag(tag, &desc);
            ResolutionMethod::Tag
        }
        None => {
            debug!(digest = %desc.digest, "reference already digest-qualified");
            ResolutionMethod::Digest
        }
    };

    let resolved = ResolvedReference {
        original: reference.clone(),
        resolved: reference.with_digest(desc.digest.clone()),
        method,
    };

    Ok((desc, resolved))
}

/// Reference handed to the verifier.
///
/// With a trust policy scope, the locator is replaced by the scope so content
/// without a registry identity (an OCI layout) is matched against the trust
/// policy statement for that scope.
pub fn intended_reference(resolved: &ResolvedReference, scope: Option<&str>) -> String {
    match (scope, resolved.resolved.digest()) {
        (Some(scope), Some(digest)) if !scope.is_empty() => format!("{}@{}", scope, digest),
        _ => resolved.resolved.to_string(),
    }
}
