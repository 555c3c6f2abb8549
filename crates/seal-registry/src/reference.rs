//! Artifact reference parsing.
//!
//! Supports two input modes:
//! - `localhost:5000/net-monitor:v1` → registry artifact by tag
//! - `localhost:5000/net-monitor@sha256:abc...` → registry artifact by digest
//! - `localhost:5000/net-monitor:v1@sha256:abc...` → by digest, tag ignored
//! - `./layout:v1` / `/srv/layout@sha256:abc...` → artifact in an OCI image layout

use crate::digest::validate_digest;
use crate::error::{RegistryError, RegistryResult};

/// Maximum tag length accepted by OCI registries.
const MAX_TAG_LEN: usize = 128;

/// Where the artifact content lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputType {
    /// Remote OCI registry (default).
    #[default]
    Registry,

    /// OCI image layout directory on local disk.
    OciLayout,
}

/// How the artifact is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefKind {
    /// Mutable tag (e.g., "v1").
    Tag(String),

    /// Immutable content digest (e.g., "sha256:...").
    Digest(String),
}

/// A parsed artifact reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    /// `<registry>/<repository>` or a layout directory path.
    pub locator: String,

    /// Tag or digest part.
    pub kind: RefKind,
}

impl ArtifactRef {
    /// Parse a reference string for the given input mode.
    ///
    /// # Examples
    ///
    /// ```
    /// use seal_registry::{ArtifactRef, InputType, RefKind};
    ///
    /// let tagged = ArtifactRef::parse(InputType::Registry, "localhost:5000/app:v1").unwrap();
    /// assert_eq!(tagged.kind, RefKind::Tag("v1".to_string()));
    ///
    /// let layout = ArtifactRef::parse(InputType::OciLayout, "./store:v1").unwrap();
    /// assert_eq!(layout.locator, "./store");
    /// ```
    pub fn parse(input_type: InputType, reference: &str) -> RegistryResult<Self> {
        let reference = reference.trim();

        if reference.is_empty() {
            return Err(RegistryError::invalid_reference(
                reference,
                "empty reference",
            ));
        }

        let (locator, kind) = split_reference(reference)?;

        if locator.is_empty() {
            return Err(RegistryError::invalid_reference(
                reference,
                "missing repository or path",
            ));
        }

        if input_type == InputType::Registry {
            validate_registry_locator(reference, locator)?;
        }

        Ok(Self {
            locator: locator.to_string(),
            kind,
        })
    }

    /// Check if the reference is digest-qualified.
    pub fn is_digest(&self) -> bool {
        matches!(self.kind, RefKind::Digest(_))
    }

    /// Get the tag (for tag references).
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            RefKind::Tag(tag) => Some(tag),
            RefKind::Digest(_) => None,
        }
    }

    /// Get the digest (for digest references).
    pub fn digest(&self) -> Option<&str> {
        match &self.kind {
            RefKind::Digest(digest) => Some(digest),
            RefKind::Tag(_) => None,
        }
    }

    /// The tag or digest, as passed to `Repository::resolve`.
    pub fn reference(&self) -> &str {
        match &self.kind {
            RefKind::Tag(tag) => tag,
            RefKind::Digest(digest) => digest,
        }
    }

    /// Same locator, addressed by `digest`.
    pub fn with_digest(&self, digest: impl Into<String>) -> Self {
        Self {
            locator: self.locator.clone(),
            kind: RefKind::Digest(digest.into()),
        }
    }

    /// Registry host (for registry references).
    pub fn registry(&self) -> &str {
        self.locator
            .split_once('/')
            .map(|(host, _)| host)
            .unwrap_or(&self.locator)
    }

    /// Repository path (for registry references).
    pub fn repository(&self) -> &str {
        self.locator
            .split_once('/')
            .map(|(_, repo)| repo)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            RefKind::Tag(tag) => write!(f, "{}:{}", self.locator, tag),
            RefKind::Digest(digest) => write!(f, "{}@{}", self.locator, digest),
        }
    }
}

/// Split `reference` into locator and tag/digest.
fn split_reference(reference: &str) -> RegistryResult<(&str, RefKind)> {
    if let Some((locator, digest)) = reference.rsplit_once('@') {
        validate_digest(digest)?;
        // `name:tag@digest` pins the tag; the digest wins
        let locator = match split_tag(reference, locator)? {
            Some((name, _)) => name,
            None => locator,
        };
        return Ok((locator, RefKind::Digest(digest.to_string())));
    }

    if let Some((locator, tag)) = split_tag(reference, reference)? {
        return Ok((locator, RefKind::Tag(tag.to_string())));
    }

    Err(RegistryError::invalid_reference(
        reference,
        "reference is missing digest or tag",
    ))
}

/// Split a trailing `:<tag>` off `name`.
///
/// A ':' only starts a tag after the last path separator; earlier ones
/// belong to a registry port or a drive letter.
fn split_tag<'a>(reference: &str, name: &'a str) -> RegistryResult<Option<(&'a str, &'a str)>> {
    let last_separator = name.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
    match name[last_separator..].rfind(':') {
        Some(colon) => {
            let colon = last_separator + colon;
            let tag = &name[colon + 1..];
            validate_tag(reference, tag)?;
            Ok(Some((&name[..colon], tag)))
        }
        None => Ok(None),
    }
}

/// Validate a tag.
fn validate_tag(reference: &str, tag: &str) -> RegistryResult<()> {
    if tag.is_empty() {
        return Err(RegistryError::invalid_reference(reference, "tag cannot be empty"));
    }

    if tag.len() > MAX_TAG_LEN {
        return Err(RegistryError::invalid_reference(
            reference,
            format!("tag cannot exceed {} characters", MAX_TAG_LEN),
        ));
    }

    let mut chars = tag.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_alphanumeric() || c == '_')
        .unwrap_or(false);
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        return Err(RegistryError::invalid_reference(
            reference,
            "tag may only contain letters, digits, '_', '.' and '-' and cannot start with '.' or '-'",
        ));
    }

    Ok(())
}

/// Validate `<registry>/<repository>`.
fn validate_registry_locator(reference: &str, locator: &str) -> RegistryResult<()> {
    let (host, repository) = locator.split_once('/').ok_or_else(|| {
        RegistryError::invalid_reference(
            reference,
            "expected <registry>/<repository>",
        )
    })?;

    if host.is_empty()
        || !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'))
    {
        return Err(RegistryError::invalid_reference(
            reference,
            format!("invalid registry host '{}'", host),
        ));
    }

    for component in repository.split('/') {
        validate_repository_component(reference, component)?;
    }

    Ok(())
}

/// Validate one `/`-separated repository path component.
fn validate_repository_component(reference: &str, component: &str) -> RegistryResult<()> {
    if component.is_empty() {
        return Err(RegistryError::invalid_reference(
            reference,
            "repository path components cannot be empty",
        ));
    }

    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();

    // Must start and end with a lowercase letter or digit
    let starts_ok = component.chars().next().map(alnum).unwrap_or(false);
    let ends_ok = component.chars().last().map(alnum).unwrap_or(false);
    if !starts_ok || !ends_ok {
        return Err(RegistryError::invalid_reference(
            reference,
            "repository components must start and end with a lowercase letter or digit",
        ));
    }

    if !component.chars().all(|c| alnum(c) || matches!(c, '.' | '_' | '-')) {
        return Err(RegistryError::invalid_reference(
            reference,
            "repository may only contain lowercase letters, digits, '.', '_' and '-'",
        ));
    }

    if component.contains("..") || component.contains("___") {
        return Err(RegistryError::invalid_reference(
            reference,
            "repository contains an invalid separator sequence",
        ));
    }

    Ok(())
}
