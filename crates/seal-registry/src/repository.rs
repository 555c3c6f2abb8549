//! Repository/content accessor abstraction.
//!
//! Both the remote registry client and the local OCI layout store implement
//! [`Repository`], so the verify workflow never needs to know where the
//! content lives.

use async_trait::async_trait;

use crate::client::RemoteRepository;
use crate::error::RegistryResult;
use crate::layout::LayoutRepository;
use crate::reference::{ArtifactRef, InputType};
use crate::types::{Descriptor, Manifest, RegistryConfig};

/// Read access to artifacts and their signatures.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Resolve a tag or digest to the manifest descriptor it points to.
    async fn resolve(&self, reference: &str) -> RegistryResult<Descriptor>;

    /// Fetch and parse a manifest, verifying its digest.
    async fn fetch_manifest(&self, desc: &Descriptor) -> RegistryResult<Manifest>;

    /// Fetch a blob, verifying its digest.
    async fn fetch_blob(&self, desc: &Descriptor) -> RegistryResult<Vec<u8>>;

    /// List signature manifests whose subject is `subject`.
    async fn list_signatures(&self, subject: &Descriptor) -> RegistryResult<Vec<Descriptor>>;
}

/// Open the repository matching the input mode.
pub fn open_repository(
    input_type: InputType,
    reference: &ArtifactRef,
    config: &RegistryConfig,
) -> RegistryResult<Box<dyn Repository>> {
    match input_type {
        InputType::Registry => Ok(Box::new(RemoteRepository::new(
            reference.registry(),
            reference.repository(),
            config.clone(),
        )?)),
        InputType::OciLayout => Ok(Box::new(LayoutRepository::open(&reference.locator)?)),
    }
}
