//! OCI repository access for seal.
//!
//! This crate provides:
//!
//! - Artifact reference parsing (`<registry>/<repository>:<tag>|@<digest>`, OCI layout paths)
//! - A remote registry client for the OCI distribution API
//! - A read-only OCI image layout store
//! - Tag-to-digest resolution
//! - Signature discovery (referrers API, referrers tag schema, layout index scan)
//!
//! # Quick Start
//!
//! ```no_run
//! use seal_registry::{open_repository, resolve_reference, ArtifactRef, InputType, RegistryConfig};
//!
//! # async fn example() -> Result<(), seal_registry::RegistryError> {
//! let reference = ArtifactRef::parse(InputType::Registry, "localhost:5000/net-monitor:v1")?;
//! let repo = open_repository(InputType::Registry, &reference, &RegistryConfig::from_env())?;
//! let (desc, resolved) = resolve_reference(repo.as_ref(), &reference, |tag, _| {
//!     eprintln!("resolved mutable tag {tag}");
//! })
//! .await?;
//! println!("{} -> {}", resolved, desc.digest);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `SEAL_USERNAME` / `SEAL_PASSWORD` | Basic auth credentials |
//! | `SEAL_REGISTRY_TOKEN` | Bearer token |
//! | `SEAL_REGISTRY_TIMEOUT` | Request timeout in seconds (default: 30) |
//! | `SEAL_REGISTRY_MAX_RETRIES` | Max retries for transient failures (default: 3) |

pub mod client;
pub mod digest;
pub mod error;
pub mod layout;
pub mod reference;
pub mod repository;
pub mod resolve;
pub mod types;

// Re-export main types
pub use client::{RemoteRepository, REGISTRY_USER_AGENT};
pub use digest::{sha256_digest, validate_digest, verify_content};
pub use error::{RegistryError, RegistryResult};
pub use layout::LayoutRepository;
pub use reference::{ArtifactRef, InputType, RefKind};
pub use repository::{open_repository, Repository};
pub use resolve::{intended_reference, resolve_reference, ResolutionMethod, ResolvedReference};
pub use types::{
    Descriptor, Index, Manifest, RegistryConfig, ANNOTATION_REF_NAME, ARTIFACT_TYPE_SIGNATURE,
    MEDIA_TYPE_DOCKER_MANIFEST, MEDIA_TYPE_DSSE_ENVELOPE, MEDIA_TYPE_EMPTY_JSON,
    MEDIA_TYPE_IMAGE_INDEX, MEDIA_TYPE_IMAGE_MANIFEST,
};
