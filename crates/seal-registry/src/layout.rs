//! OCI image layout store on local disk.
//!
//! Layout:
//! ```text
//! <root>/oci-layout          {"imageLayoutVersion": "1.0.0"}
//! <root>/index.json          image index; tags via org.opencontainers.image.ref.name
//! <root>/blobs/<alg>/<hex>   content-addressed blobs
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::digest::{validate_digest, verify_content};
use crate::error::{RegistryError, RegistryResult};
use crate::repository::Repository;
use crate::types::{
    Descriptor, Index, Manifest, ANNOTATION_REF_NAME, ARTIFACT_TYPE_SIGNATURE,
    MEDIA_TYPE_IMAGE_MANIFEST,
};

/// Layout version this store understands.
const IMAGE_LAYOUT_VERSION: &str = "1.0.0";

/// Read-only view of an OCI image layout directory.
#[derive(Debug, Clone)]
pub struct LayoutRepository {
    root: PathBuf,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutFile {
    image_layout_version: String,
}

/// Just enough of a manifest to learn its media type.
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaTypeProbe {
    #[serde(default)]
    media_type: Option<String>,
}

impl LayoutRepository {
    /// Open the layout at `root`, checking the `oci-layout` marker.
    pub fn open(root: impl AsRef<Path>) -> RegistryResult<Self> {
        let root = root.as_ref().to_path_buf();
        let marker = root.join("oci-layout");

        let content = std::fs::read_to_string(&marker).map_err(|e| {
            RegistryError::layout(format!("failed to read {}: {}", marker.display(), e))
        })?;
        let layout: LayoutFile = serde_json::from_str(&content).map_err(|e| {
            RegistryError::layout(format!("malformed {}: {}", marker.display(), e))
        })?;

        if layout.image_layout_version != IMAGE_LAYOUT_VERSION {
            return Err(RegistryError::layout(format!(
                "unsupported image layout version {}",
                layout.image_layout_version
            )));
        }

        Ok(Self { root })
    }

    /// Layout root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, digest: &str) -> RegistryResult<PathBuf> {
        validate_digest(digest)?;
        let (algorithm, encoded) = digest.split_once(':').unwrap_or(("sha256", digest));
        Ok(self.root.join("blobs").join(algorithm).join(encoded))
    }

    fn display_ref(&self, reference: &str) -> String {
        let sep = if reference.contains(':') { '@' } else { ':' };
        format!("{}{}{}", self.root.display(), sep, reference)
    }

    async fn read_index(&self) -> RegistryResult<Index> {
        let path = self.root.join("index.json");
        let bytes = fs::read(&path).await.map_err(|e| {
            RegistryError::layout(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            RegistryError::layout(format!("malformed {}: {}", path.display(), e))
        })
    }

    async fn read_blob(&self, digest: &str) -> RegistryResult<Vec<u8>> {
        let path = self.blob_path(digest)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RegistryError::NotFound {
                reference: self.display_ref(digest),
            }),
            Err(e) => Err(RegistryError::layout(format!(
                "failed to read blob {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl Repository for LayoutRepository {
    async fn resolve(&self, reference: &str) -> RegistryResult<Descriptor> {
        debug!(root = %self.root.display(), reference, "resolving in OCI layout");
        let index = self.read_index().await?;

        let found = if reference.contains(':') {
            index.manifests.into_iter().find(|d| d.digest == reference)
        } else {
            index
                .manifests
                .into_iter()
                .find(|d| d.annotation(ANNOTATION_REF_NAME) == Some(reference))
        };

        if let Some(mut desc) = found {
            // Tag annotations describe the index entry, not the content
            desc.annotations = None;
            return Ok(desc);
        }

        if !reference.contains(':') {
            return Err(RegistryError::NotFound {
                reference: self.display_ref(reference),
            });
        }

        // Digest not listed in index.json; fall back to the blob store
        let bytes = self.read_blob(reference).await?;
        verify_content(reference, &bytes)?;
        let probe: MediaTypeProbe = serde_json::from_slice(&bytes).map_err(|e| {
            RegistryError::layout(format!("{} is not a manifest: {}", reference, e))
        })?;

        Ok(Descriptor {
            media_type: probe
                .media_type
                .unwrap_or_else(|| MEDIA_TYPE_IMAGE_MANIFEST.to_string()),
            digest: reference.to_string(),
            size: bytes.len() as u64,
            artifact_type: None,
            annotations: None,
        })
    }

    async fn fetch_manifest(&self, desc: &Descriptor) -> RegistryResult<Manifest> {
        let bytes = self.fetch_blob(desc).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            RegistryError::layout(format!("failed to parse manifest {}: {}", desc.digest, e))
        })
    }

    async fn fetch_blob(&self, desc: &Descriptor) -> RegistryResult<Vec<u8>> {
        let bytes = self.read_blob(&desc.digest).await?;
        verify_content(&desc.digest, &bytes)?;
        Ok(bytes)
    }

    async fn list_signatures(&self, subject: &Descriptor) -> RegistryResult<Vec<Descriptor>> {
        let index = self.read_index().await?;
        let mut signatures = Vec::new();

        for desc in index.manifests {
            if desc.media_type != MEDIA_TYPE_IMAGE_MANIFEST || desc.digest == subject.digest {
                continue;
            }
            if let Some(artifact_type) = &desc.artifact_type {
                if artifact_type != ARTIFACT_TYPE_SIGNATURE {
                    continue;
                }
            }

            let manifest = self.fetch_manifest(&desc).await?;
            let refers_to_subject = manifest
                .subject
                .as_ref()
                .map(|s| s.digest == subject.digest)
                .unwrap_or(false);

            if refers_to_subject && manifest.effective_artifact_type() == ARTIFACT_TYPE_SIGNATURE {
                signatures.push(Descriptor {
                    artifact_type: Some(ARTIFACT_TYPE_SIGNATURE.to_string()),
                    annotations: manifest.annotations.clone(),
                    ..desc
                });
            }
        }

        debug!(subject = %subject.digest, count = signatures.len(), "listed signatures");
        Ok(signatures)
    }
}
