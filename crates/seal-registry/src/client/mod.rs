//! Remote registry client (OCI distribution API).
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use tracing::debug;

use crate::digest::{sha256_digest, verify_content};
use crate::error::{RegistryError, RegistryResult};
use crate::repository::Repository;
use crate::types::{
    Descriptor, Index, Manifest, RegistryConfig, ARTIFACT_TYPE_SIGNATURE,
    MEDIA_TYPE_DOCKER_MANIFEST, MEDIA_TYPE_IMAGE_INDEX, MEDIA_TYPE_IMAGE_MANIFEST,
};

mod http;

use http::{HttpBackend, Optional};

/// User agent sent with every request.
pub const REGISTRY_USER_AGENT: &str = concat!("seal-registry/", env!("CARGO_PKG_VERSION"));

/// Manifest media types accepted on resolve.
const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json, \
    application/vnd.oci.image.index.v1+json, \
    application/vnd.docker.distribution.manifest.v2+json";

/// Client for one repository on a remote registry.
#[derive(Debug, Clone)]
pub struct RemoteRepository {
    http: HttpBackend,
    name: String,
}

impl RemoteRepository {
    /// Create a client for `<registry>/<repository>`.
    pub fn new(registry: &str, repository: &str, config: RegistryConfig) -> RegistryResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(REGISTRY_USER_AGENT));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| RegistryError::Network {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        let scheme = if config.plain_http { "http" } else { "https" };
        let base_url = format!("{}://{}/v2/{}", scheme, registry, repository);
        url::Url::parse(&base_url).map_err(|e| RegistryError::Config {
            message: format!("invalid registry URL {}: {}", base_url, e),
        })?;

        Ok(Self {
            http: HttpBackend {
                client,
                base_url,
                config,
            },
            name: format!("{}/{}", registry, repository),
        })
    }

    /// Base URL of the repository (`.../v2/<repository>`).
    pub fn base_url(&self) -> &str {
        &self.http.base_url
    }

    fn manifest_url(&self, reference: &str) -> String {
        format!("{}/manifests/{}", self.http.base_url, reference)
    }

    fn blob_url(&self, digest: &str) -> String {
        format!("{}/blobs/{}", self.http.base_url, digest)
    }

    fn referrers_url(&self, digest: &str) -> RegistryResult<String> {
        let mut url = url::Url::parse(&format!("{}/referrers/{}", self.http.base_url, digest))
            .map_err(|e| RegistryError::Config {
                message: format!("invalid referrers URL: {}", e),
            })?;
        url.query_pairs_mut()
            .append_pair("artifactType", ARTIFACT_TYPE_SIGNATURE);
        Ok(url.to_string())
    }

    /// Display name for errors (`<registry>/<repository>:<tag>` or `@<digest>`).
    fn display_ref(&self, reference: &str) -> String {
        if reference.contains(':') {
            format!("{}@{}", self.name, reference)
        } else {
            format!("{}:{}", self.name, reference)
        }
    }

    /// GET a manifest and return its raw bytes and media type.
    async fn get_manifest_bytes(
        &self,
        reference: &str,
    ) -> RegistryResult<(Vec<u8>, Option<String>)> {
        let url = self.manifest_url(reference);
        debug!(url = %url, "fetching manifest");

        let response = self
            .http
            .request(
                reqwest::Method::GET,
                &url,
                MANIFEST_ACCEPT,
                &self.display_ref(reference),
            )
            .await?;
        let media_type = header_string(response.headers(), CONTENT_TYPE.as_str());
        let bytes = response.bytes().await.map_err(|e| RegistryError::Network {
            message: format!("failed to read manifest body: {}", e),
        })?;
        Ok((bytes.to_vec(), media_type))
    }

    /// Referrers tag schema fallback (`<alg>-<hex>` tag holding an index).
    async fn list_referrers_by_tag(&self, subject: &Descriptor) -> RegistryResult<Index> {
        let tag = subject.digest.replacen(':', "-", 1);
        let url = self.manifest_url(&tag);
        debug!(url = %url, "referrers API unavailable, trying tag schema");

        match self
            .http
            .request_optional(
                reqwest::Method::GET,
                &url,
                MEDIA_TYPE_IMAGE_INDEX,
                &self.display_ref(&tag),
            )
            .await?
        {
            Optional::Missing => Ok(Index::default()),
            Optional::Present(response) => parse_json(response, "referrers index").await,
        }
    }
}

#[async_trait]
impl Repository for RemoteRepository {
    async fn resolve(&self, reference: &str) -> RegistryResult<Descriptor> {
        let url = self.manifest_url(reference);
        debug!(url = %url, "resolving manifest");

        let response = self
            .http
            .request(
                reqwest::Method::HEAD,
                &url,
                MANIFEST_ACCEPT,
                &self.display_ref(reference),
            )
            .await?;
        let headers = response.headers();

        let media_type = header_string(headers, CONTENT_TYPE.as_str())
            .unwrap_or_else(|| MEDIA_TYPE_IMAGE_MANIFEST.to_string());
        let size = header_string(headers, "content-length").and_then(|v| v.parse::<u64>().ok());
        let digest = header_string(headers, "docker-content-digest");

        let (digest, size) = match (digest, size) {
            (Some(digest), Some(size)) => (digest, size),
            _ => {
                // Registry did not describe the manifest; hash it ourselves
                let (bytes, _) = self.get_manifest_bytes(reference).await?;
                (sha256_digest(&bytes), bytes.len() as u64)
            }
        };

        if reference.contains(':') && digest != reference {
            return Err(RegistryError::DigestMismatch {
                expected: reference.to_string(),
                actual: digest,
            });
        }

        Ok(Descriptor {
            media_type,
            digest,
            size,
            artifact_type: None,
            annotations: None,
        })
    }

    async fn fetch_manifest(&self, desc: &Descriptor) -> RegistryResult<Manifest> {
        let (bytes, _) = self.get_manifest_bytes(&desc.digest).await?;
        verify_content(&desc.digest, &bytes)?;
        serde_json::from_slice(&bytes).map_err(|e| RegistryError::InvalidResponse {
            message: format!("failed to parse manifest {}: {}", desc.digest, e),
        })
    }

    async fn fetch_blob(&self, desc: &Descriptor) -> RegistryResult<Vec<u8>> {
        let url = self.blob_url(&desc.digest);
        debug!(url = %url, "fetching blob");

        let response = self
            .http
            .request(
                reqwest::Method::GET,
                &url,
                "*/*",
                &self.display_ref(&desc.digest),
            )
            .await?;
        let bytes = response.bytes().await.map_err(|e| RegistryError::Network {
            message: format!("failed to read blob body: {}", e),
        })?;
        verify_content(&desc.digest, &bytes)?;
        Ok(bytes.to_vec())
    }

    async fn list_signatures(&self, subject: &Descriptor) -> RegistryResult<Vec<Descriptor>> {
        let url = self.referrers_url(&subject.digest)?;
        debug!(url = %url, "listing referrers");

        let index = match self
            .http
            .request_optional(
                reqwest::Method::GET,
                &url,
                MEDIA_TYPE_IMAGE_INDEX,
                &self.display_ref(&subject.digest),
            )
            .await?
        {
            Optional::Present(response) => parse_json(response, "referrers response").await?,
            Optional::Missing => self.list_referrers_by_tag(subject).await?,
        };

        // Registries may ignore the artifactType filter
        Ok(index
            .manifests
            .into_iter()
            .filter(|d| d.artifact_type.as_deref() == Some(ARTIFACT_TYPE_SIGNATURE))
            .collect())
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> RegistryResult<T> {
    response
        .json()
        .await
        .map_err(|e| RegistryError::InvalidResponse {
            message: format!("failed to parse {}: {}", what, e),
        })
}
