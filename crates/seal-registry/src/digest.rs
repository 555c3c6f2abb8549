//! Content digests (`<algorithm>:<hex>`).

use std::io::{Cursor, Read};

use sha2::{Digest, Sha256, Sha512};

use crate::error::{RegistryError, RegistryResult};

/// Supported digest algorithms and the length of their hex encoding.
const ALGORITHMS: [(&str, usize); 2] = [("sha256", 64), ("sha512", 128)];

pub(crate) fn sha256_hex_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

/// Compute the `sha256:` digest of in-memory content.
pub fn sha256_digest(bytes: &[u8]) -> String {
    // Reading from an in-memory cursor cannot fail.
    sha256_hex_reader(Cursor::new(bytes)).unwrap_or_default()
}

/// Compute the digest of `bytes` using the algorithm named by `expected`.
fn digest_with_algorithm(algorithm: &str, bytes: &[u8]) -> String {
    match algorithm {
        "sha512" => format!("sha512:{}", hex::encode(Sha512::digest(bytes))),
        _ => sha256_digest(bytes),
    }
}

/// Check that a digest string is well-formed.
pub fn validate_digest(digest: &str) -> RegistryResult<()> {
    let (algorithm, encoded) = digest
        .split_once(':')
        .ok_or_else(|| RegistryError::invalid_reference(digest, "digest must be <algorithm>:<hex>"))?;

    let expected_len = ALGORITHMS
        .iter()
        .find(|(name, _)| *name == algorithm)
        .map(|(_, len)| *len)
        .ok_or_else(|| {
            RegistryError::invalid_reference(
                digest,
                format!("unsupported digest algorithm '{}'", algorithm),
            )
        })?;

    if encoded.len() != expected_len
        || !encoded
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        return Err(RegistryError::invalid_reference(
            digest,
            format!(
                "{} digest must be {} lowercase hex characters",
                algorithm, expected_len
            ),
        ));
    }

    Ok(())
}

/// Verify `bytes` hash to `expected`.
pub fn verify_content(expected: &str, bytes: &[u8]) -> RegistryResult<()> {
    validate_digest(expected)?;
    let algorithm = expected.split(':').next().unwrap_or("sha256");
    let actual = digest_with_algorithm(algorithm, bytes);
    if actual != expected {
        return Err(RegistryError::DigestMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
