//! DSSE envelopes (Ed25519 over PAE).
//!
//! Envelope parsing and signature checks only; which failures matter is
//! decided by the trust policy in `verifier.rs`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier as _, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::{VerifyError, VerifyResult};
use crate::outcome::SignedPayload;
use crate::trust::compute_key_id;

/// Payload type of seal signature payloads.
pub const PAYLOAD_TYPE_SEAL_V1: &str = "application/vnd.seal.payload.v1+json";

/// DSSE envelope structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DsseEnvelope {
    /// Payload type (e.g., "application/vnd.seal.payload.v1+json").
    #[serde(rename = "payloadType")]
    pub payload_type: String,

    /// Base64-encoded payload.
    pub payload: String,

    /// Signatures.
    pub signatures: Vec<DsseSignature>,
}

/// DSSE signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DsseSignature {
    /// Key ID.
    #[serde(rename = "keyid")]
    pub key_id: String,

    /// Base64-encoded signature.
    #[serde(rename = "sig")]
    pub signature: String,
}

/// Build the DSSE pre-authentication encoding.
pub fn build_pae(payload_type: &str, payload: &[u8]) -> Vec<u8> {
    let type_len = payload_type.len().to_string();
    let payload_len = payload.len().to_string();

    let mut pae = Vec::new();
    pae.extend_from_slice(b"DSSEv1 ");
    pae.extend_from_slice(type_len.as_bytes());
    pae.push(b' ');
    pae.extend_from_slice(payload_type.as_bytes());
    pae.push(b' ');
    pae.extend_from_slice(payload_len.as_bytes());
    pae.push(b' ');
    pae.extend_from_slice(payload);
    pae
}

/// Parse an envelope and decode its payload.
///
/// Errors are plain reasons: the caller files them under the integrity check.
pub(crate) fn open_envelope(bytes: &[u8]) -> Result<(DsseEnvelope, Vec<u8>, SignedPayload), String> {
    let envelope: DsseEnvelope =
        serde_json::from_slice(bytes).map_err(|e| format!("invalid DSSE envelope: {}", e))?;

    if envelope.payload_type != PAYLOAD_TYPE_SEAL_V1 {
        return Err(format!(
            "payload type mismatch: expected {}, got {}",
            PAYLOAD_TYPE_SEAL_V1, envelope.payload_type
        ));
    }

    if envelope.signatures.is_empty() {
        return Err("no signatures in envelope".to_string());
    }

    let payload_bytes = BASE64
        .decode(&envelope.payload)
        .map_err(|e| format!("invalid base64 payload: {}", e))?;

    let payload: SignedPayload = serde_json::from_slice(&payload_bytes)
        .map_err(|e| format!("invalid signature payload: {}", e))?;

    Ok((envelope, payload_bytes, payload))
}

/// Verify that at least one envelope signature was made by one of `keys`.
///
/// Returns the key id that verified.
pub(crate) fn verify_envelope_signatures<'a, I>(
    envelope: &DsseEnvelope,
    payload: &[u8],
    keys: I,
) -> Result<String, String>
where
    I: IntoIterator<Item = (&'a str, &'a VerifyingKey)> + Clone,
{
    let pae = build_pae(&envelope.payload_type, payload);
    let mut last_error = None;

    for sig in &envelope.signatures {
        let key = keys
            .clone()
            .into_iter()
            .find(|(key_id, _)| *key_id == sig.key_id)
            .map(|(_, key)| key);

        let Some(key) = key else {
            last_error = Some(format!("key {} is not in a trusted store", sig.key_id));
            continue;
        };

        match verify_single_signature(&pae, &sig.signature, key) {
            Ok(()) => return Ok(sig.key_id.clone()),
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error.unwrap_or_else(|| "no valid signatures".to_string()))
}

fn verify_single_signature(pae: &[u8], signature_b64: &str, key: &VerifyingKey) -> Result<(), String> {
    let signature_bytes = BASE64
        .decode(signature_b64)
        .map_err(|e| format!("invalid base64 signature: {}", e))?;

    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|e| format!("invalid signature bytes: {}", e))?;

    key.verify(pae, &signature)
        .map_err(|_| "ed25519 verification failed".to_string())
}

/// Sign `payload` into a serialized DSSE envelope.
pub fn sign_envelope(payload: &SignedPayload, key: &SigningKey) -> VerifyResult<Vec<u8>> {
    let payload_bytes = serde_json::to_vec(payload).map_err(|e| VerifyError::Config {
        message: format!("failed to serialize payload: {}", e),
    })?;
    let key_id = compute_key_id(&key.verifying_key())?;
    let pae = build_pae(PAYLOAD_TYPE_SEAL_V1, &payload_bytes);
    let signature = key.sign(&pae);

    let envelope = DsseEnvelope {
        payload_type: PAYLOAD_TYPE_SEAL_V1.to_string(),
        payload: BASE64.encode(&payload_bytes),
        signatures: vec![DsseSignature {
            key_id,
            signature: BASE64.encode(signature.to_bytes()),
        }],
    };

    serde_json::to_vec(&envelope).map_err(|e| VerifyError::Config {
        message: format!("failed to serialize envelope: {}", e),
    })
}
