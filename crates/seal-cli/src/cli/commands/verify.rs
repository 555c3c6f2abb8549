//! `seal verify` - Verify the signatures of an OCI artifact.

use std::collections::BTreeMap;
use std::io::{self, Write};

use anyhow::{anyhow, bail, Context, Result};
use seal_registry::{
    intended_reference, open_repository, resolve_reference, ArtifactRef, InputType, Repository,
};
use seal_verifier::{
    DsseVerifier, VerificationLevel, VerificationOutcome, Verifier, VerifyOptions, VerifyResult,
    MAX_SIGNATURE_ATTEMPTS,
};
use tracing::debug;

use crate::cli::args::VerifyArgs;
use crate::cli::flags::{parse_flag_map, PLUGIN_CONFIG_FLAG, USER_METADATA_FLAG};
use crate::cli::output::print_metadata_map;
use crate::exit_codes::EXIT_SUCCESS;
use crate::experimental::Experimental;

const COMMAND_PATH: &str = "seal verify";

/// Validated input of one verify invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    pub reference: String,
    pub plugin_config: BTreeMap<String, String>,
    pub user_metadata: BTreeMap<String, String>,
    pub input_type: InputType,
    /// Set iff `input_type` is `OciLayout`.
    pub trust_policy_scope: Option<String>,
}

impl VerifyRequest {
    /// Validate CLI arguments.
    ///
    /// Runs before any verifier construction or network activity. The
    /// experimental warning, if any, goes to `err`.
    pub fn from_args(args: &VerifyArgs, experimental: &Experimental, err: &mut dyn Write) -> Result<Self> {
        let reference = args
            .reference
            .clone()
            .ok_or_else(|| anyhow!("missing reference"))?;

        match (args.oci_layout, args.scope.is_some()) {
            (true, false) => bail!(
                "if any flags in the group [oci-layout scope] are set they must all be set; missing [scope]"
            ),
            (false, true) => bail!(
                "if any flags in the group [oci-layout scope] are set they must all be set; missing [oci-layout]"
            ),
            _ => {}
        }

        let mut changed = Vec::new();
        if args.oci_layout {
            changed.push("oci-layout");
        }
        if args.scope.is_some() {
            changed.push("scope");
        }
        if let Some(warning) = experimental.check_flags(COMMAND_PATH, &changed)? {
            writeln!(err, "{}", warning)?;
        }

        let plugin_config = parse_flag_map(&args.plugin_config, PLUGIN_CONFIG_FLAG)?;
        let user_metadata = parse_flag_map(&args.user_metadata, USER_METADATA_FLAG)?;
        args.secure.validate()?;

        Ok(Self {
            reference,
            plugin_config,
            user_metadata,
            input_type: if args.oci_layout {
                InputType::OciLayout
            } else {
                InputType::Registry
            },
            trust_policy_scope: args.scope.clone(),
        })
    }
}

/// Entry point of `seal verify`.
pub async fn run(args: VerifyArgs, experimental: Experimental) -> Result<i32> {
    let request = VerifyRequest::from_args(&args, &experimental, &mut io::stderr())?;

    let verifier = DsseVerifier::from_config()?;
    let artifact = ArtifactRef::parse(request.input_type, &request.reference)?;
    let repo = open_repository(request.input_type, &artifact, &args.secure.registry_config())?;

    let stdout = io::stdout();
    let stderr = io::stderr();
    run_verify(
        &request,
        &artifact,
        repo.as_ref(),
        &verifier,
        &mut stdout.lock(),
        &mut stderr.lock(),
    )
    .await?;
    Ok(EXIT_SUCCESS)
}

/// Resolve, verify and report one artifact.
pub async fn run_verify(
    request: &VerifyRequest,
    artifact: &ArtifactRef,
    repo: &dyn Repository,
    verifier: &dyn Verifier,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<()> {
    let mut warning = None;
    let (_, resolved) = resolve_reference(repo, artifact, |tag, _| {
        warning = Some(format!(
            "Warning: Always verify the artifact using digest(@sha256:...) rather than a tag(:{}) because resolved digest may not point to the same signed artifact, as tags are mutable.",
            tag
        ));
    })
    .await?;
    if let Some(warning) = warning {
        writeln!(err, "{}", warning)?;
    }

    let print_out = resolved.to_string();
    let opts = VerifyOptions {
        artifact_reference: intended_reference(&resolved, request.trust_policy_scope.as_deref()),
        plugin_config: request.plugin_config.clone(),
        max_signature_attempts: MAX_SIGNATURE_ATTEMPTS,
        user_metadata: request.user_metadata.clone(),
    };
    debug!(reference = %opts.artifact_reference, "verifying");

    let result = seal_verifier::verify(verifier, repo, &opts)
        .await
        .map(|(_, outcomes)| outcomes);
    let outcomes = check_verification_failure(result, &print_out)?;
    report_verification_success(&outcomes, &print_out, out, err)?;
    Ok(())
}

/// Turn the verifier result into the outcomes to report or a failure.
pub fn check_verification_failure(
    result: VerifyResult<Vec<VerificationOutcome>>,
    print_out: &str,
) -> Result<Vec<VerificationOutcome>> {
    match result {
        Ok(outcomes) if !outcomes.is_empty() => Ok(outcomes),
        Err(e) if !e.is_verification_failed() => {
            Err(anyhow::Error::new(e).context("signature verification failed"))
        }
        other => {
            if let Err(e) = other {
                debug!(error = %e, "all signatures rejected");
            }
            Err(anyhow!(
                "signature verification failed for all the signatures associated with {}",
                print_out
            ))
        }
    }
}

/// Print the result of a successful verification.
pub fn report_verification_success(
    outcomes: &[VerificationOutcome],
    print_out: &str,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<()> {
    let outcome = outcomes
        .first()
        .context("no verification outcome to report")?;

    for result in &outcome.results {
        if let Some(error) = &result.error {
            writeln!(
                err,
                "Warning: {} was set to \"{}\" and failed with error: {}",
                result.kind, result.action, error
            )?;
        }
    }

    if outcome.level == VerificationLevel::Skip {
        writeln!(
            out,
            "Trust policy is configured to skip signature verification for {}",
            print_out
        )?;
        return Ok(());
    }

    writeln!(out, "Successfully verified signature for {}", print_out)?;
    let metadata = outcome.user_metadata().unwrap_or_default();
    if !metadata.is_empty() {
        writeln!(out)?;
        writeln!(out, "The artifact was signed with the following user metadata.")?;
        print_metadata_map(out, &metadata)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use seal_registry::{
        Descriptor, Manifest, RegistryError, RegistryResult, MEDIA_TYPE_DSSE_ENVELOPE,
        MEDIA_TYPE_EMPTY_JSON, MEDIA_TYPE_IMAGE_MANIFEST,
    };
    use seal_verifier::{
        SignedPayload, VerificationAction, VerificationResult, VerificationType, VerifyError,
    };
    use std::sync::Mutex;

    const REGISTRY: &str = "localhost:5000/net-monitor";

    fn target() -> Descriptor {
        Descriptor::for_content(MEDIA_TYPE_IMAGE_MANIFEST, b"artifact")
    }

    fn envelope_layer() -> Descriptor {
        Descriptor::for_content(MEDIA_TYPE_DSSE_ENVELOPE, b"envelope")
    }

    fn signature() -> Descriptor {
        Descriptor::for_content(MEDIA_TYPE_IMAGE_MANIFEST, b"signature")
    }

    /// One artifact tagged `v1` with one signature; records resolve calls.
    #[derive(Default)]
    struct FakeRepo {
        unsigned: bool,
        resolved: Mutex<Vec<String>>,
    }

    impl FakeRepo {
        fn resolve_calls(&self) -> Vec<String> {
            self.resolved.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Repository for FakeRepo {
        async fn resolve(&self, reference: &str) -> RegistryResult<Descriptor> {
            self.resolved.lock().unwrap().push(reference.to_string());
            let target = target();
            if reference == "v1" || reference == target.digest {
                Ok(target)
            } else {
                Err(RegistryError::NotFound {
                    reference: format!("{}:{}", REGISTRY, reference),
                })
            }
        }

        async fn fetch_manifest(&self, _desc: &Descriptor) -> RegistryResult<Manifest> {
            Ok(Manifest {
                schema_version: 2,
                media_type: Some(MEDIA_TYPE_IMAGE_MANIFEST.to_string()),
                artifact_type: None,
                config: Descriptor::for_content(MEDIA_TYPE_EMPTY_JSON, b"{}"),
                layers: vec![envelope_layer()],
                subject: Some(target()),
                annotations: None,
            })
        }

        async fn fetch_blob(&self, _desc: &Descriptor) -> RegistryResult<Vec<u8>> {
            Ok(b"envelope".to_vec())
        }

        async fn list_signatures(&self, _subject: &Descriptor) -> RegistryResult<Vec<Descriptor>> {
            if self.unsigned {
                Ok(vec![])
            } else {
                Ok(vec![signature()])
            }
        }
    }

    enum Script {
        Accept(VerificationOutcome),
        Reject,
        Broken,
        Skip,
    }

    struct FakeVerifier {
        script: Script,
        seen_reference: Mutex<Option<String>>,
    }

    impl FakeVerifier {
        fn new(script: Script) -> Self {
            Self {
                script,
                seen_reference: Mutex::new(None),
            }
        }
    }

    impl Verifier for FakeVerifier {
        fn skip_level(&self, opts: &VerifyOptions) -> VerifyResult<Option<VerificationLevel>> {
            *self.seen_reference.lock().unwrap() = Some(opts.artifact_reference.clone());
            Ok(matches!(self.script, Script::Skip).then_some(VerificationLevel::Skip))
        }

        fn verify(
            &self,
            _target: &Descriptor,
            _envelope: &[u8],
            _opts: &VerifyOptions,
        ) -> VerifyResult<VerificationOutcome> {
            match &self.script {
                Script::Accept(outcome) => Ok(outcome.clone()),
                Script::Reject => Err(VerifyError::VerificationFailed {
                    reason: "authenticity check failed".into(),
                }),
                Script::Broken => Err(VerifyError::TrustStore {
                    message: "store vanished".into(),
                }),
                Script::Skip => Ok(VerificationOutcome::skipped()),
            }
        }
    }

    fn accepted(metadata: &[(&str, &str)], logged_expiry: bool) -> VerificationOutcome {
        let mut signed = target();
        if !metadata.is_empty() {
            signed.annotations = Some(
                metadata
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        }
        let mut results = vec![VerificationResult {
            kind: VerificationType::Integrity,
            action: VerificationAction::Enforce,
            error: None,
        }];
        if logged_expiry {
            results.push(VerificationResult {
                kind: VerificationType::Expiry,
                action: VerificationAction::Log,
                error: Some("signature expired at 2026-01-01T00:00:00+00:00".into()),
            });
        }
        VerificationOutcome {
            level: VerificationLevel::Permissive,
            results,
            payload: Some(SignedPayload {
                target_artifact: signed,
                signed_at: chrono::Utc::now(),
                expires_at: None,
            }),
        }
    }

    fn request(reference: &str) -> VerifyRequest {
        VerifyRequest {
            reference: reference.to_string(),
            plugin_config: BTreeMap::new(),
            user_metadata: BTreeMap::new(),
            input_type: InputType::Registry,
            trust_policy_scope: None,
        }
    }

    struct Run {
        result: Result<()>,
        out: String,
        err: String,
    }

    async fn run_with(request: &VerifyRequest, repo: &FakeRepo, verifier: &FakeVerifier) -> Run {
        let artifact = ArtifactRef::parse(request.input_type, &request.reference).unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = run_verify(request, &artifact, repo, verifier, &mut out, &mut err).await;
        Run {
            result,
            out: String::from_utf8(out).unwrap(),
            err: String::from_utf8(err).unwrap(),
        }
    }

    fn args(reference: Option<&str>) -> VerifyArgs {
        VerifyArgs {
            reference: reference.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_digest_reference_needs_no_tag_lookup() {
        let repo = FakeRepo::default();
        let verifier = FakeVerifier::new(Script::Accept(accepted(&[], false)));
        let reference = format!("{}@{}", REGISTRY, target().digest);
        let run = run_with(&request(&reference), &repo, &verifier).await;

        run.result.unwrap();
        assert!(run.err.is_empty(), "unexpected stderr: {}", run.err);
        assert!(repo.resolve_calls().iter().all(|r| r == &target().digest));
        assert_eq!(run.out, format!("Successfully verified signature for {}\n", reference));
    }

    #[tokio::test]
    async fn test_tag_reference_warns_once() {
        let repo = FakeRepo::default();
        let verifier = FakeVerifier::new(Script::Accept(accepted(&[], false)));
        let run = run_with(&request(&format!("{}:v1", REGISTRY)), &repo, &verifier).await;

        run.result.unwrap();
        assert_eq!(run.err.matches("Warning: Always verify the artifact").count(), 1);
        assert!(run.err.contains("rather than a tag(:v1)"));
        let resolved = format!("{}@{}", REGISTRY, target().digest);
        assert!(run.out.contains(&resolved));
        assert_eq!(
            verifier.seen_reference.lock().unwrap().as_deref(),
            Some(resolved.as_str())
        );
    }

    #[tokio::test]
    async fn test_scope_becomes_intended_reference() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FakeRepo::default();
        let verifier = FakeVerifier::new(Script::Accept(accepted(&[], false)));
        let request = VerifyRequest {
            input_type: InputType::OciLayout,
            trust_policy_scope: Some("local/net-monitor".to_string()),
            ..request(&format!("{}@{}", dir.path().display(), target().digest))
        };
        let run = run_with(&request, &repo, &verifier).await;

        run.result.unwrap();
        assert_eq!(
            verifier.seen_reference.lock().unwrap().clone(),
            Some(format!("local/net-monitor@{}", target().digest))
        );
    }

    #[tokio::test]
    async fn test_no_signatures_is_failure() {
        let repo = FakeRepo {
            unsigned: true,
            ..Default::default()
        };
        let verifier = FakeVerifier::new(Script::Accept(accepted(&[], false)));
        let reference = format!("{}@{}", REGISTRY, target().digest);
        let run = run_with(&request(&reference), &repo, &verifier).await;

        let err = run.result.unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            format!("signature verification failed for all the signatures associated with {}", reference)
        );
        assert!(run.out.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_signatures_are_failure() {
        let repo = FakeRepo::default();
        let verifier = FakeVerifier::new(Script::Reject);
        let reference = format!("{}@{}", REGISTRY, target().digest);
        let run = run_with(&request(&reference), &repo, &verifier).await;

        let err = run.result.unwrap_err();
        assert!(format!("{err:#}").starts_with("signature verification failed for all the signatures"));
    }

    #[tokio::test]
    async fn test_other_verifier_error_is_wrapped() {
        let repo = FakeRepo::default();
        let verifier = FakeVerifier::new(Script::Broken);
        let reference = format!("{}@{}", REGISTRY, target().digest);
        let run = run_with(&request(&reference), &repo, &verifier).await;

        let err = run.result.unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "signature verification failed: trust store error: store vanished"
        );
    }

    #[tokio::test]
    async fn test_resolution_error_propagates_verbatim() {
        let repo = FakeRepo::default();
        let verifier = FakeVerifier::new(Script::Accept(accepted(&[], false)));
        let run = run_with(&request(&format!("{}:missing", REGISTRY)), &repo, &verifier).await;

        let err = run.result.unwrap_err();
        assert!(err.downcast_ref::<RegistryError>().is_some());
        assert!(verifier.seen_reference.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_skip_level_message() {
        let repo = FakeRepo::default();
        let verifier = FakeVerifier::new(Script::Skip);
        let reference = format!("{}@{}", REGISTRY, target().digest);
        let run = run_with(&request(&reference), &repo, &verifier).await;

        run.result.unwrap();
        assert_eq!(
            run.out,
            format!("Trust policy is configured to skip signature verification for {}\n", reference)
        );
        assert!(!run.out.contains("Successfully verified"));
    }

    #[tokio::test]
    async fn test_success_with_metadata_and_warning() {
        let repo = FakeRepo::default();
        let verifier = FakeVerifier::new(Script::Accept(accepted(&[("buildId", "42")], true)));
        let reference = format!("{}@{}", REGISTRY, target().digest);
        let run = run_with(&request(&reference), &repo, &verifier).await;

        run.result.unwrap();
        let expected = format!(
            "Successfully verified signature for {}\n\nThe artifact was signed with the following user metadata.\n\nKEY       VALUE\nbuildId   42\n",
            reference
        );
        assert_eq!(run.out, expected);
        assert_eq!(
            run.err,
            "Warning: expiry was set to \"log\" and failed with error: signature expired at 2026-01-01T00:00:00+00:00\n"
        );
    }

    #[test]
    fn test_check_empty_outcomes_without_error() {
        let err = check_verification_failure(Ok(vec![]), "ref@sha256:abc").unwrap_err();
        assert_eq!(
            err.to_string(),
            "signature verification failed for all the signatures associated with ref@sha256:abc"
        );
    }

    #[test]
    fn test_missing_reference() {
        let err = VerifyRequest::from_args(&args(None), &Experimental::new(true), &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "missing reference");
    }

    #[test]
    fn test_scope_requires_oci_layout() {
        let mut with_scope = args(Some("layout@sha256:abc"));
        with_scope.scope = Some("local/app".into());
        let err = VerifyRequest::from_args(&with_scope, &Experimental::new(true), &mut Vec::new())
            .unwrap_err();
        assert!(err.to_string().ends_with("missing [oci-layout]"));

        let mut with_layout = args(Some("layout@sha256:abc"));
        with_layout.oci_layout = true;
        let err = VerifyRequest::from_args(&with_layout, &Experimental::new(true), &mut Vec::new())
            .unwrap_err();
        assert!(err.to_string().ends_with("missing [scope]"));
    }

    #[test]
    fn test_layout_flags_gated() {
        let mut layout = args(Some("layout@sha256:abc"));
        layout.oci_layout = true;
        layout.scope = Some("local/app".into());

        let err = VerifyRequest::from_args(&layout, &Experimental::new(false), &mut Vec::new())
            .unwrap_err();
        assert!(err.to_string().contains("is experimental and not enabled by default"));

        let mut stderr = Vec::new();
        let request = VerifyRequest::from_args(&layout, &Experimental::new(true), &mut stderr).unwrap();
        assert_eq!(request.input_type, InputType::OciLayout);
        assert_eq!(request.trust_policy_scope.as_deref(), Some("local/app"));
        assert!(String::from_utf8(stderr).unwrap().starts_with("Warning: This feature is experimental"));
    }

    #[test]
    fn test_malformed_plugin_config_rejected() {
        let mut bad = args(Some("localhost:5000/net-monitor:v1"));
        bad.plugin_config = vec!["novalue".into()];
        let err = VerifyRequest::from_args(&bad, &Experimental::new(false), &mut Vec::new())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not parse flag --plugin-config: key-value pair requires \"=\" as separator"
        );
    }

    #[test]
    fn test_username_without_password_rejected() {
        let mut half = args(Some("localhost:5000/net-monitor:v1"));
        half.secure.username = Some("alice".into());
        half.secure.password = None;
        let err = VerifyRequest::from_args(&half, &Experimental::new(false), &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "--password is required when --username is set");
    }

    #[test]
    fn test_registry_request_defaults() {
        let mut ok = args(Some("localhost:5000/net-monitor:v1"));
        ok.user_metadata = vec!["buildId=42".into()];
        let request = VerifyRequest::from_args(&ok, &Experimental::new(false), &mut Vec::new()).unwrap();
        assert_eq!(request.input_type, InputType::Registry);
        assert_eq!(request.trust_policy_scope, None);
        assert_eq!(request.user_metadata.get("buildId").map(String::as_str), Some("42"));
    }
}
