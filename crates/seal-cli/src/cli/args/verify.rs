use clap::Args;

use super::common::{LoggingFlags, SecureFlags};

const VERIFY_LONG_ABOUT: &str = "Verify OCI artifacts

Prerequisite: added a public key into the trust store and created a trust policy.

Example - Verify a signature on an OCI artifact identified by a digest:
  seal verify <registry>/<repository>@<digest>

Example - Verify a signature on an OCI artifact identified by a tag (seal will resolve tag to digest):
  seal verify <registry>/<repository>:<tag>

Example - [Experimental] Verify a signature on an OCI artifact referenced in an OCI layout using trust policy statement specified by scope:
  seal verify --oci-layout <path>@<digest> --scope <trust_policy_scope>

Example - [Experimental] Verify a signature on an OCI artifact identified by a tag and referenced in an OCI layout:
  seal verify --oci-layout <path>:<tag> --scope <trust_policy_scope>";

#[derive(Args, Clone, Debug, Default)]
#[command(about = "Verify OCI artifacts", long_about = VERIFY_LONG_ABOUT)]
pub struct VerifyArgs {
    /// Artifact reference (`<registry>/<repository>:<tag>|@<digest>`)
    #[arg(value_name = "REFERENCE")]
    pub reference: Option<String>,

    /// {key}={value} pairs passed as-is to a verification plugin
    #[arg(long = "plugin-config", value_name = "KEY=VALUE")]
    pub plugin_config: Vec<String>,

    /// {key}={value} pairs that must be present in the signature
    #[arg(long = "user-metadata", short = 'm', value_name = "KEY=VALUE")]
    pub user_metadata: Vec<String>,

    /// [Experimental] verify the artifact stored as OCI image layout
    #[arg(long)]
    pub oci_layout: bool,

    /// [Experimental] set trust policy scope for artifact verification, required and can only be used when flag "--oci-layout" is set
    #[arg(long)]
    pub scope: Option<String>,

    #[command(flatten)]
    pub secure: SecureFlags,

    #[command(flatten)]
    pub logging: LoggingFlags,
}
