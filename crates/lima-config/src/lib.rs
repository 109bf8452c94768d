//! # lima-config
//!
//! The typed Lima instance configuration.
//!
//! This crate turns a [`lima_yaml::Document`] into a [`LimaYaml`] model,
//! checks the model with a [`Validator`], and serializes it back to YAML.
//!
//! ## Decoding
//!
//! Decoding runs twice. The lenient pass ignores keys the model does not
//! know; its result is what callers get. The strict pass rejects unknown keys;
//! its failure is logged with `tracing::warn!` and returned as
//! [`Decoded::warning`] but never aborts, so templates written for newer
//! versions still load.
//!
//! ```rust
//! use lima_config::load;
//!
//! let decoded = load(b"vmType: vz\nadditionalDisks: [data]\n", "example.yaml").unwrap();
//! assert_eq!(decoded.config.vm_type.as_deref(), Some("vz"));
//! assert_eq!(decoded.config.additional_disks[0].name(), "data");
//! assert!(decoded.warning.is_none());
//! ```
//!
//! ## Validation
//!
//! [`Validator::validate`] reports every violated rule at once. Rules tied to
//! the machine running the tool are skipped unless `for_current_host` is set.

pub mod de;
pub mod decode;
pub mod error;
pub mod marshal;
pub mod platform;
pub mod types;
pub mod validate;
pub mod version;

pub use decode::{Decoded, decode, decode_document, decode_strict, decode_value, load};
pub use error::{DecodeError, FieldPath, MarshalError, PathSegment};
pub use marshal::marshal;
pub use platform::{Arch, GuestOs, HostOs, HostPlatform, MountType, VmType};
pub use types::{BaseTemplates, Disk, DiskFields, LimaYaml, ScriptFile};
pub use validate::{
    ValidationError, ValidationIssue, ValidationIssueKind, Validator, validate,
    validate_params_used,
};
pub use version::{Version, VersionError};
