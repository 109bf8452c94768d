// Error types for configuration validation

use std::fmt;
use thiserror::Error;

/// Structured validation issue kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssueKind {
    /// A required field is missing or empty
    Required,

    /// Value not among the known names
    InvalidEnumValue {
        value: String,
        allowed: Vec<&'static str>,
    },

    /// Mount type the validator does not know at all
    InvalidMountType {
        value: String,
        allowed: Vec<&'static str>,
    },

    /// Mount type that exists but cannot be used on this host
    MountTypeUnsupportedOnHost { value: String, host: &'static str },

    /// `virtiofs` on macOS without the vz backend
    VirtiofsRequiresVz { vm_type: String },

    /// A feature that only the vz backend provides
    RequiresVz { vm_type: String },

    /// Version string that does not parse
    InvalidVersion { value: String, reason: String },

    /// Template requires a newer tool than the one running
    VersionTooNew { required: String, running: String },

    /// Script without an interpreter line
    MissingShebang,

    /// Identifier (such as a disk name) that cannot be used
    InvalidIdentifier { reason: &'static str },

    /// Param key that does not match the naming rule
    ParamNameMismatch { key: String, pattern: &'static str },

    /// Param value with control characters or line breaks
    ParamValueUnprintable,

    /// Param key that nothing refers to
    ParamUnused { key: String },

    /// Numeric value must be positive
    NotPositive { value: i64 },

    /// Port outside 0..=65535
    PortOutOfRange { value: i64 },

    /// Port range with start after end
    InvalidPortRange { start: i64, end: i64 },

    /// Value already used by an earlier entry
    Duplicate { value: String },

    /// Fields that may not be combined
    Conflict { message: String },

    /// Network interface name too long
    InterfaceTooLong { value: String, max: usize },

    /// Not an IP address
    InvalidIpAddress { value: String },
}

impl ValidationIssueKind {
    /// Human-readable expectation, to follow the field name.
    pub fn message(&self) -> String {
        match self {
            ValidationIssueKind::Required => "must be set".to_string(),
            ValidationIssueKind::InvalidEnumValue { value, allowed } => {
                let allowed: Vec<String> = allowed.iter().map(|name| format!("{name:?}")).collect();
                format!("must be one of {}; got {value:?}", allowed.join(", "))
            }
            ValidationIssueKind::InvalidMountType { value, allowed } => {
                let quoted: Vec<String> = allowed.iter().map(|name| format!("{name:?}")).collect();
                let listed = match quoted.split_last() {
                    Some((last, rest)) if !rest.is_empty() => {
                        format!("{}, or {last}", rest.join(" or "))
                    }
                    _ => quoted.join(""),
                };
                format!("must be {listed}, got {value:?}")
            }
            ValidationIssueKind::MountTypeUnsupportedOnHost { value, host } => {
                format!("{value:?} is not supported on {host}")
            }
            ValidationIssueKind::VirtiofsRequiresVz { vm_type } => {
                format!("\"virtiofs\" on macOS requires vmType \"vz\"; got {vm_type:?}")
            }
            ValidationIssueKind::RequiresVz { vm_type } => {
                format!("can only be enabled for VMType \"vz\"; got {vm_type:?}")
            }
            ValidationIssueKind::InvalidVersion { value, reason } => {
                format!("must be a semantic version, got {value:?}: {reason}")
            }
            ValidationIssueKind::VersionTooNew { required, running } => {
                format!("requires version {required:?}, but this is only {running:?}")
            }
            ValidationIssueKind::MissingShebang => "must start with a '#!' line".to_string(),
            ValidationIssueKind::InvalidIdentifier { reason } => {
                format!("is invalid: {reason}")
            }
            ValidationIssueKind::ParamNameMismatch { key, pattern } => {
                format!("key {key:?} name does not match regex {pattern:?}")
            }
            ValidationIssueKind::ParamValueUnprintable => {
                "value contains unprintable character".to_string()
            }
            ValidationIssueKind::ParamUnused { key } => format!(
                "key {key:?} is not used in any provision, probe, copyToHost, or portForward"
            ),
            ValidationIssueKind::NotPositive { value } => {
                format!("must be a positive number, got {value}")
            }
            ValidationIssueKind::PortOutOfRange { value } => {
                format!("must be within 0..=65535, got {value}")
            }
            ValidationIssueKind::InvalidPortRange { start, end } => {
                format!("must be an ordered range, got [{start}, {end}]")
            }
            ValidationIssueKind::Duplicate { value } => {
                format!("must be unique, {value:?} is already used")
            }
            ValidationIssueKind::Conflict { message } => message.clone(),
            ValidationIssueKind::InterfaceTooLong { value, max } => {
                format!("must be at most {max} characters, got {value:?}")
            }
            ValidationIssueKind::InvalidIpAddress { value } => {
                format!("must be an IP address, got {value:?}")
            }
        }
    }
}

/// A single rule violation at a field path such as `additionalDisks[0].name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub kind: ValidationIssueKind,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field `{}` {}", self.field, self.kind.message())
    }
}

/// Every rule violation found in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_type_message() {
        let issue = ValidationIssue {
            field: "mountType".into(),
            kind: ValidationIssueKind::InvalidMountType {
                value: "rMountType".into(),
                allowed: vec!["reverse-sshfs", "9p", "virtiofs", "wsl2"],
            },
        };
        assert_eq!(
            issue.to_string(),
            "field `mountType` must be \"reverse-sshfs\" or \"9p\" or \"virtiofs\", or \"wsl2\", got \"rMountType\""
        );
    }

    #[test]
    fn test_aggregate_display() {
        let err = ValidationError {
            issues: vec![
                ValidationIssue {
                    field: "images".into(),
                    kind: ValidationIssueKind::Required,
                },
                ValidationIssue {
                    field: "probes[0].script".into(),
                    kind: ValidationIssueKind::MissingShebang,
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "field `images` must be set\nfield `probes[0].script` must start with a '#!' line"
        );
    }
}
