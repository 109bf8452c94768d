//! Semantic validation of a decoded configuration.
//!
//! Every rule runs on every call and all violations are collected into one
//! [`ValidationError`], in rule order. Validation never mutates the model.
//!
//! Rules that depend on the machine running the tool (Rosetta, virtiofs on
//! macOS, host-specific mount types) only run when validating "for the current
//! host". A template that passes portable validation may therefore still be
//! rejected once it is started on an incompatible host.

mod error;

pub use error::{ValidationError, ValidationIssue, ValidationIssueKind};

use crate::error::FieldPath;
use crate::platform::{
    Arch, GuestOs, HostOs, HostPlatform, MountType, ProbeMode, Proto, ProvisionMode, VmType,
};
use crate::types::LimaYaml;
use crate::version::Version;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::net::IpAddr;
use std::str::FromStr;

const PARAM_NAME_PATTERN: &str = "^[A-Za-z][A-Za-z0-9_]*$";

static PARAM_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(PARAM_NAME_PATTERN).unwrap());

/// Anything but letters, marks, numbers, punctuation, symbols, space and tab.
static UNPRINTABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{M}\p{N}\p{P}\p{S} \t]").unwrap());

/// Longest network interface name the guest kernel accepts.
const MAX_INTERFACE_NAME: usize = 15;

/// Validation context tracks the current field path and collected issues
struct ValidationContext {
    path: FieldPath,
    issues: Vec<ValidationIssue>,
}

impl ValidationContext {
    fn new() -> Self {
        ValidationContext {
            path: FieldPath::new(),
            issues: Vec::new(),
        }
    }

    fn add_issue(&mut self, kind: ValidationIssueKind) {
        self.issues.push(ValidationIssue {
            field: self.path.to_string(),
            kind,
        });
    }

    fn with_field<R>(&mut self, key: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        self.path.push_key(key);
        let result = f(self);
        self.path.pop();
        result
    }

    fn with_index<R>(&mut self, index: usize, f: impl FnOnce(&mut Self) -> R) -> R {
        self.path.push_index(index);
        let result = f(self);
        self.path.pop();
        result
    }

    /// Parse an enumerated value, reporting unknown names.
    fn parse_enum<T: FromStr>(&mut self, value: &str, allowed: Vec<&'static str>) -> Option<T> {
        match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                self.add_issue(ValidationIssueKind::InvalidEnumValue {
                    value: value.to_string(),
                    allowed,
                });
                None
            }
        }
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                issues: self.issues,
            })
        }
    }
}

/// Validates configurations against a host and a running tool version.
#[derive(Debug, Clone)]
pub struct Validator {
    host: HostPlatform,
    tool_version: Option<String>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// A validator for the machine this process runs on.
    pub fn new() -> Self {
        Validator {
            host: HostPlatform::current(),
            tool_version: None,
        }
    }

    pub fn with_host(mut self, host: HostPlatform) -> Self {
        self.host = host;
        self
    }

    /// The version of the tool that will run the instance.
    ///
    /// Without one, `minimumLimaVersion` is only checked for syntax.
    pub fn with_tool_version(mut self, version: impl Into<String>) -> Self {
        self.tool_version = Some(version.into());
        self
    }

    pub fn host(&self) -> &HostPlatform {
        &self.host
    }

    /// Check every rule against `config`.
    ///
    /// `for_current_host` enables the rules that only make sense when the
    /// configuration is about to run on this validator's host.
    pub fn validate(&self, config: &LimaYaml, for_current_host: bool) -> Result<(), ValidationError> {
        let mut ctx = ValidationContext::new();

        self.check_versions(config, &mut ctx);
        let vm_type = self.check_platform(config, &mut ctx);
        check_images(config, &mut ctx);
        if let Some(cpus) = config.cpus.filter(|&cpus| cpus <= 0) {
            ctx.with_field("cpus", |ctx| {
                ctx.add_issue(ValidationIssueKind::NotPositive { value: cpus })
            });
        }
        check_additional_disks(config, &mut ctx);
        check_mounts(config, &mut ctx);
        self.check_mount_type(config, vm_type, for_current_host, &mut ctx);
        check_provision(config, &mut ctx);
        check_probes(config, &mut ctx);
        check_port_forwards(config, &mut ctx);
        check_networks(config, &mut ctx);
        check_dns(config, &mut ctx);
        check_params(config, &mut ctx);
        check_params_used(config, &mut ctx);

        if for_current_host && self.host.supports_rosetta() {
            let rosetta_enabled = config
                .rosetta
                .as_ref()
                .and_then(|rosetta| rosetta.enabled)
                .unwrap_or(false);
            require_vz(rosetta_enabled, vm_type, &["rosetta", "enabled"], &mut ctx);
        }
        require_vz(
            config.nested_virtualization.unwrap_or(false),
            vm_type,
            &["nestedVirtualization"],
            &mut ctx,
        );

        ctx.finish()
    }

    fn check_versions(&self, config: &LimaYaml, ctx: &mut ValidationContext) {
        if let Some(required) = &config.minimum_lima_version {
            ctx.with_field("minimumLimaVersion", |ctx| {
                let Some(required_version) = parse_version(required, ctx) else {
                    return;
                };
                let Some(tool_version) = &self.tool_version else {
                    return;
                };
                let Ok(running) = tool_version.parse::<Version>() else {
                    return;
                };
                if required_version > running {
                    ctx.add_issue(ValidationIssueKind::VersionTooNew {
                        required: required.clone(),
                        running: tool_version.clone(),
                    });
                }
            });
        }

        let qemu_minimum = config
            .vm_opts
            .as_ref()
            .and_then(|opts| opts.qemu.as_ref())
            .and_then(|qemu| qemu.minimum_version.as_ref());
        if let Some(minimum) = qemu_minimum {
            ctx.with_field("vmOpts", |ctx| {
                ctx.with_field("qemu", |ctx| {
                    ctx.with_field("minimumVersion", |ctx| {
                        parse_version(minimum, ctx);
                    })
                })
            });
        }
    }

    /// Check `vmType`, `os` and `arch`; returns the effective backend.
    fn check_platform(&self, config: &LimaYaml, ctx: &mut ValidationContext) -> Option<VmType> {
        let vm_type = match &config.vm_type {
            None => Some(self.host.default_vm_type()),
            Some(value) => ctx.with_field("vmType", |ctx| ctx.parse_enum(value, VmType::names())),
        };
        if let Some(os) = &config.os {
            ctx.with_field("os", |ctx| ctx.parse_enum::<GuestOs>(os, GuestOs::names()));
        }
        if let Some(arch) = &config.arch {
            ctx.with_field("arch", |ctx| ctx.parse_enum::<Arch>(arch, Arch::names()));
        }
        vm_type
    }

    fn check_mount_type(
        &self,
        config: &LimaYaml,
        vm_type: Option<VmType>,
        for_current_host: bool,
        ctx: &mut ValidationContext,
    ) {
        let Some(value) = &config.mount_type else {
            return;
        };
        ctx.with_field("mountType", |ctx| {
            let Ok(mount_type) = value.parse::<MountType>() else {
                ctx.add_issue(ValidationIssueKind::InvalidMountType {
                    value: value.clone(),
                    allowed: MountType::names(),
                });
                return;
            };
            if !for_current_host {
                return;
            }
            match mount_type {
                MountType::Wsl2 if self.host.os != HostOs::Windows => {
                    ctx.add_issue(ValidationIssueKind::MountTypeUnsupportedOnHost {
                        value: value.clone(),
                        host: host_name(self.host.os),
                    });
                }
                MountType::Virtiofs
                    if self.host.os == HostOs::MacOs && vm_type != Some(VmType::Vz) =>
                {
                    ctx.add_issue(ValidationIssueKind::VirtiofsRequiresVz {
                        vm_type: vm_type_name(vm_type, config),
                    });
                }
                _ => {}
            }
        });
    }
}

/// Validate `config` for the machine this process runs on.
pub fn validate(config: &LimaYaml, for_current_host: bool) -> Result<(), ValidationError> {
    Validator::new().validate(config, for_current_host)
}

/// Check only that every declared param is referenced somewhere.
pub fn validate_params_used(config: &LimaYaml) -> Result<(), ValidationError> {
    let mut ctx = ValidationContext::new();
    check_params_used(config, &mut ctx);
    ctx.finish()
}

fn host_name(os: HostOs) -> &'static str {
    match os {
        HostOs::Linux => "Linux",
        HostOs::MacOs => "macOS",
        HostOs::Windows => "Windows",
        HostOs::Other => "this host",
    }
}

fn vm_type_name(vm_type: Option<VmType>, config: &LimaYaml) -> String {
    match vm_type {
        Some(vm_type) => vm_type.as_str().to_string(),
        None => config.vm_type.clone().unwrap_or_default(),
    }
}

fn parse_version(value: &str, ctx: &mut ValidationContext) -> Option<Version> {
    match value.parse::<Version>() {
        Ok(version) => Some(version),
        Err(err) => {
            ctx.add_issue(ValidationIssueKind::InvalidVersion {
                value: value.to_string(),
                reason: err.to_string(),
            });
            None
        }
    }
}

fn require_vz(enabled: bool, vm_type: Option<VmType>, field: &[&str], ctx: &mut ValidationContext) {
    let Some(vm_type) = vm_type else {
        return;
    };
    if !enabled || vm_type == VmType::Vz {
        return;
    }
    for key in field {
        ctx.path.push_key(*key);
    }
    ctx.add_issue(ValidationIssueKind::RequiresVz {
        vm_type: vm_type.as_str().to_string(),
    });
    for _ in field {
        ctx.path.pop();
    }
}

fn check_images(config: &LimaYaml, ctx: &mut ValidationContext) {
    ctx.with_field("images", |ctx| {
        if config.images.is_empty() {
            ctx.add_issue(ValidationIssueKind::Required);
            return;
        }
        for (i, image) in config.images.iter().enumerate() {
            ctx.with_index(i, |ctx| {
                if image.location.is_empty() {
                    ctx.with_field("location", |ctx| ctx.add_issue(ValidationIssueKind::Required));
                }
                if let Some(arch) = &image.arch {
                    ctx.with_field("arch", |ctx| ctx.parse_enum::<Arch>(arch, Arch::names()));
                }
            });
        }
    });
}

fn check_additional_disks(config: &LimaYaml, ctx: &mut ValidationContext) {
    ctx.with_field("additionalDisks", |ctx| {
        for (i, disk) in config.additional_disks.iter().enumerate() {
            let reason = if disk.name().is_empty() {
                Some("identifier must not be empty")
            } else if disk.name().contains('/') {
                Some("identifier must not contain '/'")
            } else if disk.name().starts_with('.') {
                Some("identifier must not start with '.'")
            } else {
                None
            };
            if let Some(reason) = reason {
                ctx.with_index(i, |ctx| {
                    ctx.with_field("name", |ctx| {
                        ctx.add_issue(ValidationIssueKind::InvalidIdentifier { reason })
                    })
                });
            }
        }
    });
}

fn check_mounts(config: &LimaYaml, ctx: &mut ValidationContext) {
    let mut mount_points = HashSet::new();
    ctx.with_field("mounts", |ctx| {
        for (i, mount) in config.mounts.iter().enumerate() {
            ctx.with_index(i, |ctx| {
                if mount.location.is_empty() {
                    ctx.with_field("location", |ctx| ctx.add_issue(ValidationIssueKind::Required));
                }
                let mount_point = mount.mount_point.as_deref().unwrap_or(&mount.location);
                if !mount_point.is_empty() && !mount_points.insert(mount_point) {
                    ctx.with_field("mountPoint", |ctx| {
                        ctx.add_issue(ValidationIssueKind::Duplicate {
                            value: mount_point.to_string(),
                        })
                    });
                }
            });
        }
    });
}

fn check_provision(config: &LimaYaml, ctx: &mut ValidationContext) {
    ctx.with_field("provision", |ctx| {
        for (i, provision) in config.provision.iter().enumerate() {
            ctx.with_index(i, |ctx| {
                let mode = match &provision.mode {
                    Some(mode) => ctx.with_field("mode", |ctx| {
                        ctx.parse_enum::<ProvisionMode>(mode, ProvisionMode::names())
                    }),
                    None => Some(ProvisionMode::System),
                };
                if provision.script.is_some() && provision.file.is_some() {
                    ctx.add_issue(ValidationIssueKind::Conflict {
                        message: "must not set both `script` and `file`".to_string(),
                    });
                }
                match mode {
                    Some(ProvisionMode::Data) => {
                        if provision.path.is_none() {
                            ctx.with_field("path", |ctx| ctx.add_issue(ValidationIssueKind::Required));
                        }
                        if provision.content.is_none() {
                            ctx.with_field("content", |ctx| {
                                ctx.add_issue(ValidationIssueKind::Required)
                            });
                        }
                        if provision.script.is_some() {
                            ctx.add_issue(ValidationIssueKind::Conflict {
                                message: "must not set `script` when mode is \"data\"".to_string(),
                            });
                        }
                    }
                    Some(ProvisionMode::Yq) => {
                        if provision.expression.is_none() {
                            ctx.with_field("expression", |ctx| {
                                ctx.add_issue(ValidationIssueKind::Required)
                            });
                        }
                    }
                    Some(_) => {
                        if provision.script.is_none() && provision.file.is_none() {
                            ctx.with_field("script", |ctx| {
                                ctx.add_issue(ValidationIssueKind::Required)
                            });
                        }
                    }
                    None => {}
                }
            });
        }
    });
}

fn check_probes(config: &LimaYaml, ctx: &mut ValidationContext) {
    ctx.with_field("probes", |ctx| {
        for (i, probe) in config.probes.iter().enumerate() {
            ctx.with_index(i, |ctx| {
                if let Some(mode) = &probe.mode {
                    ctx.with_field("mode", |ctx| {
                        ctx.parse_enum::<ProbeMode>(mode, ProbeMode::names())
                    });
                }
                match (&probe.script, &probe.file) {
                    (Some(script), _) if !script.starts_with("#!") => {
                        ctx.with_field("script", |ctx| {
                            ctx.add_issue(ValidationIssueKind::MissingShebang)
                        });
                    }
                    (None, None) => {
                        ctx.with_field("script", |ctx| ctx.add_issue(ValidationIssueKind::Required));
                    }
                    _ => {}
                }
            });
        }
    });
}

fn check_port(value: i64, ctx: &mut ValidationContext) {
    if !(0..=65535).contains(&value) {
        ctx.add_issue(ValidationIssueKind::PortOutOfRange { value });
    }
}

fn check_port_range(range: [i64; 2], ctx: &mut ValidationContext) {
    let [start, end] = range;
    if start > end {
        ctx.add_issue(ValidationIssueKind::InvalidPortRange { start, end });
        return;
    }
    check_port(start, ctx);
    if end != start {
        check_port(end, ctx);
    }
}

fn check_port_forwards(config: &LimaYaml, ctx: &mut ValidationContext) {
    ctx.with_field("portForwards", |ctx| {
        for (i, rule) in config.port_forwards.iter().enumerate() {
            ctx.with_index(i, |ctx| {
                if let Some(port) = rule.guest_port {
                    ctx.with_field("guestPort", |ctx| check_port(port, ctx));
                }
                if let Some(range) = rule.guest_port_range {
                    ctx.with_field("guestPortRange", |ctx| check_port_range(range, ctx));
                }
                if let Some(port) = rule.host_port {
                    ctx.with_field("hostPort", |ctx| check_port(port, ctx));
                }
                if let Some(range) = rule.host_port_range {
                    ctx.with_field("hostPortRange", |ctx| check_port_range(range, ctx));
                }
                if let Some(proto) = &rule.proto {
                    ctx.with_field("proto", |ctx| ctx.parse_enum::<Proto>(proto, Proto::names()));
                }
            });
        }
    });
}

fn check_networks(config: &LimaYaml, ctx: &mut ValidationContext) {
    ctx.with_field("networks", |ctx| {
        for (i, network) in config.networks.iter().enumerate() {
            ctx.with_index(i, |ctx| {
                let kinds = [
                    network.lima.is_some(),
                    network.socket.is_some(),
                    network.vz_nat.unwrap_or(false),
                ];
                if kinds.iter().filter(|&&set| set).count() > 1 {
                    ctx.add_issue(ValidationIssueKind::Conflict {
                        message: "may set only one of `lima`, `socket` and `vzNAT`".to_string(),
                    });
                }
                if let Some(interface) = &network.interface {
                    if interface.chars().count() > MAX_INTERFACE_NAME {
                        ctx.with_field("interface", |ctx| {
                            ctx.add_issue(ValidationIssueKind::InterfaceTooLong {
                                value: interface.clone(),
                                max: MAX_INTERFACE_NAME,
                            })
                        });
                    }
                }
            });
        }
    });
}

fn check_dns(config: &LimaYaml, ctx: &mut ValidationContext) {
    ctx.with_field("dns", |ctx| {
        for (i, server) in config.dns.iter().enumerate() {
            if server.parse::<IpAddr>().is_err() {
                ctx.with_index(i, |ctx| {
                    ctx.add_issue(ValidationIssueKind::InvalidIpAddress {
                        value: server.clone(),
                    })
                });
            }
        }
    });
}

fn check_params(config: &LimaYaml, ctx: &mut ValidationContext) {
    ctx.with_field("param", |ctx| {
        for (key, value) in &config.param {
            if !PARAM_NAME.is_match(key) {
                ctx.add_issue(ValidationIssueKind::ParamNameMismatch {
                    key: key.clone(),
                    pattern: PARAM_NAME_PATTERN,
                });
            }
            if UNPRINTABLE.is_match(value) {
                ctx.with_field(key, |ctx| ctx.add_issue(ValidationIssueKind::ParamValueUnprintable));
            }
        }
    });
}

/// The strings a param may be referenced from.
fn param_consumers(config: &LimaYaml) -> Vec<&str> {
    let mut fields = Vec::new();
    fields.extend(config.provision.iter().filter_map(|p| p.script.as_deref()));
    fields.extend(config.probes.iter().filter_map(|p| p.script.as_deref()));
    for mount in &config.mounts {
        fields.push(mount.location.as_str());
        fields.extend(mount.mount_point.as_deref());
    }
    for copy in &config.copy_to_host {
        fields.push(copy.guest.as_str());
        fields.push(copy.host.as_str());
    }
    for rule in &config.port_forwards {
        fields.extend(rule.guest_socket.as_deref());
        fields.extend(rule.host_socket.as_deref());
    }
    fields
}

fn check_params_used(config: &LimaYaml, ctx: &mut ValidationContext) {
    if config.param.is_empty() {
        return;
    }
    let consumers = param_consumers(config);
    ctx.with_field("param", |ctx| {
        for key in config.param.keys() {
            let escaped = regex::escape(key);
            let pattern = format!(r"\{{\{{[^}}]*\.Param\.{escaped}[^}}]*\}}\}}|\bPARAM_{escaped}\b");
            // Keys that do not form a valid pattern are reported by the name rule.
            let Ok(reference) = Regex::new(&pattern) else {
                continue;
            };
            if !consumers.iter().any(|field| reference.is_match(field)) {
                ctx.add_issue(ValidationIssueKind::ParamUnused { key: key.clone() });
            }
        }
    });
}

#[cfg(test)]
mod tests;
