/*
 * tests/pipeline.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Resolve, decode and validate templates on disk.
 */

use std::path::Path;

use lima_config::{Arch, HostOs, HostPlatform, ValidationIssueKind, Validator};
use lima_template::{
    Cancellation, Error, Locator, LocatorError, NativeRuntime, ResolveOptions, Template,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Print resolver logs when `RUST_LOG` is set.
fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "off".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

fn write(dir: &Path, name: &str, text: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, text).unwrap();
}

fn linux_validator() -> Validator {
    Validator::new()
        .with_host(HostPlatform::new(HostOs::Linux, Arch::X86_64))
        .with_tool_version("2.0.0")
}

fn embed(tmpl: &mut Template, options: &ResolveOptions) -> lima_template::Result<()> {
    init_logging();
    tmpl.embed(options, &NativeRuntime, &Cancellation::new())
}

#[test]
fn test_params_declared_in_base_used_by_embedded_script() {
    let dir = tempfile::TempDir::new().unwrap();
    write(
        dir.path(),
        "base.yaml",
        "images:\n- location: https://example.com/ubuntu.img\n  arch: x86_64\nparam:\n  user: alice\n",
    );
    write(dir.path(), "setup.sh", "#!/bin/sh\nuseradd \"$PARAM_user\"\n");

    let mut tmpl = Template::new(
        "basedOn: base.yaml\nprovision:\n- mode: system\n  file: setup.sh\n",
        Locator::Path(dir.path().join("tmpl.yaml")),
    );
    embed(&mut tmpl, &ResolveOptions::default()).unwrap();
    tmpl.validate(&linux_validator(), false).unwrap();

    let config = tmpl.config().unwrap();
    assert_eq!(
        config.provision[0].script.as_deref(),
        Some("#!/bin/sh\nuseradd \"$PARAM_user\"\n")
    );
    assert!(config.provision[0].file.is_none());
}

#[test]
fn test_unused_param_rejected_after_merge() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path(), "base.yaml", "images: [{location: ubuntu.img}]\n");

    let mut tmpl = Template::new(
        "basedOn: base.yaml\nparam:\n  name: value\n",
        Locator::Path(dir.path().join("tmpl.yaml")),
    );
    embed(&mut tmpl, &ResolveOptions::default()).unwrap();
    match tmpl.validate(&linux_validator(), false).unwrap_err() {
        Error::Validation(err) => {
            assert_eq!(err.issues.len(), 1);
            assert_eq!(err.issues[0].field, "param");
            assert_eq!(
                err.issues[0].kind,
                ValidationIssueKind::ParamUnused { key: "name".into() }
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_abs_locators_survive_a_move() {
    let origin = tempfile::TempDir::new().unwrap();
    let elsewhere = tempfile::TempDir::new().unwrap();
    write(origin.path(), "base.yaml", "cpus: 4\n");
    write(origin.path(), "scripts/setup.sh", "#!/bin/sh\ntrue\n");

    let mut tmpl = Template::new(
        "basedOn: base.yaml\nprovision:\n- file: scripts/setup.sh\n",
        Locator::Path(origin.path().join("tmpl.yaml")),
    );
    tmpl.use_abs_locators(&ResolveOptions::default()).unwrap();
    let text = String::from_utf8(tmpl.bytes.clone()).unwrap();
    assert!(text.contains(&origin.path().join("base.yaml").display().to_string()));

    let mut moved = Template::new(tmpl.bytes, Locator::Path(elsewhere.path().join("vm.yaml")));
    embed(&mut moved, &ResolveOptions::default()).unwrap();
    let config = moved.decode().unwrap();
    assert_eq!(config.cpus, Some(4));
    assert_eq!(config.provision[0].script.as_deref(), Some("#!/bin/sh\ntrue\n"));
}

#[test]
fn test_template_scheme_uses_template_dir() {
    let dir = tempfile::TempDir::new().unwrap();
    write(
        dir.path(),
        "templates/_images/ubuntu.yaml",
        "images:\n- location: ubuntu.img\n  arch: aarch64\n",
    );

    let mut tmpl = Template::new(
        "basedOn: template://_images/ubuntu\nvmType: vz\n",
        Locator::Path(dir.path().join("vm.yaml")),
    );
    let options = ResolveOptions {
        template_dir: Some(dir.path().join("templates")),
        ..ResolveOptions::default()
    };
    embed(&mut tmpl, &options).unwrap();
    let config = tmpl.decode().unwrap();
    assert_eq!(config.images[0].location, "ubuntu.img");
    assert_eq!(config.vm_type.as_deref(), Some("vz"));

    let mut without_dir = Template::new(
        "basedOn: template://_images/ubuntu\n",
        Locator::Path(dir.path().join("vm.yaml")),
    );
    let err = embed(&mut without_dir, &ResolveOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Locator(LocatorError::NoTemplateDir { .. })
    ));
}

#[test]
fn test_unknown_base_field_is_only_a_warning() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path(), "base.yaml", "futureField: 1\ncpus: 2\n");

    let mut tmpl = Template::new(
        "basedOn: base.yaml\n",
        Locator::Path(dir.path().join("tmpl.yaml")),
    );
    embed(&mut tmpl, &ResolveOptions::default()).unwrap();
    assert_eq!(tmpl.decode().unwrap().cpus, Some(2));
    assert_eq!(tmpl.warning().unwrap().path.to_string(), "futureField");
}

#[test]
fn test_missing_base_is_locator_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut tmpl = Template::new(
        "basedOn: [missing.yaml]\n",
        Locator::Path(dir.path().join("tmpl.yaml")),
    );
    let err = embed(&mut tmpl, &ResolveOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Locator(LocatorError::Read { .. })));
    assert_eq!(tmpl.bytes, b"basedOn: [missing.yaml]\n");
}

#[test]
fn test_cancelled_resolution() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path(), "base.yaml", "cpus: 2\n");

    let cancel = Cancellation::new();
    cancel.cancel();
    let mut tmpl = Template::new(
        "basedOn: base.yaml\n",
        Locator::Path(dir.path().join("tmpl.yaml")),
    );
    let err = tmpl
        .embed(&ResolveOptions::default(), &NativeRuntime, &cancel)
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[test]
fn test_read_from_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path(), "vm.yaml", "vmType: qemu\n");

    let locator = Locator::parse(&dir.path().join("vm.yaml").display().to_string(), None).unwrap();
    let mut tmpl = Template::read(locator, &NativeRuntime, &Cancellation::new()).unwrap();
    assert_eq!(tmpl.decode().unwrap().vm_type.as_deref(), Some("qemu"));
}
