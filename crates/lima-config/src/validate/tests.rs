use super::*;
use crate::decode::load;
use crate::platform::{Arch, HostOs, HostPlatform};

const IMAGES: &str = r#"images: [{"location": "/"}]"#;

fn config(source: &str) -> LimaYaml {
    load(source.as_bytes(), "lima.yaml").unwrap().config
}

fn linux() -> Validator {
    Validator::new().with_host(HostPlatform::new(HostOs::Linux, Arch::X86_64))
}

fn apple_silicon() -> Validator {
    Validator::new().with_host(HostPlatform::new(HostOs::MacOs, Arch::Aarch64))
}

fn messages(result: Result<(), ValidationError>) -> Vec<String> {
    match result {
        Ok(()) => Vec::new(),
        Err(err) => err.issues.iter().map(ToString::to_string).collect(),
    }
}

#[test]
fn test_validate_empty() {
    let err = linux().validate(&config(""), false).unwrap_err();
    assert_eq!(err.to_string(), "field `images` must be set");
}

#[test]
fn test_validate_probes() {
    let valid = format!("probes: [{{\"script\": \"#!foo\"}}]\n{IMAGES}");
    assert!(linux().validate(&config(&valid), false).is_ok());

    let invalid = format!("probes: [{{\"script\": \"foo\"}}]\n{IMAGES}");
    let err = linux().validate(&config(&invalid), false).unwrap_err();
    assert_eq!(
        err.to_string(),
        "field `probes[0].script` must start with a '#!' line"
    );
}

#[test]
fn test_validate_additional_disks() {
    let valid = format!("additionalDisks:\n  - name: \"disk1\"\n  - name: \"disk2\"\n{IMAGES}");
    assert!(linux().validate(&config(&valid), false).is_ok());

    let invalid = format!("additionalDisks:\n  - name: \"\"\n{IMAGES}");
    let err = linux().validate(&config(&invalid), false).unwrap_err();
    assert_eq!(
        err.to_string(),
        "field `additionalDisks[0].name` is invalid: identifier must not be empty"
    );
}

#[test]
fn test_validate_param_name() {
    let provision = r#"provision: [{"script": "echo $PARAM_name $PARAM_NAME $PARAM_Name_123"}]"#;
    for param in [
        r#"param: {"name": "value"}"#,
        r#"param: {"NAME": "value"}"#,
        r#"param: {"Name_123": "value"}"#,
    ] {
        let source = format!("{param}\n{provision}\n{IMAGES}");
        assert!(linux().validate(&config(&source), false).is_ok(), "{param}");
    }

    let provision = r#"provision: [{"script": "echo $PARAM__Name $PARAM_3Name $PARAM_Last.Name"}]"#;
    for param in [
        r#"param: {"_Name": "value"}"#,
        r#"param: {"3Name": "value"}"#,
        r#"param: {"Last.Name": "value"}"#,
    ] {
        let source = format!("{param}\n{provision}\n{IMAGES}");
        let err = linux().validate(&config(&source), false).unwrap_err();
        assert!(err.to_string().contains("name does not match regex"), "{param}");
        assert_eq!(err.issues.len(), 1, "{param}");
    }
}

#[test]
fn test_validate_param_value() {
    let provision = r#"provision: [{"script": "echo $PARAM_name"}]"#;
    for param in [
        r#"param: {"name": ""}"#,
        r#"param: {"name": "foo bar"}"#,
        r#"param: {"name": "foo\tbar"}"#,
        r#"param: {"name": "Symbols ½ and emoji → 👀"}"#,
    ] {
        let source = format!("{param}\n{provision}\n{IMAGES}");
        assert!(linux().validate(&config(&source), false).is_ok(), "{param}");
    }

    for param in [
        r#"param: {"name": "The end.\n"}"#,
        r#"param: {"name": "\r"}"#,
        r#"param: {"name": "zero\u200Bwidth"}"#,
        r#"param: {"name": "\u00A0"}"#,
    ] {
        let source = format!("{param}\n{provision}\n{IMAGES}");
        let err = linux().validate(&config(&source), false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "field `param.name` value contains unprintable character",
            "{param}"
        );
    }
}

#[test]
fn test_validate_param_is_used() {
    let param = "param:\n  name: value";
    let err = validate_params_used(&config(param)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "field `param` key \"name\" is not used in any provision, probe, copyToHost, or portForward"
    );

    for field in [
        r#"mounts: [{"location": "/tmp/{{ .Param.name }}"}]"#,
        r#"mounts: [{"location": "/tmp", mountPoint: "/tmp/{{ .Param.name }}"}]"#,
        r#"provision: [{"script": "echo {{ .Param.name }}"}]"#,
        r#"provision: [{"script": "echo $PARAM_name"}]"#,
        r#"probes: [{"script": "echo {{ .Param.name }}"}]"#,
        r#"probes: [{"script": "echo $PARAM_name"}]"#,
        r#"copyToHost: [{"guest": "/tmp/{{ .Param.name }}", "host": "/tmp"}]"#,
        r#"copyToHost: [{"guest": "/tmp", "host": "/tmp/{{ .Param.name }}"}]"#,
        r#"portForwards: [{"guestSocket": "/tmp/{{ .Param.name }}", "hostSocket": "/tmp"}]"#,
        r#"portForwards: [{"guestSocket": "/tmp", "hostSocket": "/tmp/{{ .Param.name }}"}]"#,
    ] {
        let source = format!("{field}\n{param}");
        assert!(validate_params_used(&config(&source)).is_ok(), "{field}");
    }
}

#[test]
fn test_validate_param_used_in_conditionals() {
    let fields = [
        r#"mounts: [{"location": "/tmp/{{if eq .Param.rootful \"true\"}}rootful{{else}}rootless{{end}}", "mountPoint": "/tmp"}]"#,
        r#"provision: [{"script": "echo {{if eq .Param.rootful \"true\"}}rootful{{else}}rootless{{end}}"}]"#,
        r#"copyToHost: [{"guest": "/tmp", "host": "/tmp/{{if eq .Param.rootful \"true\"}}rootful{{else}}rootless{{end}}"}]"#,
        r#"portForwards: [{"guestSocket": "{{if eq .Param.rootful \"true\"}}/var/run{{else}}/run/user/{{.UID}}{{end}}/docker.sock", "hostSocket": "{{.Dir}}/sock/docker.sock"}]"#,
    ];
    for field in fields {
        let source = format!("{field}\nparam:\n  rootful: true");
        assert!(validate_params_used(&config(&source)).is_ok(), "{field}");
    }

    // Matching is case-exact.
    for field in fields {
        let source = format!("{field}\nparam:\n  rootFul: true");
        let err = validate_params_used(&config(&source)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "field `param` key \"rootFul\" is not used in any provision, probe, copyToHost, or portForward"
        );
    }
}

#[test]
fn test_validate_rosetta() {
    let invalid = format!("rosetta:\n  enabled: true\nvmType: \"qemu\"\n{IMAGES}");
    let err = apple_silicon()
        .validate(&config(&invalid), true)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "field `rosetta.enabled` can only be enabled for VMType \"vz\"; got \"qemu\""
    );

    // Portable validation and hosts without Rosetta skip the rule.
    assert!(apple_silicon().validate(&config(&invalid), false).is_ok());
    assert!(linux().validate(&config(&invalid), true).is_ok());

    let valid = format!("rosetta:\n  enabled: true\nvmType: \"vz\"\n{IMAGES}");
    assert!(apple_silicon().validate(&config(&valid), true).is_ok());

    let disabled = format!("rosetta:\n  enabled: false\nvmType: \"qemu\"\n{IMAGES}");
    assert!(apple_silicon().validate(&config(&disabled), true).is_ok());
}

#[test]
fn test_validate_nested_virtualization() {
    let valid = format!("nestedVirtualization: true\nvmType: vz\n{IMAGES}");
    assert!(linux().validate(&config(&valid), false).is_ok());

    let invalid = format!("nestedVirtualization: true\nvmType: qemu\n{IMAGES}");
    for validator in [linux(), apple_silicon()] {
        let err = validator.validate(&config(&invalid), false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "field `nestedVirtualization` can only be enabled for VMType \"vz\"; got \"qemu\""
        );
    }
}

#[test]
fn test_validate_mount_type() {
    assert!(linux().validate(&config(IMAGES), true).is_ok());

    let unknown = format!("mountType: \"rMountType\"\n{IMAGES}");
    for for_current_host in [true, false] {
        let err = linux()
            .validate(&config(&unknown), for_current_host)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "field `mountType` must be \"reverse-sshfs\" or \"9p\" or \"virtiofs\", or \"wsl2\", got \"rMountType\""
        );
    }

    // An unset vmType means the host default: vz on macOS, qemu elsewhere.
    let virtiofs = format!("mountType: \"virtiofs\"\n{IMAGES}");
    assert!(linux().validate(&config(&virtiofs), true).is_ok());
    assert!(apple_silicon().validate(&config(&virtiofs), true).is_ok());

    let virtiofs_qemu = format!("mountType: \"virtiofs\"\nvmType: \"qemu\"\n{IMAGES}");
    let err = apple_silicon()
        .validate(&config(&virtiofs_qemu), true)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "field `mountType` \"virtiofs\" on macOS requires vmType \"vz\"; got \"qemu\""
    );
    assert!(apple_silicon().validate(&config(&virtiofs_qemu), false).is_ok());
    assert!(linux().validate(&config(&virtiofs_qemu), true).is_ok());

    let wsl2 = format!("mountType: wsl2\n{IMAGES}");
    assert_eq!(
        messages(linux().validate(&config(&wsl2), true)),
        vec!["field `mountType` \"wsl2\" is not supported on Linux"]
    );
    assert!(linux().validate(&config(&wsl2), false).is_ok());
    let windows = Validator::new().with_host(HostPlatform::new(HostOs::Windows, Arch::X86_64));
    assert!(windows.validate(&config(&wsl2), true).is_ok());
}

#[test]
fn test_minimum_version_without_tool_version() {
    let source = format!("minimumLimaVersion: 1.0.2\n{IMAGES}");
    assert!(Validator::new().validate(&config(&source), false).is_ok());
    assert!(linux().validate(&config(&source), false).is_ok());

    let bad = format!("minimumLimaVersion: one\n{IMAGES}");
    let err = Validator::new().validate(&config(&bad), false).unwrap_err();
    assert_eq!(err.issues[0].field, "minimumLimaVersion");
}

#[test]
fn test_validate_minimum_version() {
    let source = format!("minimumLimaVersion: 2.0.0\n{IMAGES}");
    assert!(linux().with_tool_version("2.1.0").validate(&config(&source), false).is_ok());

    let err = linux()
        .with_tool_version("1.0.2")
        .validate(&config(&source), false)
        .unwrap_err();
    assert_eq!(err.issues[0].field, "minimumLimaVersion");
    assert!(matches!(
        err.issues[0].kind,
        ValidationIssueKind::VersionTooNew { .. }
    ));

    let bad = format!("minimumLimaVersion: two\nvmOpts: {{qemu: {{minimumVersion: 8.x}}}}\n{IMAGES}");
    let fields: Vec<String> = linux()
        .validate(&config(&bad), false)
        .unwrap_err()
        .issues
        .into_iter()
        .map(|issue| issue.field)
        .collect();
    assert_eq!(fields, vec!["minimumLimaVersion", "vmOpts.qemu.minimumVersion"]);
}

#[test]
fn test_validate_collects_every_issue() {
    let source = r##"
vmType: firecracker
arch: sparc
cpus: 0
images:
- location: ""
additionalDisks:
- ../escape
mounts:
- location: /tmp
- location: /var
  mountPoint: /tmp
provision:
- mode: data
  script: "#!/bin/sh"
portForwards:
- guestPort: 70000
  hostPortRange: [90, 80]
  proto: sctp
networks:
- lima: shared
  vzNAT: true
  interface: averyveryverylongname
dns:
- not-an-ip
"##;
    let fields: Vec<String> = linux()
        .validate(&config(source), false)
        .unwrap_err()
        .issues
        .into_iter()
        .map(|issue| issue.field)
        .collect();
    assert_eq!(
        fields,
        vec![
            "vmType",
            "arch",
            "images[0].location",
            "cpus",
            "additionalDisks[0].name",
            "mounts[1].mountPoint",
            "provision[0].path",
            "provision[0].content",
            "provision[0]",
            "portForwards[0].guestPort",
            "portForwards[0].hostPortRange",
            "portForwards[0].proto",
            "networks[0]",
            "networks[0].interface",
            "dns[0]",
        ]
    );
}

#[test]
fn test_validate_does_not_mutate() {
    let original = config(&format!("vmType: vz\n{IMAGES}"));
    let copy = original.clone();
    let _ = linux().validate(&original, true);
    assert_eq!(original, copy);
}
