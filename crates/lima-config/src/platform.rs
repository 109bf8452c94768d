//! Host platform description and the enumerated configuration values.

use std::fmt;
use std::str::FromStr;

/// Operating system of the machine running the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Linux,
    MacOs,
    Windows,
    Other,
}

/// The host that validation "for the current host" targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPlatform {
    pub os: HostOs,
    /// `None` when the host architecture is not one Lima runs guests for.
    pub arch: Option<Arch>,
}

impl HostPlatform {
    pub fn new(os: HostOs, arch: Arch) -> Self {
        HostPlatform {
            os,
            arch: Some(arch),
        }
    }

    /// Describe the machine this process runs on.
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "linux" => HostOs::Linux,
            "macos" => HostOs::MacOs,
            "windows" => HostOs::Windows,
            _ => HostOs::Other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => Some(Arch::X86_64),
            "aarch64" => Some(Arch::Aarch64),
            "arm" => Some(Arch::Armv7l),
            "powerpc64" => Some(Arch::Ppc64le),
            "riscv64" => Some(Arch::Riscv64),
            "s390x" => Some(Arch::S390x),
            _ => None,
        };
        HostPlatform { os, arch }
    }

    /// The backend used when a template leaves `vmType` unset.
    pub fn default_vm_type(&self) -> VmType {
        match self.os {
            HostOs::MacOs => VmType::Vz,
            _ => VmType::Qemu,
        }
    }

    /// Whether Rosetta can accelerate x86_64 binaries on this host.
    pub fn supports_rosetta(&self) -> bool {
        self.os == HostOs::MacOs && self.arch == Some(Arch::Aarch64)
    }
}

/// Implement `FromStr`, `as_str` and `Display` over a fixed set of names.
macro_rules! named_values {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn names() -> Vec<&'static str> {
                Self::ALL.iter().map(|value| value.as_str()).collect()
            }
        }

        impl FromStr for $name {
            type Err = UnknownValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownValue(s.to_string())),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// A string that names none of the known values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValue(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmType {
    Qemu,
    Vz,
    Wsl2,
}

named_values!(VmType {
    Qemu => "qemu",
    Vz => "vz",
    Wsl2 => "wsl2",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestOs {
    Linux,
    Darwin,
    FreeBsd,
}

named_values!(GuestOs {
    Linux => "Linux",
    Darwin => "Darwin",
    FreeBsd => "FreeBSD",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Aarch64,
    Armv7l,
    Ppc64le,
    Riscv64,
    S390x,
}

named_values!(Arch {
    X86_64 => "x86_64",
    Aarch64 => "aarch64",
    Armv7l => "armv7l",
    Ppc64le => "ppc64le",
    Riscv64 => "riscv64",
    S390x => "s390x",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountType {
    ReverseSshfs,
    NineP,
    Virtiofs,
    Wsl2,
}

named_values!(MountType {
    ReverseSshfs => "reverse-sshfs",
    NineP => "9p",
    Virtiofs => "virtiofs",
    Wsl2 => "wsl2",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionMode {
    System,
    User,
    Boot,
    Dependency,
    Data,
    Yq,
}

named_values!(ProvisionMode {
    System => "system",
    User => "user",
    Boot => "boot",
    Dependency => "dependency",
    Data => "data",
    Yq => "yq",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    Readiness,
}

named_values!(ProbeMode {
    Readiness => "readiness",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proto {
    Tcp,
    Udp,
    Any,
}

named_values!(Proto {
    Tcp => "tcp",
    Udp => "udp",
    Any => "any",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_values_round_trip() {
        for mount_type in MountType::ALL {
            assert_eq!(mount_type.as_str().parse::<MountType>(), Ok(*mount_type));
        }
        assert_eq!("FreeBSD".parse::<GuestOs>(), Ok(GuestOs::FreeBsd));
        assert_eq!(
            "rMountType".parse::<MountType>(),
            Err(UnknownValue("rMountType".into()))
        );
        assert_eq!(VmType::names(), vec!["qemu", "vz", "wsl2"]);
    }

    #[test]
    fn test_default_vm_type() {
        let mac = HostPlatform::new(HostOs::MacOs, Arch::Aarch64);
        let linux = HostPlatform::new(HostOs::Linux, Arch::X86_64);
        assert_eq!(mac.default_vm_type(), VmType::Vz);
        assert_eq!(linux.default_vm_type(), VmType::Qemu);
        assert!(mac.supports_rosetta());
        assert!(!linux.supports_rosetta());
    }
}
