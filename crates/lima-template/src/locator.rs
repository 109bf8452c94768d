/*
 * locator.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Where a template or script lives, and how references inside it resolve.
 */

//! Template locators.
//!
//! A locator is either a filesystem path or a remote URL. References found
//! inside a template (`basedOn` entries, script `file`s) are resolved against
//! the locator of the template that contains them.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::LocatorError;

/// A canonical template or script location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// Local file, from a plain path, a `file://` URL or `template://NAME`.
    Path(PathBuf),
    /// Remote `http://` or `https://` resource.
    Url(Url),
}

impl Locator {
    /// Parse a locator given by the user, such as a command line argument.
    ///
    /// `template_dir` is where `template://NAME` locators point.
    pub fn parse(text: &str, template_dir: Option<&Path>) -> Result<Locator, LocatorError> {
        match scheme_of(text) {
            Some(_) => parse_url(text, template_dir),
            None => Ok(Locator::Path(normalize(Path::new(text)))),
        }
    }

    /// Resolve `reference`, found inside the template at `self`.
    ///
    /// Relative paths join onto this template's directory (a URL join for
    /// remote templates). A remote template may not name a local absolute
    /// path.
    pub fn resolve(
        &self,
        reference: &str,
        template_dir: Option<&Path>,
    ) -> Result<Locator, LocatorError> {
        if scheme_of(reference).is_some() {
            return parse_url(reference, template_dir);
        }
        match self {
            Locator::Path(base) => {
                let path = Path::new(reference);
                if path.is_absolute() {
                    return Ok(Locator::Path(normalize(path)));
                }
                let dir = base.parent().unwrap_or_else(|| Path::new(""));
                Ok(Locator::Path(normalize(&dir.join(path))))
            }
            Locator::Url(base) => {
                if Path::new(reference).is_absolute() || reference.starts_with('/') {
                    return Err(LocatorError::AbsolutePathInRemote {
                        reference: reference.to_string(),
                        base: base.to_string(),
                    });
                }
                base.join(reference)
                    .map(Locator::Url)
                    .map_err(|source| LocatorError::Join {
                        reference: reference.to_string(),
                        base: base.to_string(),
                        source,
                    })
            }
        }
    }

    /// The same locator with a relative path made absolute against the
    /// current directory.
    pub fn to_absolute(&self) -> Result<Locator, LocatorError> {
        match self {
            Locator::Path(path) if !path.is_absolute() => std::path::absolute(path)
                .map(|absolute| Locator::Path(normalize(&absolute)))
                .map_err(|source| LocatorError::Absolute {
                    path: path.clone(),
                    source,
                }),
            other => Ok(other.clone()),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Locator::Url(_))
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Locator::Path(path) => Some(path),
            Locator::Url(_) => None,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Path(path) => write!(f, "{}", path.display()),
            Locator::Url(url) => f.write_str(url.as_str()),
        }
    }
}

/// Whether a reference is written relative to its template.
///
/// Only such references change when a template is moved.
pub fn is_relative_reference(reference: &str) -> bool {
    scheme_of(reference).is_none() && !Path::new(reference).is_absolute()
}

/// The scheme of `text` if it looks like `scheme://...`.
fn scheme_of(text: &str) -> Option<&str> {
    let (scheme, _) = text.split_once("://")?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        // A single letter is a Windows drive, not a scheme.
        && scheme.len() > 1;
    valid.then_some(scheme)
}

fn parse_url(text: &str, template_dir: Option<&Path>) -> Result<Locator, LocatorError> {
    if let Some(name) = text.strip_prefix("template://") {
        return template_path(text, name, template_dir);
    }
    let url = Url::parse(text).map_err(|source| LocatorError::InvalidUrl {
        locator: text.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(Locator::Url(url)),
        "file" => url
            .to_file_path()
            .map(|path| Locator::Path(normalize(&path)))
            .map_err(|()| LocatorError::InvalidFileUrl {
                locator: text.to_string(),
            }),
        scheme => Err(LocatorError::UnsupportedScheme {
            locator: text.to_string(),
            scheme: scheme.to_string(),
        }),
    }
}

/// `template://NAME` is `NAME.yaml` inside the template directory.
fn template_path(
    text: &str,
    name: &str,
    template_dir: Option<&Path>,
) -> Result<Locator, LocatorError> {
    let dir = template_dir.ok_or_else(|| LocatorError::NoTemplateDir {
        locator: text.to_string(),
    })?;
    if name.is_empty() || Path::new(name).is_absolute() {
        return Err(LocatorError::InvalidTemplateName {
            locator: text.to_string(),
        });
    }
    let file = if name.ends_with(".yaml") {
        name.to_string()
    } else {
        format!("{name}.yaml")
    };
    Ok(Locator::Path(normalize(&dir.join(file))))
}

/// Lexically remove `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(text: &str) -> Locator {
        Locator::Path(PathBuf::from(text))
    }

    #[test]
    fn test_relative_reference_joins_template_dir() {
        let tmpl = path("/templates/default.yaml");
        assert_eq!(
            tmpl.resolve("base.yaml", None).unwrap(),
            path("/templates/base.yaml")
        );
        assert_eq!(
            tmpl.resolve("../common/./base.yaml", None).unwrap(),
            path("/common/base.yaml")
        );
        assert_eq!(
            tmpl.resolve("/etc/lima/base.yaml", None).unwrap(),
            path("/etc/lima/base.yaml")
        );
    }

    #[test]
    fn test_bare_file_name_template() {
        let tmpl = path("tmpl.yaml");
        assert_eq!(tmpl.resolve("base0.yaml", None).unwrap(), path("base0.yaml"));
        assert_eq!(
            path("a/b.yaml").resolve("../../c.yaml", None).unwrap(),
            path("../c.yaml")
        );
    }

    #[test]
    fn test_remote_reference_uses_url_join() {
        let tmpl = Locator::parse("https://example.com/lima/templates/docker.yaml", None).unwrap();
        let base = tmpl.resolve("_images/ubuntu.yaml", None).unwrap();
        assert_eq!(
            base.to_string(),
            "https://example.com/lima/templates/_images/ubuntu.yaml"
        );
        assert!(base.is_remote());
    }

    #[test]
    fn test_remote_template_cannot_name_local_path() {
        let tmpl = Locator::parse("https://example.com/docker.yaml", None).unwrap();
        let err = tmpl.resolve("/etc/passwd", None).unwrap_err();
        assert!(matches!(err, LocatorError::AbsolutePathInRemote { .. }));
    }

    #[test]
    fn test_file_url_and_template_scheme() {
        assert_eq!(
            Locator::parse("file:///tmp/lima/base.yaml", None).unwrap(),
            path("/tmp/lima/base.yaml")
        );

        let dir = Path::new("/usr/share/lima/templates");
        assert_eq!(
            Locator::parse("template://docker", Some(dir)).unwrap(),
            path("/usr/share/lima/templates/docker.yaml")
        );
        assert_eq!(
            path("/home/me/vm.yaml")
                .resolve("template://_images/ubuntu.yaml", Some(dir))
                .unwrap(),
            path("/usr/share/lima/templates/_images/ubuntu.yaml")
        );
        assert!(matches!(
            Locator::parse("template://docker", None),
            Err(LocatorError::NoTemplateDir { .. })
        ));
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = Locator::parse("ftp://example.com/base.yaml", None).unwrap_err();
        assert!(matches!(err, LocatorError::UnsupportedScheme { ref scheme, .. } if scheme == "ftp"));
    }

    #[test]
    fn test_is_relative_reference() {
        assert!(is_relative_reference("base.yaml"));
        assert!(is_relative_reference("../scripts/setup.sh"));
        assert!(!is_relative_reference("/abs/base.yaml"));
        assert!(!is_relative_reference("template://docker"));
        assert!(!is_relative_reference("https://example.com/a.yaml"));
    }
}
