/*
 * absolute.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Rewrite relative locators inside a template so it can be moved.
 */

use lima_config::DecodeError;
use lima_yaml::{Document, Node, NodeKind};

use crate::error::Result;
use crate::locator::{Locator, is_relative_reference};
use crate::resolve::BASED_ON;
use crate::template::ResolveOptions;

/// Fields whose entries may reference a script `file`.
pub(crate) const SCRIPT_LISTS: [&str; 2] = ["provision", "probes"];

/// Make every relative `basedOn` entry and script `file` in `doc` absolute.
///
/// References are resolved against `locator`, the template's own location.
/// Absolute paths and URLs are left alone.
pub(crate) fn rewrite_relative_locators(
    doc: &mut Document,
    locator: &Locator,
    options: &ResolveOptions,
) -> Result<()> {
    let base = locator.to_absolute()?;
    let Some(root) = doc.root_mapping_mut() else {
        return Ok(());
    };

    if let Some(based_on) = root.get_mut(BASED_ON) {
        match &mut based_on.kind {
            NodeKind::Scalar(_) => rewrite(based_on, &base, options)?,
            NodeKind::Sequence(sequence) => {
                for item in &mut sequence.items {
                    rewrite(item, &base, options)?;
                }
            }
            NodeKind::Mapping(_) => {
                return Err(DecodeError::new(
                    "invalid type: map, expected a locator string or a list of locator strings",
                )
                .within_key(BASED_ON)
                .into());
            }
        }
    }

    for field in SCRIPT_LISTS {
        let Some(items) = root.get_mut(field).and_then(Node::as_sequence_mut) else {
            continue;
        };
        for item in &mut items.items {
            let Some(file) = item.as_mapping_mut().and_then(|entry| entry.get_mut("file")) else {
                continue;
            };
            match file.as_mapping_mut() {
                Some(reference) => {
                    if let Some(url) = reference.get_mut("url") {
                        rewrite(url, &base, options)?;
                    }
                }
                None => rewrite(file, &base, options)?,
            }
        }
    }
    Ok(())
}

fn rewrite(node: &mut Node, base: &Locator, options: &ResolveOptions) -> Result<()> {
    let Some(reference) = node.as_str().filter(|text| is_relative_reference(text)) else {
        return Ok(());
    };
    let absolute = base.resolve(reference, options.template_dir.as_deref())?;
    let comments = std::mem::take(&mut node.comments);
    *node = Node::string(absolute.to_string()).with_comments(comments);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewritten(text: &str, locator: &str) -> String {
        let mut doc = Document::parse(text).unwrap();
        let locator = Locator::parse(locator, None).unwrap();
        rewrite_relative_locators(&mut doc, &locator, &ResolveOptions::default()).unwrap();
        doc.to_yaml_string()
    }

    #[test]
    fn test_based_on_and_scripts() {
        let text = r#"basedOn:
- base.yaml  # local
- /abs/other.yaml
- template://docker
provision:
- file: scripts/setup.sh
- file:
    url: ../check.sh
    digest: sha256:abc
- script: echo inline
probes:
- file: https://example.com/probe.sh
"#;
        insta::assert_snapshot!(rewritten(text, "/home/me/lima/vm.yaml"), @r"
        basedOn:
        - /home/me/lima/base.yaml  # local
        - /abs/other.yaml
        - template://docker
        provision:
        - file: /home/me/lima/scripts/setup.sh
        - file:
            url: /home/me/check.sh
            digest: sha256:abc
        - script: echo inline
        probes:
        - file: https://example.com/probe.sh
        ");
    }

    #[test]
    fn test_single_based_on_in_remote_template() {
        assert_eq!(
            rewritten(
                "basedOn: _images/ubuntu.yaml\n",
                "https://example.com/templates/docker.yaml"
            ),
            "basedOn: https://example.com/templates/_images/ubuntu.yaml\n"
        );
    }

    #[test]
    fn test_relative_template_becomes_absolute() {
        let out = rewritten("basedOn: base.yaml\n", "tmpl.yaml");
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            out,
            format!("basedOn: {}\n", cwd.join("base.yaml").display())
        );
    }

    #[test]
    fn test_map_based_on_rejected() {
        let mut doc = Document::parse("basedOn: {url: x}\n").unwrap();
        let locator = Locator::parse("/t/tmpl.yaml", None).unwrap();
        let err =
            rewrite_relative_locators(&mut doc, &locator, &ResolveOptions::default()).unwrap_err();
        assert!(err.to_string().starts_with("field `basedOn`"));
    }
}
