/*
 * resolve.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Depth-first resolution of the `basedOn` graph.
 */

use std::collections::HashSet;

use lima_config::{BaseTemplates, DecodeError, decode_value};
use lima_yaml::Document;
use tracing::debug;

use crate::absolute::rewrite_relative_locators;
use crate::cancellation::Cancellation;
use crate::error::{Error, Result};
use crate::locator::Locator;
use crate::merge::merge_documents;
use crate::runtime::Runtime;
use crate::template::{ResolveOptions, Template};

/// The field naming the templates a template is based on.
pub const BASED_ON: &str = "basedOn";

/// Everything one resolution needs besides the documents.
pub(crate) struct Resolver<'a> {
    pub options: &'a ResolveOptions,
    pub runtime: &'a dyn Runtime,
    pub cancel: &'a Cancellation,
}

impl Resolver<'_> {
    /// Replace `doc`'s bases with their merged content.
    ///
    /// Each base is read and resolved once per call, however many paths lead
    /// to it. The result has no `basedOn` field.
    pub fn resolve(&self, doc: Document, locator: &Locator) -> Result<Document> {
        let locator = locator.to_absolute()?;
        let mut visited = HashSet::new();
        visited.insert(locator.to_string());
        self.resolve_bases(doc, &locator, &mut visited)
    }

    fn resolve_bases(
        &self,
        mut doc: Document,
        locator: &Locator,
        visited: &mut HashSet<String>,
    ) -> Result<Document> {
        let references = take_based_on(&mut doc)?;

        let mut bases: Option<Document> = None;
        for reference in references {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let base_locator = locator
                .resolve(&reference, self.options.template_dir.as_deref())?
                .to_absolute()?;
            if !visited.insert(base_locator.to_string()) {
                debug!(base = %base_locator, "Skipping base that was already merged");
                continue;
            }
            debug!(base = %base_locator, template = %locator, "Merging base template");

            let base = Template::read(base_locator, self.runtime, self.cancel)?;
            let mut base_doc = base.document()?;
            rewrite_relative_locators(&mut base_doc, &base.locator, self.options)?;
            let resolved = self.resolve_bases(base_doc, &base.locator, visited)?;

            // Earlier bases take precedence over later ones.
            bases = Some(match bases {
                Some(acc) => merge_documents(acc, resolved),
                None => resolved,
            });
        }

        Ok(match bases {
            Some(bases) => merge_documents(doc, bases),
            None => doc,
        })
    }
}

/// Remove `basedOn` from `doc` and return its locators.
///
/// A head comment on `basedOn` moves to the entry that takes its place.
fn take_based_on(doc: &mut Document) -> Result<Vec<String>> {
    let Some(root) = doc.root_mapping_mut() else {
        return Ok(Vec::new());
    };
    let Some(index) = root.position(BASED_ON) else {
        return Ok(Vec::new());
    };
    let entry = root.entries.remove(index);

    if let (Some(head), Some(next)) = (entry.value.comments.head.clone(), root.entries.get_mut(index))
    {
        let comments = &mut next.value.comments;
        comments.head = Some(match comments.head.take() {
            Some(own) => format!("{head}\n{own}"),
            None => head,
        });
    }

    if entry.value.is_null() {
        return Ok(Vec::new());
    }
    let bases: BaseTemplates = decode_value(&entry.value)
        .map_err(|err: DecodeError| Error::Decode(err.within_key(BASED_ON)))?;
    Ok(bases.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{RuntimeError, RuntimeResult};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Serves documents from memory and records every read.
    #[derive(Default)]
    struct MemoryRuntime {
        files: HashMap<String, String>,
        reads: RefCell<Vec<String>>,
    }

    impl MemoryRuntime {
        fn with(files: &[(&str, &str)]) -> Self {
            MemoryRuntime {
                files: files
                    .iter()
                    .map(|(name, text)| (name.to_string(), text.to_string()))
                    .collect(),
                reads: RefCell::default(),
            }
        }
    }

    impl Runtime for MemoryRuntime {
        fn read(&self, locator: &Locator, _cancel: &Cancellation) -> RuntimeResult<Vec<u8>> {
            let key = locator.to_string();
            self.reads.borrow_mut().push(key.clone());
            self.files
                .get(&key)
                .map(|text| text.as_bytes().to_vec())
                .ok_or_else(|| RuntimeError::Network(format!("404 Not Found: {key}")))
        }
    }

    fn resolve_with(runtime: &MemoryRuntime, template: &str, locator: &str) -> Result<String> {
        let options = ResolveOptions::default();
        let cancel = Cancellation::new();
        let resolver = Resolver {
            options: &options,
            runtime,
            cancel: &cancel,
        };
        let locator = Locator::parse(locator, None)?;
        let doc = Document::parse(template)?;
        Ok(resolver.resolve(doc, &locator)?.to_yaml_string())
    }

    #[test]
    fn test_depth_first_order() {
        let runtime = MemoryRuntime::with(&[
            (
                "/t/base0.yaml",
                "basedOn: [base1.yaml, base2.yaml]\nadditionalDisks: [disk0]\n",
            ),
            ("/t/base1.yaml", "basedOn: base3.yaml\nadditionalDisks: [disk1]\n"),
            ("/t/base2.yaml", "additionalDisks: [disk2]\n"),
            ("/t/base3.yaml", "additionalDisks: [disk3]\n"),
        ]);
        let out = resolve_with(&runtime, "basedOn: base0.yaml\n", "/t/tmpl.yaml").unwrap();
        assert_eq!(out, "additionalDisks: [disk0, disk1, disk3, disk2]\n");
        assert_eq!(
            *runtime.reads.borrow(),
            vec!["/t/base0.yaml", "/t/base1.yaml", "/t/base3.yaml", "/t/base2.yaml"]
        );
    }

    #[test]
    fn test_shared_base_is_read_once() {
        let runtime = MemoryRuntime::with(&[
            ("/t/a.yaml", "basedOn: common.yaml\ncpus: 2\n"),
            ("/t/b.yaml", "basedOn: [common.yaml, a.yaml]\nmemory: 2GiB\n"),
            ("/t/common.yaml", "basedOn: [b.yaml, tmpl.yaml]\nprovision: [{script: common}]\n"),
        ]);
        let out = resolve_with(&runtime, "basedOn: [a.yaml, b.yaml]\n", "/t/tmpl.yaml").unwrap();
        assert_eq!(
            out,
            "cpus: 2\nprovision: [{script: common}]\nmemory: 2GiB\n"
        );
        assert_eq!(
            *runtime.reads.borrow(),
            vec!["/t/a.yaml", "/t/common.yaml", "/t/b.yaml"]
        );
    }

    #[test]
    fn test_relative_root_is_not_merged_again() {
        let cwd = std::env::current_dir().unwrap();
        let tmpl = cwd.join("tmpl.yaml").display().to_string();
        let base = cwd.join("base0.yaml").display().to_string();
        let base_text = format!("basedOn: {tmpl}\nprovision: [{{script: base}}]\n");
        let runtime = MemoryRuntime::with(&[(base.as_str(), base_text.as_str())]);
        let out = resolve_with(
            &runtime,
            "basedOn: base0.yaml\nprovision: [{script: mine}]\n",
            "tmpl.yaml",
        )
        .unwrap();
        assert_eq!(out.matches("script: mine").count(), 1, "{out}");
        assert_eq!(out.matches("script: base").count(), 1, "{out}");
        assert_eq!(*runtime.reads.borrow(), vec![base.clone()]);
    }

    #[test]
    fn test_based_on_head_comment_moves_down() {
        let runtime = MemoryRuntime::with(&[("/t/base.yaml", "arch: x86_64\n")]);
        let out = resolve_with(
            &runtime,
            "# Start from the base\nbasedOn: base.yaml\nvmType: qemu\n",
            "/t/tmpl.yaml",
        )
        .unwrap();
        assert_eq!(out, "# Start from the base\nvmType: qemu\narch: x86_64\n");
    }

    #[test]
    fn test_remote_bases_use_url_join() {
        let runtime = MemoryRuntime::with(&[
            (
                "https://example.com/templates/docker.yaml",
                "basedOn: _images/ubuntu.yaml\nvmType: vz\n",
            ),
            (
                "https://example.com/templates/_images/ubuntu.yaml",
                "images: [{location: ubuntu.img}]\n",
            ),
        ]);
        let out = resolve_with(
            &runtime,
            "basedOn: https://example.com/templates/docker.yaml\n",
            "/home/me/vm.yaml",
        )
        .unwrap();
        assert_eq!(out, "vmType: vz\nimages: [{location: ubuntu.img}]\n");
    }

    #[test]
    fn test_malformed_based_on_is_decode_error() {
        let runtime = MemoryRuntime::default();
        let err = resolve_with(&runtime, "basedOn: {a: b}\n", "/t/tmpl.yaml").unwrap_err();
        match err {
            Error::Decode(err) => assert_eq!(err.path.to_string(), "basedOn"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_base_propagates() {
        let runtime = MemoryRuntime::default();
        let err = resolve_with(&runtime, "basedOn: gone.yaml\n", "/t/tmpl.yaml").unwrap_err();
        assert!(matches!(err, Error::Locator(_)));
        assert!(err.to_string().contains("/t/gone.yaml"));
    }

    #[test]
    fn test_cancelled_before_first_base() {
        let runtime = MemoryRuntime::with(&[("/t/base.yaml", "cpus: 1\n")]);
        let options = ResolveOptions::default();
        let cancel = Cancellation::new();
        cancel.cancel();
        let resolver = Resolver {
            options: &options,
            runtime: &runtime,
            cancel: &cancel,
        };
        let doc = Document::parse("basedOn: base.yaml\n").unwrap();
        let err = resolver
            .resolve(doc, &Locator::parse("/t/tmpl.yaml", None).unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(runtime.reads.borrow().is_empty());
    }
}
