//! YAML parser that builds comment-annotated document trees.
//!
//! Parsing happens in three passes over the `yaml-rust2` marked event stream:
//!
//! 1. Analyze the events: find every mapping key and sequence item that can
//!    own comments ("anchors"), and every quoted or block scalar that the
//!    comment scanner must step over.
//! 2. Scan the source text for comments and assign each one to an anchor.
//! 3. Build the [`Node`] tree, attaching the assigned comments.

use crate::comments::{self, ScalarSpan, SourceComments};
use crate::node::{
    CollectionStyle, Comments, Document, Mapping, MappingEntry, Node, NodeKind, Scalar,
    ScalarStyle, Sequence,
};
use crate::{Error, Result};
use std::collections::HashMap;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

/// Parse a single document from `source`.
pub(crate) fn parse_document(source: &str) -> Result<Document> {
    let mut parser = Parser::new_from_str(source);
    let mut log = EventLog::default();
    parser.load(&mut log, true)?;

    let chars: Vec<char> = source.chars().collect();
    let lines = LineIndex::new(&chars);

    if let Some((_, marker)) = log
        .events
        .iter()
        .filter(|(event, _)| matches!(event, Event::DocumentStart))
        .nth(1)
    {
        return Err(unsupported("multiple documents", marker, &lines));
    }

    let analysis = analyze(&log.events, &chars, &lines)?;
    let found = comments::scan(&chars, &analysis.spans);
    let mut assigned = assign_comments(&analysis.anchors, found);

    let root = build(&log.events, &chars, &lines, &mut assigned.by_event)?;
    Ok(Document {
        head_comment: join_lines(assigned.doc_head),
        root: root.unwrap_or_else(|| Node::mapping(Mapping::default())),
        foot_comment: join_lines(assigned.doc_foot),
    })
}

/// Records the event stream so it can be walked more than once.
#[derive(Default)]
struct EventLog {
    events: Vec<(Event, Marker)>,
}

impl MarkedEventReceiver for EventLog {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        self.events.push((ev, marker));
    }
}

/// Maps char offsets to 0-based lines and columns.
struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(chars: &[char]) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            chars
                .iter()
                .enumerate()
                .filter(|(_, c)| **c == '\n')
                .map(|(i, _)| i + 1),
        );
        LineIndex { line_starts }
    }

    fn line(&self, index: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= index) - 1
    }

    fn col(&self, index: usize) -> usize {
        index - self.line_starts[self.line(index)]
    }
}

/// A mapping key or sequence item in block context.
struct Anchor {
    event: usize,
    line: usize,
}

struct Analysis {
    anchors: Vec<Anchor>,
    spans: HashMap<usize, ScalarSpan>,
}

enum Frame {
    Sequence { flow: bool, col: usize },
    Mapping { flow: bool, expecting_key: bool, key_col: usize },
}

fn is_node_start(event: &Event) -> bool {
    matches!(
        event,
        Event::Scalar(..) | Event::SequenceStart(..) | Event::MappingStart(..) | Event::Alias(..)
    )
}

fn unsupported(feature: &'static str, marker: &Marker, lines: &LineIndex) -> Error {
    Error::Unsupported {
        feature,
        line: lines.line(marker.index()) + 1,
        column: lines.col(marker.index()) + 1,
    }
}

fn analyze(events: &[(Event, Marker)], chars: &[char], lines: &LineIndex) -> Result<Analysis> {
    let mut anchors = Vec::new();
    let mut spans = HashMap::new();
    let mut stack: Vec<Frame> = Vec::new();

    for (i, (event, marker)) in events.iter().enumerate() {
        let index = marker.index();
        let mut block_min_indent = 0;

        if is_node_start(event) {
            match stack.last_mut() {
                Some(Frame::Mapping {
                    flow: false,
                    expecting_key: true,
                    key_col,
                }) => {
                    if !matches!(event, Event::Scalar(..)) {
                        return Err(unsupported("complex mapping keys", marker, lines));
                    }
                    *key_col = lines.col(index);
                    anchors.push(Anchor {
                        event: i,
                        line: lines.line(index),
                    });
                }
                Some(Frame::Mapping {
                    flow: false,
                    expecting_key: false,
                    key_col,
                }) => block_min_indent = *key_col + 1,
                Some(Frame::Sequence { flow: false, col }) => {
                    block_min_indent = *col + 1;
                    anchors.push(Anchor {
                        event: i,
                        line: lines.line(index),
                    });
                }
                Some(Frame::Mapping {
                    flow: true,
                    expecting_key: true,
                    ..
                }) if !matches!(event, Event::Scalar(..)) => {
                    return Err(unsupported("complex mapping keys", marker, lines));
                }
                _ => {}
            }
        }

        match event {
            Event::Alias(_) => return Err(unsupported("aliases", marker, lines)),
            Event::Scalar(_, style, _, _) => {
                match style {
                    TScalarStyle::SingleQuoted => {
                        spans.insert(index, ScalarSpan::SingleQuoted);
                    }
                    TScalarStyle::DoubleQuoted => {
                        spans.insert(index, ScalarSpan::DoubleQuoted);
                    }
                    TScalarStyle::Literal | TScalarStyle::Folded => {
                        spans.insert(
                            index,
                            ScalarSpan::Block {
                                min_indent: block_min_indent,
                            },
                        );
                    }
                    _ => {}
                }
                node_completed(&mut stack);
            }
            Event::SequenceStart(..) => stack.push(Frame::Sequence {
                flow: chars.get(index) == Some(&'['),
                col: lines.col(index),
            }),
            Event::MappingStart(..) => stack.push(Frame::Mapping {
                flow: chars.get(index) == Some(&'{'),
                expecting_key: true,
                key_col: 0,
            }),
            Event::SequenceEnd | Event::MappingEnd => {
                stack.pop();
                node_completed(&mut stack);
            }
            _ => {}
        }
    }

    Ok(Analysis { anchors, spans })
}

/// A key or value finished; flip the parent mapping's expectation.
fn node_completed(stack: &mut [Frame]) {
    if let Some(Frame::Mapping { expecting_key, .. }) = stack.last_mut() {
        *expecting_key = !*expecting_key;
    }
}

struct AssignedComments {
    by_event: HashMap<usize, Comments>,
    doc_head: Vec<String>,
    doc_foot: Vec<String>,
}

fn assign_comments(anchors: &[Anchor], found: SourceComments) -> AssignedComments {
    let mut by_event: HashMap<usize, Comments> = HashMap::new();
    let mut doc_head = Vec::new();
    let mut doc_foot = Vec::new();

    // Group full-line comments by the first anchor below them.
    let mut groups: HashMap<usize, Vec<(usize, String)>> = HashMap::new();
    for (line, text) in found.full_line {
        let next = anchors.partition_point(|anchor| anchor.line <= line);
        if next == anchors.len() {
            doc_foot.push(text);
        } else {
            groups.entry(next).or_default().push((line, text));
        }
    }

    for (anchor_index, mut group) in groups {
        let anchor = &anchors[anchor_index];
        if anchor_index == 0 {
            // Only the block touching the first node is its head comment;
            // anything above a blank line belongs to the document.
            let mut split = group.len();
            let mut expected_line = anchor.line;
            while split > 0 && group[split - 1].0 + 1 == expected_line {
                split -= 1;
                expected_line = group[split].0;
            }
            doc_head = group.drain(..split).map(|(_, text)| text).collect();
        }
        if group.is_empty() {
            continue;
        }
        let head: Vec<String> = group.into_iter().map(|(_, text)| text).collect();
        by_event.entry(anchor.event).or_default().head = join_lines(head);
    }

    for (line, text) in found.trailing {
        let owner = anchors.partition_point(|anchor| anchor.line <= line);
        if owner == 0 {
            doc_head.push(text);
            continue;
        }
        let comments = by_event.entry(anchors[owner - 1].event).or_default();
        if comments.line.is_none() {
            comments.line = Some(text);
        }
    }

    AssignedComments {
        by_event,
        doc_head,
        doc_foot,
    }
}

fn join_lines(lines: Vec<String>) -> Option<String> {
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

enum BuildFrame {
    Sequence {
        start: usize,
        style: CollectionStyle,
        items: Vec<Node>,
    },
    Mapping {
        start: usize,
        style: CollectionStyle,
        entries: Vec<MappingEntry>,
        key: Option<(String, usize)>,
    },
}

fn build(
    events: &[(Event, Marker)],
    chars: &[char],
    lines: &LineIndex,
    comments: &mut HashMap<usize, Comments>,
) -> Result<Option<Node>> {
    let mut stack: Vec<BuildFrame> = Vec::new();
    let mut root = None;

    for (i, (event, marker)) in events.iter().enumerate() {
        let completed = match event {
            Event::Scalar(value, style, _, _) => {
                let style = match style {
                    TScalarStyle::SingleQuoted => ScalarStyle::SingleQuoted,
                    TScalarStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
                    TScalarStyle::Literal => ScalarStyle::Literal,
                    TScalarStyle::Folded => ScalarStyle::Folded,
                    _ => ScalarStyle::Plain,
                };
                // The event stream reports an empty value as `~`.
                let value = if style == ScalarStyle::Plain
                    && value == "~"
                    && chars.get(marker.index()) != Some(&'~')
                {
                    String::new()
                } else {
                    value.clone()
                };
                Some((Node::scalar(Scalar { value, style }), i))
            }
            Event::SequenceStart(..) => {
                stack.push(BuildFrame::Sequence {
                    start: i,
                    style: collection_style(chars, marker, '['),
                    items: Vec::new(),
                });
                None
            }
            Event::MappingStart(..) => {
                stack.push(BuildFrame::Mapping {
                    start: i,
                    style: collection_style(chars, marker, '{'),
                    entries: Vec::new(),
                    key: None,
                });
                None
            }
            Event::SequenceEnd | Event::MappingEnd => match stack.pop() {
                Some(BuildFrame::Sequence {
                    start,
                    style,
                    items,
                }) => Some((Node::sequence(Sequence::new(items, style)), start)),
                Some(BuildFrame::Mapping {
                    start,
                    style,
                    entries,
                    ..
                }) => Some((Node::mapping(Mapping { entries, style }), start)),
                None => None,
            },
            _ => None,
        };

        let Some((mut node, start)) = completed else {
            continue;
        };
        match stack.last_mut() {
            None => root = Some(node),
            Some(BuildFrame::Sequence { items, .. }) => {
                if let Some(found) = comments.remove(&start) {
                    node.comments = found;
                }
                items.push(node);
            }
            Some(BuildFrame::Mapping { entries, key, .. }) => match key.take() {
                None => {
                    let NodeKind::Scalar(scalar) = node.kind else {
                        return Err(unsupported("complex mapping keys", marker, lines));
                    };
                    *key = Some((scalar.value, start));
                }
                Some((key, key_event)) => {
                    if entries.iter().any(|entry| entry.key == key) {
                        let key_marker = &events[key_event].1;
                        return Err(Error::DuplicateKey {
                            key,
                            line: lines.line(key_marker.index()) + 1,
                        });
                    }
                    if let Some(found) = comments.remove(&key_event) {
                        node.comments = found;
                    }
                    entries.push(MappingEntry { key, value: node });
                }
            },
        }
    }

    Ok(root)
}

fn collection_style(chars: &[char], marker: &Marker, flow_indicator: char) -> CollectionStyle {
    if chars.get(marker.index()) == Some(&flow_indicator) {
        CollectionStyle::Flow
    } else {
        CollectionStyle::Block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Document {
        parse_document(source).unwrap()
    }

    fn root(doc: &Document) -> &Mapping {
        doc.root.as_mapping().unwrap()
    }

    #[test]
    fn test_parse_empty_document() {
        let doc = parse("");
        assert!(root(&doc).is_empty());
        assert!(doc.head_comment.is_none());
        assert!(doc.foot_comment.is_none());
    }

    #[test]
    fn test_comment_only_document_is_foot() {
        let doc = parse("# base0.yaml is ignored\n");
        assert!(root(&doc).is_empty());
        assert_eq!(doc.foot_comment.as_deref(), Some("# base0.yaml is ignored"));
    }

    #[test]
    fn test_head_and_line_comments() {
        let doc = parse("# VM Type is QEMU\nvmType: qemu # QEMU\narch: x86_64\n");
        let vm_type = root(&doc).get("vmType").unwrap();
        assert_eq!(vm_type.comments.head.as_deref(), Some("# VM Type is QEMU"));
        assert_eq!(vm_type.comments.line.as_deref(), Some("# QEMU"));
        assert!(root(&doc).get("arch").unwrap().comments.is_empty());
    }

    #[test]
    fn test_document_head_comment_needs_blank_line() {
        let doc = parse("# Document\n\n# First key\nfirst: 1\n");
        assert_eq!(doc.head_comment.as_deref(), Some("# Document"));
        let first = root(&doc).get("first").unwrap();
        assert_eq!(first.comments.head.as_deref(), Some("# First key"));
    }

    #[test]
    fn test_sequence_item_comments() {
        let doc = parse(
            "additionalDisks: # comment\n# This is disk2\n- name: disk2 # Two\n",
        );
        let disks = root(&doc).get("additionalDisks").unwrap();
        assert_eq!(disks.comments.line.as_deref(), Some("# comment"));

        let item = &disks.as_sequence().unwrap().items[0];
        assert_eq!(item.comments.head.as_deref(), Some("# This is disk2"));
        assert!(item.comments.line.is_none());

        let name = item.as_mapping().unwrap().get("name").unwrap();
        assert_eq!(name.comments.line.as_deref(), Some("# Two"));
    }

    #[test]
    fn test_flow_collections() {
        let doc = parse("dns: [1.1.1.1, 8.8.8.8] # resolvers\nvmOpts: {qemu: {minimumVersion: 8.2.1}}\n");
        let dns = root(&doc).get("dns").unwrap();
        assert_eq!(dns.as_sequence().unwrap().style, CollectionStyle::Flow);
        assert_eq!(dns.comments.line.as_deref(), Some("# resolvers"));

        let vm_opts = root(&doc).get("vmOpts").unwrap().as_mapping().unwrap();
        assert_eq!(vm_opts.style, CollectionStyle::Flow);
        let qemu = vm_opts.get("qemu").unwrap().as_mapping().unwrap();
        assert_eq!(qemu.get("minimumVersion").unwrap().as_str(), Some("8.2.1"));
    }

    #[test]
    fn test_block_scalar_with_hash_lines() {
        let doc = parse("provision:\n- script: |  # inline\n    #!/bin/sh\n    echo hi\n# next\nplain: true\n");
        let item = &root(&doc).get("provision").unwrap().as_sequence().unwrap().items[0];
        let script = item.as_mapping().unwrap().get("script").unwrap();
        assert_eq!(script.as_str(), Some("#!/bin/sh\necho hi\n"));
        assert_eq!(script.as_scalar().unwrap().style, ScalarStyle::Literal);
        assert_eq!(script.comments.line.as_deref(), Some("# inline"));

        let plain = root(&doc).get("plain").unwrap();
        assert_eq!(plain.comments.head.as_deref(), Some("# next"));
    }

    #[test]
    fn test_empty_value_is_null() {
        let doc = parse("mountType:\nvmType: vz\n");
        let mount_type = root(&doc).get("mountType").unwrap();
        assert!(mount_type.is_null());
        assert_eq!(mount_type.as_scalar().unwrap().value, "");
    }

    #[test]
    fn test_quoted_scalars_keep_style() {
        let doc = parse("name: \"*\"\nother: 'x'\n");
        let name = root(&doc).get("name").unwrap().as_scalar().unwrap();
        assert_eq!(name.value, "*");
        assert_eq!(name.style, ScalarStyle::DoubleQuoted);
        let other = root(&doc).get("other").unwrap().as_scalar().unwrap();
        assert_eq!(other.style, ScalarStyle::SingleQuoted);
    }

    #[test]
    fn test_aliases_are_rejected() {
        let err = parse_document("a: &x 1\nb: *x\n").unwrap_err();
        assert!(matches!(err, Error::Unsupported { feature: "aliases", .. }));
    }

    #[test]
    fn test_duplicate_keys_are_rejected() {
        let err = parse_document("a: 1\nb: 2\na: 3\n").unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateKey {
                key: "a".into(),
                line: 3
            }
        );
    }

    #[test]
    fn test_multiple_documents_are_rejected() {
        let err = parse_document("a: b\n---\nc: d\n").unwrap_err();
        assert_eq!(
            err,
            Error::Unsupported {
                feature: "multiple documents",
                line: 2,
                column: 1,
            }
        );
        assert!(parse_document("---\na: b\n...\n").is_ok());
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_document("a: [1, 2\n").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}
