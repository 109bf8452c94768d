//! Render document trees back to YAML text.
//!
//! Block mappings indent by two spaces. A block sequence that is a mapping
//! value sits at the key's own indentation. Trailing comments are always
//! separated from content by two spaces.

use crate::node::{
    CollectionStyle, Comments, Document, Mapping, Node, NodeKind, Scalar, ScalarStyle, Sequence,
};
use crate::scalar::needs_quotes;

pub(crate) fn emit_document(doc: &Document) -> String {
    let mut emitter = Emitter::default();

    if let Some(head) = &doc.head_comment {
        emitter.comment_block(head, 0);
        emitter.lines.push(String::new());
    }

    match &doc.root.kind {
        NodeKind::Mapping(mapping) if mapping.style == CollectionStyle::Block => {
            emitter.mapping_entries(mapping, 0);
        }
        NodeKind::Sequence(sequence)
            if sequence.style == CollectionStyle::Block && !sequence.is_empty() =>
        {
            emitter.sequence_items(sequence, 0);
        }
        _ => emitter.lines.push(inline(&doc.root, false)),
    }

    if let Some(foot) = &doc.foot_comment {
        emitter.comment_block(foot, 0);
    }

    if emitter.lines.is_empty() {
        return String::new();
    }
    let mut out = emitter.lines.join("\n");
    out.push('\n');
    out
}

#[derive(Default)]
struct Emitter {
    lines: Vec<String>,
}

impl Emitter {
    fn comment_block(&mut self, text: &str, indent: usize) {
        for line in text.lines() {
            self.lines.push(format!("{}{}", spaces(indent), line.trim_start()));
        }
    }

    fn head(&mut self, comments: &Comments, indent: usize) {
        if let Some(head) = &comments.head {
            self.comment_block(head, indent);
        }
    }

    fn mapping_entries(&mut self, mapping: &Mapping, indent: usize) {
        for entry in &mapping.entries {
            let value = &entry.value;
            self.head(&value.comments, indent);
            let prefix = format!("{}{}:", spaces(indent), key_text(&entry.key, false));
            match &value.kind {
                NodeKind::Mapping(nested) if is_block(nested.style) && !nested.is_empty() => {
                    self.lines.push(with_line_comment(prefix, &value.comments));
                    self.mapping_entries(nested, indent + 2);
                }
                NodeKind::Sequence(items) if is_block(items.style) && !items.is_empty() => {
                    self.lines.push(with_line_comment(prefix, &value.comments));
                    self.sequence_items(items, indent);
                }
                NodeKind::Scalar(scalar) if block_eligible(scalar) => {
                    self.block_scalar(prefix, scalar, &value.comments, indent + 2);
                }
                _ => self.inline_value(prefix, value),
            }
        }
    }

    fn sequence_items(&mut self, sequence: &Sequence, indent: usize) {
        for item in &sequence.items {
            self.head(&item.comments, indent);
            let dash = format!("{}-", spaces(indent));
            match &item.kind {
                NodeKind::Mapping(mapping) if is_block(mapping.style) && !mapping.is_empty() => {
                    let first_has_head = mapping.entries[0].value.comments.head.is_some();
                    if item.comments.line.is_some() || first_has_head {
                        self.lines.push(with_line_comment(dash, &item.comments));
                        self.mapping_entries(mapping, indent + 2);
                    } else {
                        // Pull the first entry up onto the dash line.
                        let first = self.lines.len();
                        self.mapping_entries(mapping, indent + 2);
                        self.lines[first].replace_range(..indent + 2, &format!("{dash} "));
                    }
                }
                NodeKind::Sequence(nested) if is_block(nested.style) && !nested.is_empty() => {
                    self.lines.push(with_line_comment(dash, &item.comments));
                    self.sequence_items(nested, indent + 2);
                }
                NodeKind::Scalar(scalar) if block_eligible(scalar) => {
                    self.block_scalar(dash, scalar, &item.comments, indent + 2);
                }
                _ => self.inline_value(dash, item),
            }
        }
    }

    fn inline_value(&mut self, prefix: String, node: &Node) {
        let text = inline(node, false);
        let line = if text.is_empty() {
            prefix
        } else {
            format!("{prefix} {text}")
        };
        self.lines.push(with_line_comment(line, &node.comments));
    }

    /// Emit a block scalar; the header goes after `prefix`.
    ///
    /// Content sits two columns right of its parent, so an indentation
    /// indicator, when needed, is always `2`.
    fn block_scalar(&mut self, prefix: String, scalar: &Scalar, comments: &Comments, indent: usize) {
        let value = scalar.value.as_str();
        let (chomp, content) = if !value.ends_with('\n') {
            ("-", value)
        } else if value.ends_with("\n\n") {
            ("+", &value[..value.len() - 1])
        } else {
            ("", &value[..value.len() - 1])
        };
        let indicator = if content.trim_start_matches('\n').starts_with([' ', '\t']) {
            "2"
        } else {
            ""
        };
        let folded = scalar.style == ScalarStyle::Folded
            && chomp != "+"
            && content.split('\n').all(|line| !line.starts_with([' ', '\t']));

        let (style, lines) = if folded {
            ('>', folded_lines(content))
        } else {
            ('|', content.split('\n').collect())
        };
        self.lines.push(with_line_comment(
            format!("{prefix} {style}{indicator}{chomp}"),
            comments,
        ));
        for line in lines {
            if line.is_empty() {
                self.lines.push(String::new());
            } else {
                self.lines.push(format!("{}{}", spaces(indent), line));
            }
        }
    }
}

/// Lines of a folded scalar whose value is `content`.
///
/// Every line break in the value becomes a blank line, so no line is
/// rewrapped.
fn folded_lines(content: &str) -> Vec<&str> {
    let parts: Vec<&str> = content.split('\n').collect();
    let mut lines = Vec::with_capacity(parts.len() * 2);
    for (i, part) in parts.iter().enumerate() {
        lines.push(*part);
        if !part.is_empty() && i + 1 < parts.len() {
            lines.push("");
        }
    }
    lines
}

fn spaces(n: usize) -> String {
    " ".repeat(n)
}

fn is_block(style: CollectionStyle) -> bool {
    style == CollectionStyle::Block
}

fn with_line_comment(mut line: String, comments: &Comments) -> String {
    if let Some(comment) = &comments.line {
        line.push_str("  ");
        line.push_str(comment.trim());
    }
    line
}

/// Whether a scalar can be written as a block scalar.
fn block_eligible(scalar: &Scalar) -> bool {
    if !matches!(scalar.style, ScalarStyle::Literal | ScalarStyle::Folded) {
        return false;
    }
    let value = &scalar.value;
    !value.is_empty()
        && value.contains(|c: char| c != '\n')
        && !value.chars().any(|c| c.is_control() && c != '\n' && c != '\t')
}

fn key_text(key: &str, in_flow: bool) -> String {
    if needs_quotes(key, in_flow) {
        double_quoted(key)
    } else {
        key.to_string()
    }
}

/// Render a node on a single line.
fn inline(node: &Node, in_flow: bool) -> String {
    match &node.kind {
        NodeKind::Scalar(scalar) => inline_scalar(scalar, in_flow),
        NodeKind::Sequence(sequence) => {
            let items: Vec<String> = sequence.iter().map(|item| inline(item, true)).collect();
            format!("[{}]", items.join(", "))
        }
        NodeKind::Mapping(mapping) => {
            let entries: Vec<String> = mapping
                .iter()
                .map(|(key, value)| format!("{}: {}", key_text(key, true), inline(value, true)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

fn inline_scalar(scalar: &Scalar, in_flow: bool) -> String {
    let value = &scalar.value;
    match scalar.style {
        ScalarStyle::Plain if value.is_empty() && in_flow => "null".to_string(),
        ScalarStyle::Plain
            if value.contains('\n') || (in_flow && value.contains([',', '[', ']', '{', '}'])) =>
        {
            double_quoted(value)
        }
        ScalarStyle::Plain => value.clone(),
        ScalarStyle::SingleQuoted if !value.chars().any(char::is_control) => {
            format!("'{}'", value.replace('\'', "''"))
        }
        _ => double_quoted(value),
    }
}

fn double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => {
                let code = c as u32;
                if code <= 0xff {
                    out.push_str(&format!("\\x{code:02x}"));
                } else {
                    out.push_str(&format!("\\u{code:04x}"));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
