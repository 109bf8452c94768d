//! Recover comments from YAML source text.
//!
//! The event stream carries no comments, so they are found by scanning the
//! source. The scanner must not mistake a `#` inside a quoted scalar or a
//! block scalar body for a comment; the parser tells it where those scalars
//! start.

use std::collections::{BTreeMap, HashMap};

/// Where a multi-line capable scalar starts, as reported by the event stream.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ScalarSpan {
    SingleQuoted,
    DoubleQuoted,
    /// Literal or folded block scalar. Body lines must be indented at least
    /// `min_indent` columns.
    Block { min_indent: usize },
}

/// Comments found in a source text. Lines are 0-based.
#[derive(Debug, Default)]
pub(crate) struct SourceComments {
    /// Comments that occupy a whole line, in source order.
    pub full_line: Vec<(usize, String)>,
    /// Comments that follow other content on their line.
    pub trailing: BTreeMap<usize, String>,
}

/// Scan `chars` for comments.
///
/// `spans` maps the char index of a quoted or block scalar's first character
/// to its kind.
pub(crate) fn scan(chars: &[char], spans: &HashMap<usize, ScalarSpan>) -> SourceComments {
    let mut scanner = Scanner {
        chars,
        pos: 0,
        line: 0,
        line_has_content: false,
        found: SourceComments::default(),
    };
    scanner.run(spans);
    scanner.found
}

struct Scanner<'a> {
    chars: &'a [char],
    pos: usize,
    line: usize,
    line_has_content: bool,
    found: SourceComments,
}

impl Scanner<'_> {
    fn run(&mut self, spans: &HashMap<usize, ScalarSpan>) {
        while self.pos < self.chars.len() {
            if let Some(span) = spans.get(&self.pos) {
                self.line_has_content = true;
                match *span {
                    ScalarSpan::SingleQuoted => self.skip_single_quoted(),
                    ScalarSpan::DoubleQuoted => self.skip_double_quoted(),
                    ScalarSpan::Block { min_indent } => self.skip_block_scalar(min_indent),
                }
                continue;
            }

            let c = self.chars[self.pos];
            if c == '#' && self.at_comment_start() {
                self.take_comment();
                continue;
            }
            if c == '\n' {
                self.newline();
            } else if !c.is_whitespace() {
                self.line_has_content = true;
            }
            self.pos += 1;
        }
    }

    fn at_comment_start(&self) -> bool {
        self.pos == 0 || self.chars[self.pos - 1].is_whitespace()
    }

    fn newline(&mut self) {
        self.line += 1;
        self.line_has_content = false;
    }

    fn end_of_line(&self) -> usize {
        self.chars[self.pos..]
            .iter()
            .position(|&c| c == '\n')
            .map_or(self.chars.len(), |offset| self.pos + offset)
    }

    /// Record the comment at `pos` and move to the end of its line.
    fn take_comment(&mut self) {
        let end = self.end_of_line();
        let text: String = self.chars[self.pos..end].iter().collect();
        let text = text.trim_end().to_string();
        if self.line_has_content {
            self.found.trailing.insert(self.line, text);
        } else {
            self.found.full_line.push((self.line, text));
        }
        self.pos = end;
    }

    fn skip_single_quoted(&mut self) {
        self.pos += 1;
        while self.pos < self.chars.len() {
            match self.chars[self.pos] {
                '\'' if self.chars.get(self.pos + 1) == Some(&'\'') => self.pos += 2,
                '\'' => {
                    self.pos += 1;
                    return;
                }
                '\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn skip_double_quoted(&mut self) {
        self.pos += 1;
        while self.pos < self.chars.len() {
            match self.chars[self.pos] {
                '\\' => {
                    if self.chars.get(self.pos + 1) == Some(&'\n') {
                        self.line += 1;
                    }
                    self.pos += 2;
                }
                '"' => {
                    self.pos += 1;
                    return;
                }
                '\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Skip a block scalar: its header (which may carry a comment) and every
    /// body line. The scanner is left at the newline ending the last body
    /// line.
    fn skip_block_scalar(&mut self, min_indent: usize) {
        while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
            if self.chars[self.pos] == '#' && self.at_comment_start() {
                self.take_comment();
                break;
            }
            self.pos += 1;
        }

        let mut content_indent: Option<usize> = None;
        loop {
            // `pos` is at the newline ending the previous line, or at EOF.
            if self.pos >= self.chars.len() {
                return;
            }
            let start = self.pos + 1;
            let end = self.chars[start..]
                .iter()
                .position(|&c| c == '\n')
                .map_or(self.chars.len(), |offset| start + offset);
            let line = &self.chars[start..end];
            let indent = line.iter().take_while(|&&c| c == ' ').count();
            let blank = line.iter().all(|c| c.is_whitespace());

            let is_body = if blank {
                true
            } else {
                match content_indent {
                    Some(required) => indent >= required,
                    None if indent >= min_indent => {
                        content_indent = Some(indent);
                        true
                    }
                    None => false,
                }
            };
            if !is_body {
                return;
            }
            self.newline();
            self.pos = end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_str(source: &str, spans: &[(usize, ScalarSpan)]) -> SourceComments {
        let chars: Vec<char> = source.chars().collect();
        let spans: HashMap<usize, ScalarSpan> = spans.iter().copied().collect();
        scan(&chars, &spans)
    }

    #[test]
    fn test_full_line_and_trailing() {
        let found = scan_str("# head\nkey: value # tail\n  # indented\n", &[]);
        assert_eq!(
            found.full_line,
            vec![(0, "# head".to_string()), (2, "# indented".to_string())]
        );
        assert_eq!(found.trailing.get(&1).map(String::as_str), Some("# tail"));
    }

    #[test]
    fn test_hash_without_space_is_content() {
        let found = scan_str("url: http://example.com/#anchor\n", &[]);
        assert!(found.full_line.is_empty());
        assert!(found.trailing.is_empty());
    }

    #[test]
    fn test_quoted_scalar_hides_hash() {
        let source = "a: ' # not a comment' # comment\n";
        let found = scan_str(source, &[(3, ScalarSpan::SingleQuoted)]);
        assert_eq!(found.trailing.get(&0).map(String::as_str), Some("# comment"));
    }

    #[test]
    fn test_block_scalar_body_is_skipped() {
        let source = "script: |  # header\n  #!/bin/sh\n  echo # hi\n# after\nnext: 1\n";
        let found = scan_str(source, &[(8, ScalarSpan::Block { min_indent: 1 })]);
        assert_eq!(found.trailing.get(&0).map(String::as_str), Some("# header"));
        assert_eq!(found.full_line, vec![(3, "# after".to_string())]);
    }
}
