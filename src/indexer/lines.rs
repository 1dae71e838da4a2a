//! Line classification shared by import extraction and usage scanning.
//!
//! A small state machine tags every line as code, comment or import. It tracks
//! block comments and import statements that span several lines, e.g.
//!
//! ```text
//! import {
//!   a,
//!   b
//! } from "./x"
//! ```
//!
//! Matching is textual and permissive; a line that merely looks like an import
//! is treated as one.

use regex::Regex;
use std::sync::OnceLock;

/// Import blocks that never close are force-closed after this many lines
pub const MAX_IMPORT_BLOCK_LINES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineContext {
    Code,
    Comment,
    Import,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedLine<'a> {
    /// 1-based
    pub number: usize,
    /// Raw line text without the line terminator
    pub text: &'a str,
    pub context: LineContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockComment {
    CStyle,
    Coffee,
}

impl BlockComment {
    fn terminator(self) -> &'static str {
        match self {
            BlockComment::CStyle => "*/",
            BlockComment::Coffee => "###",
        }
    }
}

fn single_line_import() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?:^|[^\w$.])(?:(?:import|require|include)[\s('"`{*][^'"`]*['"`][^'"`\n]+['"`]|export\b[^'"`]*\bfrom\s*['"`][^'"`\n]+['"`])"#,
        )
        .expect("valid single line import regex")
    })
}

fn multi_line_import_start() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?:^|[^\w$.])(?:import|require|include)\b[\s()\[\]{}]*$|^import\b[^'"`;=]*[{,]$|^export\s*(?:type\s+)?\{[^}'"`]*$"#,
        )
        .expect("valid multi line import start regex")
    })
}

/// Iterator over the classified lines of a file.
pub struct LineScanner<'a> {
    lines: std::str::Lines<'a>,
    number: usize,
    block_comment: Option<BlockComment>,
    /// Lines consumed by the currently open import block
    import_block: Option<usize>,
}

impl<'a> LineScanner<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            lines: content.lines(),
            number: 0,
            block_comment: None,
            import_block: None,
        }
    }

    fn classify(&mut self, raw: &str) -> LineContext {
        let line = raw.trim_matches(|c: char| c.is_whitespace() || c == ';');

        if let Some(block) = self.block_comment {
            if line.contains(block.terminator()) {
                self.block_comment = None;
            }
            return LineContext::Comment;
        }

        if let Some(context) = self.classify_comment(line) {
            return context;
        }

        if let Some(consumed) = self.import_block {
            if line.starts_with([')', '}', ']']) || consumed + 1 >= MAX_IMPORT_BLOCK_LINES {
                if consumed + 1 >= MAX_IMPORT_BLOCK_LINES {
                    tracing::debug!(
                        "Import block open for {} lines, closing it",
                        MAX_IMPORT_BLOCK_LINES
                    );
                }
                self.import_block = None;
            } else {
                self.import_block = Some(consumed + 1);
            }
            return LineContext::Import;
        }

        if single_line_import().is_match(line) {
            return LineContext::Import;
        }

        if multi_line_import_start().is_match(line) {
            self.import_block = Some(0);
            return LineContext::Import;
        }

        LineContext::Code
    }

    fn classify_comment(&mut self, line: &str) -> Option<LineContext> {
        if line.starts_with("//") {
            return Some(LineContext::Comment);
        }

        if let Some(rest) = line.strip_prefix("###") {
            if !rest.starts_with('#') {
                if !rest.contains("###") {
                    self.block_comment = Some(BlockComment::Coffee);
                }
                return Some(LineContext::Comment);
            }
        }

        if line.starts_with('#') {
            // C-style includes are imports, not comments
            if line.starts_with("#include") || line.starts_with("#import") {
                return None;
            }
            return Some(LineContext::Comment);
        }

        if let Some(rest) = line.strip_prefix("/*") {
            if !rest.contains("*/") {
                self.block_comment = Some(BlockComment::CStyle);
            }
            return Some(LineContext::Comment);
        }

        None
    }
}

impl<'a> Iterator for LineScanner<'a> {
    type Item = ScannedLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.lines.next()?;
        self.number += 1;
        let context = self.classify(text);
        Some(ScannedLine {
            number: self.number,
            text,
            context,
        })
    }
}
