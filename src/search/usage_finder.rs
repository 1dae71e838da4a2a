//! Usage finding via identifier matching.
//!
//! Finds whole-word occurrences of a symbol in code lines and drops the ones
//! that are definitions, string contents or trailing comments. Matching is
//! purely textual: there is no notion of scope or shadowing.

use crate::indexer::{LineContext, LineScanner};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Words that turn the following identifier into a definition
const DEFINING_KEYWORDS: &[&str] = &["class", "function", "def", "var", "let", "const"];

/// Operators that modify the identifier in front of them
const WRITE_OPERATORS: &[&str] = &[
    "+=", "-=", "*=", "/=", "%=", "**=", "&&=", "||=", "??=", "?=", "|=", "&=", "^=", "<<=",
    ">>=", "++", "--",
];

/// How a usage refers to the symbol, inferred from the surrounding text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    Call,
    Instantiation,
    Inheritance,
    TypeReference,
    Write,
    Read,
}

/// One usage inside a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    /// 1-based
    pub line: usize,
    /// 0-based byte offset into the line
    pub column: usize,
    pub line_text: String,
    pub kind: UsageKind,
}

/// True for characters that can be part of an identifier
pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || (!c.is_ascii() && c.is_alphanumeric())
}

/// Finds usages of a single symbol.
#[derive(Debug, Clone)]
pub struct UsageFinder {
    symbol: String,
}

impl UsageFinder {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// All usages in `content`, in line then column order
    pub fn find_in(&self, content: &str) -> Vec<Occurrence> {
        if self.symbol.is_empty() || !content.contains(self.symbol.as_str()) {
            return Vec::new();
        }

        let mut occurrences = Vec::new();
        for line in LineScanner::new(content) {
            if line.context != LineContext::Code || !line.text.contains(self.symbol.as_str()) {
                continue;
            }
            for (column, kind) in self.find_in_line(line.text) {
                occurrences.push(Occurrence {
                    line: line.number,
                    column,
                    line_text: line.text.to_string(),
                    kind,
                });
            }
        }
        occurrences
    }

    /// Usages in a single code line as `(byte offset, kind)` pairs
    pub fn find_in_line(&self, line: &str) -> Vec<(usize, UsageKind)> {
        if self.symbol.is_empty() {
            return Vec::new();
        }

        let layout = LineLayout::scan(line);
        line.match_indices(self.symbol.as_str())
            .map(|(start, _)| start)
            .filter(|&start| self.is_whole_word(line, start))
            .filter(|&start| layout.is_code(start))
            .filter(|&start| !self.is_definition_site(line, start))
            .map(|start| (start, self.classify(line, start)))
            .collect()
    }

    fn is_whole_word(&self, line: &str, start: usize) -> bool {
        let end = start + self.symbol.len();
        let before_ok = line[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !is_identifier_char(c));
        let after_ok = line[end..]
            .chars()
            .next()
            .is_none_or(|c| !is_identifier_char(c));
        before_ok && after_ok
    }

    /// Occurrences introduced by a defining keyword, assigned to, or used as
    /// an object key
    fn is_definition_site(&self, line: &str, start: usize) -> bool {
        let before = line[..start].trim_end_matches(|c: char| c.is_whitespace() || c == '*');
        if let Some(word) = trailing_word(before)
            && DEFINING_KEYWORDS.contains(&word)
        {
            return true;
        }

        let after = line[start + self.symbol.len()..].trim_start();
        if let Some(rest) = after.strip_prefix('=') {
            return !rest.starts_with('=') && !rest.starts_with('>');
        }
        if let Some(rest) = after.strip_prefix(':') {
            return !rest.starts_with(':');
        }
        false
    }

    fn classify(&self, line: &str, start: usize) -> UsageKind {
        let before = line[..start].trim_end();
        let after = line[start + self.symbol.len()..].trim_start();

        match trailing_word(before) {
            Some("new") => return UsageKind::Instantiation,
            Some("extends" | "implements") => return UsageKind::Inheritance,
            Some("instanceof" | "as") => return UsageKind::TypeReference,
            _ => {}
        }

        if after.starts_with('(') {
            return UsageKind::Call;
        }

        if WRITE_OPERATORS.iter().any(|op| after.starts_with(op))
            || before.ends_with("++")
            || before.ends_with("--")
        {
            return UsageKind::Write;
        }

        if (before.ends_with(':') && !before.ends_with("::")) || before.ends_with('<') {
            return UsageKind::TypeReference;
        }

        UsageKind::Read
    }
}

/// The identifier immediately at the end of `text`, if any
fn trailing_word(text: &str) -> Option<&str> {
    let start = text
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_identifier_char(*c))
        .last()
        .map(|(i, _)| i)?;
    Some(&text[start..])
}

/// Byte ranges of a line that are not code: string literals and a trailing
/// `//` comment.
#[derive(Debug, Default)]
struct LineLayout {
    strings: Vec<Range<usize>>,
    comment_start: Option<usize>,
}

impl LineLayout {
    fn scan(line: &str) -> Self {
        let mut layout = LineLayout::default();
        let bytes = line.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    layout.comment_start = Some(i);
                    break;
                }
                quote @ (b'\'' | b'"' | b'`') => {
                    let start = i;
                    i += 1;
                    let mut segment_start = start;
                    while i < bytes.len() && bytes[i] != quote {
                        if bytes[i] == b'\\' {
                            i += 2;
                            continue;
                        }
                        // `${...}` inside a template literal is code again
                        if quote == b'`' && bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
                            layout.strings.push(segment_start..i);
                            i = skip_interpolation(bytes, i + 2);
                            segment_start = i;
                            continue;
                        }
                        i += 1;
                    }
                    let end = i.min(bytes.len());
                    layout.strings.push(segment_start..end);
                    i = end + 1;
                }
                _ => i += 1,
            }
        }
        layout
    }

    fn is_code(&self, offset: usize) -> bool {
        if self.comment_start.is_some_and(|c| offset >= c) {
            return false;
        }
        !self.strings.iter().any(|range| range.contains(&offset))
    }
}

/// Index just past the `}` closing an interpolation that starts at `i`
fn skip_interpolation(bytes: &[u8], mut i: usize) -> usize {
    let mut depth = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(symbol: &str, line: &str) -> Vec<UsageKind> {
        UsageFinder::new(symbol)
            .find_in_line(line)
            .into_iter()
            .map(|(_, kind)| kind)
            .collect()
    }

    fn columns(symbol: &str, line: &str) -> Vec<usize> {
        UsageFinder::new(symbol)
            .find_in_line(line)
            .into_iter()
            .map(|(column, _)| column)
            .collect()
    }

    #[test]
    fn test_word_boundaries() {
        assert_eq!(columns("Foo", "x = new Foo()"), vec![8]);
        assert!(columns("Foo", "x = FooBar").is_empty());
        assert!(columns("Foo", "x = barFoo").is_empty());
        assert!(columns("Foo", "x = $Foo + Foo_").is_empty());
        assert!(columns("Foo", "x = éFoo").is_empty());
        assert_eq!(columns("Foo", "Foo.bar(Foo)"), vec![0, 8]);
    }

    #[test]
    fn test_skips_definition_sites() {
        assert!(columns("Foo", "class Foo extends Bar").is_empty());
        assert!(columns("Foo", "export default class Foo {").is_empty());
        assert!(columns("foo", "function foo() {").is_empty());
        assert!(columns("foo", "function* foo() {").is_empty());
        assert!(columns("foo", "def foo(x):").is_empty());
        assert!(columns("foo", "const foo = 1").is_empty());
        assert!(columns("foo", "let   foo").is_empty());
        assert!(columns("foo", "foo = 2").is_empty());
        assert!(columns("foo", "{ foo: 1 }").is_empty());
    }

    #[test]
    fn test_comparisons_and_arrows_are_usages() {
        assert_eq!(kinds("foo", "if (foo == 1)"), vec![UsageKind::Read]);
        assert_eq!(kinds("foo", "foo => foo + 1").len(), 2);
        assert_eq!(kinds("Foo", "Foo::bar()"), vec![UsageKind::Read]);
    }

    #[test]
    fn test_skips_strings_and_trailing_comments() {
        assert!(columns("Foo", r#"log("Foo is here")"#).is_empty());
        assert!(columns("Foo", r#"log('it\'s Foo')"#).is_empty());
        assert!(columns("Foo", "bar() // calls Foo").is_empty());
        assert_eq!(columns("Foo", r#"log("a", Foo)"#), vec![9]);
        assert_eq!(columns("Foo", "url = 'http://x'; Foo()"), vec![18]);
    }

    #[test]
    fn test_template_interpolation_is_code() {
        assert_eq!(columns("Foo", "s = `Foo ${Foo.name}`"), vec![11]);
        assert!(columns("Foo", "s = `only Foo`").is_empty());
    }

    #[test]
    fn test_usage_kinds() {
        assert_eq!(kinds("Person", "p = new Person()"), vec![UsageKind::Instantiation]);
        assert_eq!(kinds("Base", "class A extends Base"), vec![UsageKind::Inheritance]);
        assert_eq!(kinds("greet", "greet('World')"), vec![UsageKind::Call]);
        assert_eq!(kinds("count", "count += 1"), vec![UsageKind::Write]);
        assert_eq!(kinds("count", "++count"), vec![UsageKind::Write]);
        assert_eq!(kinds("Foo", "x instanceof Foo"), vec![UsageKind::TypeReference]);
        assert_eq!(kinds("Foo", "f(x: Foo)"), vec![UsageKind::TypeReference]);
        assert_eq!(kinds("Foo", "return Foo"), vec![UsageKind::Read]);
    }

    #[test]
    fn test_find_in_skips_comment_and_import_lines() {
        let content = "\
import Foo from './foo'
// Foo in a comment
/*
 Foo
*/
const a = new Foo()
Foo.run()
";
        let found = UsageFinder::new("Foo").find_in(content);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].line, 6);
        assert_eq!(found[0].column, 14);
        assert_eq!(found[0].line_text, "const a = new Foo()");
        assert_eq!(found[0].kind, UsageKind::Instantiation);
        assert_eq!(found[1].line, 7);
        assert_eq!(found[1].kind, UsageKind::Read);
    }

    #[test]
    fn test_multiple_usages_on_one_line() {
        let found = UsageFinder::new("greet").find_in("greet(a); greet(b); greet(c)\n");
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|o| o.kind == UsageKind::Call));
    }

    #[test]
    fn test_empty_symbol_finds_nothing() {
        assert!(UsageFinder::new("").find_in("anything").is_empty());
        assert!(UsageFinder::new("").find_in_line("anything").is_empty());
    }
}
