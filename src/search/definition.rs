//! Picks the symbol a usage search is about from the cursor position.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefinitionKind {
    Class,
    Function,
    Variable,
}

impl DefinitionKind {
    const PRIORITY: [DefinitionKind; 3] = [
        DefinitionKind::Class,
        DefinitionKind::Function,
        DefinitionKind::Variable,
    ];

    fn regex(self) -> &'static Regex {
        match self {
            DefinitionKind::Class => class_regex(),
            DefinitionKind::Function => function_regex(),
            DefinitionKind::Variable => variable_regex(),
        }
    }
}

fn class_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?class\s+([\w$]+)")
            .expect("valid class definition regex")
    })
}

fn function_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?(?:function\b\s*\*?\s*|def\s+)([\w$]+)",
        )
        .expect("valid function definition regex")
    })
}

fn variable_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:export\s+)?(?:var|let|const)\s+([\w$]+)\s*=")
            .expect("valid variable definition regex")
    })
}

/// Locates class, function and variable definitions in a buffer.
///
/// The symbol at the cursor is, in order of preference:
/// a definition on the cursor line (class, then function, then variable);
/// otherwise per kind in the same order the nearest definition above the
/// cursor, or the first one in the file when the cursor precedes all of them.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymbolLocator;

impl SymbolLocator {
    pub fn new() -> Self {
        Self
    }

    /// Symbol for a cursor on 1-based `line` of `content`
    pub fn find_at(&self, content: &str, line: usize) -> Option<String> {
        let lines: Vec<&str> = content.lines().collect();
        let cursor = line.checked_sub(1)?;

        if let Some(current) = lines.get(cursor) {
            for kind in DefinitionKind::PRIORITY {
                if let Some(name) = Self::definition_on(current, kind) {
                    return Some(name);
                }
            }
        }

        for kind in DefinitionKind::PRIORITY {
            let definitions: Vec<(usize, String)> = lines
                .iter()
                .enumerate()
                .filter_map(|(i, text)| Self::definition_on(text, kind).map(|name| (i, name)))
                .collect();

            let nearest_above = definitions.iter().rev().find(|(i, _)| *i < cursor);
            if let Some((_, name)) = nearest_above.or(definitions.first()) {
                return Some(name.clone());
            }
        }

        None
    }

    fn definition_on(line: &str, kind: DefinitionKind) -> Option<String> {
        kind.regex()
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}
