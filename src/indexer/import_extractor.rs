//! Loose import specifier extraction.
//!
//! No parser is involved: import lines are found by [`LineScanner`] and the
//! specifier strings are pulled out with permissive patterns. Anything that
//! looks like a path is returned; resolution drops what does not exist.

use super::lines::{LineContext, LineScanner};
use regex::Regex;
use std::sync::OnceLock;

fn keyword_specifier() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\b(?:from|import|require|include)\s*\(?\s*['"`]([^'"`\n]+)['"`]"#)
            .expect("valid keyword specifier regex")
    })
}

fn quoted_string() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"['"`]([^'"`\n]+)['"`]"#).expect("valid quoted string regex"))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImportExtractor;

impl ImportExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Raw specifiers in order of first appearance. Duplicates are kept.
    pub fn extract(&self, content: &str) -> Vec<String> {
        let mut specifiers = Vec::new();

        for line in LineScanner::new(content) {
            if line.context != LineContext::Import {
                continue;
            }

            let before = specifiers.len();
            for caps in keyword_specifier().captures_iter(line.text) {
                push_specifier(&mut specifiers, &caps[1]);
            }

            // Block bodies (`'./a',`) and oddly shaped lines carry no keyword
            // next to the string; take every quoted string instead
            if specifiers.len() == before {
                for caps in quoted_string().captures_iter(line.text) {
                    push_specifier(&mut specifiers, &caps[1]);
                }
            }
        }

        specifiers
    }
}

fn push_specifier(specifiers: &mut Vec<String>, raw: &str) {
    let specifier = raw.trim();
    if specifier.is_empty() || specifier.contains("${") {
        return;
    }
    specifiers.push(specifier.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(content: &str) -> Vec<String> {
        ImportExtractor::new().extract(content)
    }

    #[test]
    fn test_es_module_imports() {
        let content = r#"import Foo from "./foo";
import { a, b } from '../lib/ab';
import * as ns from "components/ns"
import "./side-effect"
const lazy = import("./lazy")"#;
        assert_eq!(
            extract(content),
            vec![
                "./foo",
                "../lib/ab",
                "components/ns",
                "./side-effect",
                "./lazy"
            ]
        );
    }

    #[test]
    fn test_commonjs_and_coffee() {
        let content = r#"const x = require("./x");
Y = require './y'
{ z } = require('z/index')"#;
        assert_eq!(extract(content), vec!["./x", "./y", "z/index"]);
    }

    #[test]
    fn test_generic_include() {
        let content = "#include \"util.h\"\ninclude 'partials/header'\n@import \"theme\";";
        assert_eq!(extract(content), vec!["util.h", "partials/header", "theme"]);
    }

    #[test]
    fn test_multi_line_block() {
        let content = r#"import {
  Foo,
  Bar,
} from "./things"
require([
  './a', './b',
  "./c"
], function () {})"#;
        assert_eq!(extract(content), vec!["./things", "./a", "./b", "./c"]);
    }

    #[test]
    fn test_duplicates_kept_in_order() {
        let content = "require('./a')\nrequire('./b')\nrequire('./a')";
        assert_eq!(extract(content), vec!["./a", "./b", "./a"]);
    }

    #[test]
    fn test_comments_and_code_ignored() {
        let content = r#"// import Foo from "./commented"
/* require('./block') */
const s = "./not-an-import"
const path = `./${name}`
import a from "./a" // see "./b""#;
        assert_eq!(extract(content), vec!["./a"]);
    }

    #[test]
    fn test_import_shaped_string_is_taken() {
        // an unresolvable path adds no edge later
        let content = r#"const s = "require('./looks-like-one')".length"#;
        assert_eq!(extract(content), vec!["./looks-like-one"]);
    }

    #[test]
    fn test_template_interpolation_dropped() {
        let content = "const m = require(`./locale/${lang}`)";
        assert!(extract(content).is_empty());
    }

    #[test]
    fn test_malformed_input_does_not_panic() {
        let content = "import {\nrequire(\n'\n\"\nfrom\n} from\n";
        let _ = extract(content);
        assert!(extract("").is_empty());
    }
}
