//! Specifier scanning tests.
//!
//! Covers every form discovery follows:
//! - Static imports and re-exports
//! - Side-effect imports: `import "./polyfill"`
//! - Dynamic `import()` and `require()`
//! - Triple-slash `path` and `types` references
//!
//! plus text that only looks like an import (comments, strings, templates,
//! regex literals, member access).

use super::imports::{ModuleSpecifier, SpecifierKind, scan_specifiers};

fn texts(source: &str) -> Vec<String> {
    scan_specifiers(source)
        .into_iter()
        .map(|specifier| specifier.text)
        .collect()
}

fn specifier(text: &str, kind: SpecifierKind) -> ModuleSpecifier {
    ModuleSpecifier {
        text: text.to_string(),
        kind,
    }
}

#[test]
fn test_static_import_forms() {
    let source = r#"
import a from "./a";
import { b, c as d } from './b';
import * as ns from "./ns";
import type { T } from "./types";
import "./side-effect";
import e, { f } from "./e";
"#;
    assert_eq!(
        texts(source),
        vec!["./a", "./b", "./ns", "./types", "./side-effect", "./e"]
    );
}

#[test]
fn test_multiline_import_clause() {
    let source = "import {\n  one,\n  two, // trailing\n} from \"./many\";";
    assert_eq!(scan_specifiers(source), vec![specifier("./many", SpecifierKind::Static)]);
}

#[test]
fn test_reexports() {
    let source = r#"
export * from "./all";
export { x } from "./x";
export type { Y } from "./y";
export const local = 1;
"#;
    assert_eq!(texts(source), vec!["./all", "./x", "./y"]);
}

#[test]
fn test_dynamic_import_and_require() {
    let source = r#"
const lazy = await import("./lazy");
const cjs = require('./cjs');
import legacy = require("./legacy");
"#;
    assert_eq!(
        scan_specifiers(source),
        vec![
            specifier("./lazy", SpecifierKind::Dynamic),
            specifier("./cjs", SpecifierKind::Require),
            specifier("./legacy", SpecifierKind::Require),
        ]
    );
}

#[test]
fn test_non_literal_dynamic_import_is_skipped() {
    assert!(texts("const m = await import(`./${name}`);").is_empty());
    assert!(texts("const m = require(name);").is_empty());
}

#[test]
fn test_reference_directives() {
    let source = r#"/// <reference path="../globals.d.ts" />
/// <reference types="node" />
// <reference path="not-a-directive.d.ts" />
"#;
    assert_eq!(
        scan_specifiers(source),
        vec![
            specifier("../globals.d.ts", SpecifierKind::ReferencePath),
            specifier("node", SpecifierKind::ReferenceTypes),
        ]
    );
}

#[test]
fn test_comments_and_strings_are_ignored() {
    let source = r#"
// import a from "./commented";
/* import b from "./block"; */
const s = 'import c from "./in-string"';
const t = `require("./in-template")`;
import real from "./real";
"#;
    assert_eq!(texts(source), vec!["./real"]);
}

#[test]
fn test_template_substitution_does_not_end_template_early() {
    let source = "const t = `${ { a: 1 }.a } import x from \"./nope\"`;\nimport y from \"./yes\";";
    assert_eq!(texts(source), vec!["./yes"]);
}

#[test]
fn test_regex_literal_is_skipped() {
    let source = "const re = /import x from \"\\.\\/nope\"/g;\nimport y from \"./yes\";";
    assert_eq!(texts(source), vec!["./yes"]);
}

#[test]
fn test_division_is_not_a_regex() {
    let source = "const half = total / 2; const q = a / b;\nimport y from \"./after-division\";";
    assert_eq!(texts(source), vec!["./after-division"]);
}

#[test]
fn test_member_access_is_not_a_keyword() {
    let source = "loader.require(\"./not-a-require\");\nobj.import(\"./nope\");\nconsole.log(import.meta.url);";
    assert!(texts(source).is_empty());
}
