//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::collections::HashSet;

use super::{LineTransform, TransformContext};
use crate::definitions::{Definition, DefinitionStore, Scope};
use crate::substitute::{
    call_arguments, extract_braced_body, is_identifier_char, macro_params, r_string_literal,
    replace_all,
};

/// Expansion stops after this many rounds, which only happens for circular definitions.
pub const MAX_ROUNDS: usize = 32;

/// Substitutes `#define` values and expands macro calls until the line stops changing.
pub struct ExpandTransform;

impl LineTransform for ExpandTransform {
    fn apply(&self, line: String, cx: &mut TransformContext) -> String {
        cx.definitions.increment_counter(&line);
        expand(line, cx.definitions)
    }
}

struct Macro<'a> {
    definition: &'a Definition,
    params: Vec<String>,
    body: &'a str,
}

pub fn expand(line: String, definitions: &DefinitionStore) -> String {
    expand_reporting(line, definitions, &mut |line| {
        log::warn!(
            "Expansion did not settle after {MAX_ROUNDS} rounds, check for circular definitions: {line}"
        )
    })
}

/// [`expand`] with the handler called when the round limit is reached. It runs at most once.
fn expand_reporting(
    mut line: String,
    definitions: &DefinitionStore,
    unsettled: &mut dyn FnMut(&str),
) -> String {
    let macros: Vec<Macro> = definitions
        .functions()
        .filter_map(|definition| {
            let text = definition.value.as_deref()?;
            Some(Macro {
                definition,
                params: macro_params(text)?,
                body: extract_braced_body(text)?,
            })
        })
        .collect();
    let mut reported = HashSet::new();

    for _ in 0..MAX_ROUNDS {
        let mut changed = false;
        for definition in definitions.iter() {
            if let Some(value) = definition.substitution() {
                if value != definition.name && line.contains(definition.name.as_str()) {
                    line = replace_all(line, &definition.name, value);
                    changed = true;
                }
            }
        }
        for m in &macros {
            if let Some(expanded) = expand_calls(&line, m, &mut reported) {
                line = expanded;
                changed = true;
            }
        }
        if !changed {
            return line;
        }
    }

    unsettled(&line);
    line
}

/// Expand every call of `m` in `line`. `None` when nothing was expanded.
fn expand_calls(line: &str, m: &Macro, reported: &mut HashSet<String>) -> Option<String> {
    let name = m.definition.name.as_str();
    let pattern = format!("{name}(");
    let mut out = String::new();
    let mut last = 0;
    let mut search = 0;

    while let Some(found) = line[search..].find(&pattern) {
        let at = search + found;
        let open = at + name.len();
        search = open + 1;

        let glued = line[..at]
            .chars()
            .next_back()
            .is_some_and(|c| is_identifier_char(c) || c == ':');
        if glued {
            continue;
        }
        let Some((args, close)) = call_arguments(line, open) else {
            continue;
        };
        if args.len() != m.params.len() {
            if reported.insert(name.to_owned()) {
                log::error!(
                    "Macro {name} takes {} argument(s) but was called with {}: {line}",
                    m.params.len(),
                    args.len()
                );
            }
            return None;
        }

        log::debug!("expand: {name}({args:?})");
        let body = substitute_params(m.body, &m.params, &args);
        out.push_str(&line[last..at]);
        match m.definition.scope {
            Scope::Global => out.push_str(&body),
            Scope::Local if body.contains('\n') => {
                out.push_str("local({\n");
                out.push_str(&body);
                out.push_str("\n})");
            }
            Scope::Local => {
                out.push_str("local({ ");
                out.push_str(&body);
                out.push_str(" })");
            }
        }
        last = close + 1;
        search = last;
    }

    if last == 0 {
        return None;
    }
    out.push_str(&line[last..]);
    Some(out)
}

/// Replace `..param` with the argument as a string literal and `.param` with the argument text.
///
/// A single left to right scan, so argument text is never itself substituted.
fn substitute_params(body: &str, params: &[String], args: &[String]) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    let mut previous: Option<char> = None;

    while let Some(c) = rest.chars().next() {
        if c == '.' && !previous.is_some_and(is_identifier_char) {
            if let Some((len, replacement)) = match_param(rest, params, args) {
                out.push_str(&replacement);
                previous = replacement.chars().next_back();
                rest = &rest[len..];
                continue;
            }
        }
        out.push(c);
        previous = Some(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn match_param(text: &str, params: &[String], args: &[String]) -> Option<(usize, String)> {
    let stringify = text.starts_with("..");
    let start = if stringify { 2 } else { 1 };
    let len = text[start..]
        .find(|c: char| !is_identifier_char(c))
        .unwrap_or(text.len() - start);
    let ident = &text[start..start + len];
    let index = params.iter().position(|p| p == ident)?;
    let replacement = if stringify {
        r_string_literal(&args[index])
    } else {
        args[index].clone()
    };
    Some((start + len, replacement))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transform::test::Fixture;
    use test_log::test;

    fn store_with(definitions: Vec<Definition>) -> DefinitionStore {
        let mut store = DefinitionStore::new();
        for definition in definitions {
            store.push(definition);
        }
        store
    }

    fn function(name: &str, text: &str) -> Definition {
        Definition::function(name, text.to_owned(), Scope::Global)
    }

    #[test]
    fn test_variable_every_occurrence() {
        let store = store_with(vec![Definition::variable("N", Some("10".to_owned()))]);
        assert_eq!(expand("x <- N + N".to_owned(), &store), "x <- 10 + 10");
    }

    #[test]
    fn test_valueless_variable_not_substituted() {
        let store = store_with(vec![Definition::variable("DEBUG", None)]);
        assert_eq!(expand("DEBUG".to_owned(), &store), "DEBUG");
    }

    #[test]
    fn test_literal_and_stringified_param() {
        let store = store_with(vec![function("M", "M(x) { .x + ..x }")]);
        assert_eq!(expand("M(5)".to_owned(), &store), "5 + \"5\"");
    }

    #[test]
    fn test_argument_text_not_resubstituted() {
        let store = store_with(vec![function("SWAP", "SWAP(a, b) { c(.b, .a) }")]);
        assert_eq!(expand("SWAP(.a, .b)".to_owned(), &store), "c(.b, .a)");
    }

    #[test]
    fn test_function_form_signature() {
        let store = store_with(vec![function(
            "ADD",
            "ADD <- function(a, b) {\n  .a + .b\n}",
        )]);
        assert_eq!(
            expand("y <- ADD(f(1, 2), 3) * 2".to_owned(), &store),
            "y <- f(1, 2) + 3 * 2"
        );
    }

    #[test]
    fn test_local_scope_wraps() {
        let store = store_with(vec![Definition::function(
            "M",
            "M(x) { tmp <- .x; tmp * 2 }".to_owned(),
            Scope::Local,
        )]);
        assert_eq!(
            expand("y <- M(3)".to_owned(), &store),
            "y <- local({ tmp <- 3; tmp * 2 })"
        );
    }

    #[test]
    fn test_arity_mismatch_left_unexpanded() {
        let store = store_with(vec![function("ADD", "ADD(a, b) { .a + .b }")]);
        assert_eq!(expand("ADD(1)".to_owned(), &store), "ADD(1)");
    }

    #[test]
    fn test_name_must_not_be_glued() {
        let store = store_with(vec![function("M", "M(x) { .x }")]);
        assert_eq!(expand("MM(1) + a.M(2)".to_owned(), &store), "MM(1) + a.M(2)");
    }

    #[test]
    fn test_nested_macros_settle() {
        let store = store_with(vec![
            function("SQ", "SQ(x) { (.x * .x) }"),
            function("QUAD", "QUAD(x) { SQ(SQ(.x)) }"),
        ]);
        assert_eq!(
            expand("QUAD(2)".to_owned(), &store),
            "((2 * 2) * (2 * 2))"
        );
    }

    #[test]
    fn test_circular_definitions_terminate() {
        let store = store_with(vec![
            function("A", "A(x) { B(.x) }"),
            function("B", "B(x) { A(.x) }"),
        ]);
        let mut warnings = 0;
        let out = expand_reporting("A(1)".to_owned(), &store, &mut |_| warnings += 1);
        assert!(out == "A(1)" || out == "B(1)");
        assert_eq!(warnings, 1);
    }

    #[test]
    fn test_settled_expansion_does_not_warn() {
        let store = store_with(vec![function("SQ", "SQ(x) { (.x * .x) }")]);
        let mut warnings = 0;
        let out = expand_reporting("SQ(SQ(2))".to_owned(), &store, &mut |_| warnings += 1);
        assert_eq!(out, "((2 * 2) * (2 * 2))");
        assert_eq!(warnings, 0);
    }

    #[test]
    fn test_transform_increments_counter() {
        let mut fixture = Fixture::new();
        let out = fixture.run(|cx| {
            let first = ExpandTransform.apply("a <- ..COUNTER..".to_owned(), cx);
            let second = ExpandTransform.apply("b <- ..COUNTER..".to_owned(), cx);
            (first, second)
        });
        assert_eq!(out, ("a <- 1".to_owned(), "b <- 2".to_owned()));
    }
}
