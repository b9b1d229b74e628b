//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Text substitution primitives shared by the definition table, the transform chain and the
//! driver. Everything here works on raw text, there is no R tokenizer.

/// Characters that may appear in an R identifier (`.` included, R allows it anywhere).
pub fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

/// Replace every occurrence of `find` in `haystack` with `replace`.
///
/// Occurrences are counted first so the result is allocated once at its exact final size. When
/// there is nothing to replace the input is handed back untouched.
pub fn replace_all(haystack: String, find: &str, replace: &str) -> String {
    if find.is_empty() {
        return haystack;
    }
    let count = haystack.matches(find).count();
    if count == 0 {
        return haystack;
    }

    let len = haystack.len() - count * find.len() + count * replace.len();
    let mut out = String::with_capacity(len);
    let mut last = 0;
    for (i, _) in haystack.match_indices(find) {
        out.push_str(&haystack[last..i]);
        out.push_str(replace);
        last = i + find.len();
    }
    out.push_str(&haystack[last..]);
    debug_assert_eq!(out.len(), len);
    out
}

/// Byte offsets of every occurrence of `find` that is not glued to other identifier characters
/// on either side, so `x` does not match inside `xs` or `a.x`.
pub fn token_positions(haystack: &str, find: &str) -> Vec<usize> {
    if find.is_empty() {
        return Vec::new();
    }
    haystack
        .match_indices(find)
        .map(|(i, _)| i)
        .filter(|&i| {
            let before = haystack[..i].chars().next_back();
            let after = haystack[i + find.len()..].chars().next();
            !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char)
        })
        .collect()
}

/// Find the index of the quote that closes a string whose opening quote has already been
/// consumed. Backslash escapes are honoured.
pub fn find_closing_quote(text: &str, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Some(i);
        }
    }
    None
}

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '`')
}

/// Given the byte index of an opening `(`, `{` or `[` in `text`, return the index of the
/// bracket that closes it. Nested brackets of every kind and quoted strings are skipped.
pub fn find_matching(text: &str, open: usize) -> Option<usize> {
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            c if is_quote(c) => quote = Some(c),
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split an argument list on top level commas. Commas nested in brackets or quoted strings do
/// not separate arguments. Each argument is trimmed. Blank input yields no arguments.
pub fn split_args(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in text.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            c if is_quote(c) => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '{' | '[' => {
                depth += 1;
                current.push(c);
            }
            ')' | '}' | ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_owned());
                current.clear();
            }
            c => current.push(c),
        }
    }
    args.push(current.trim().to_owned());
    args
}

/// Parse the argument list of a call whose `(` sits at byte index `open`. Returns the arguments
/// and the index of the closing `)`.
pub fn call_arguments(text: &str, open: usize) -> Option<(Vec<String>, usize)> {
    let close = find_matching(text, open)?;
    Some((split_args(&text[open + 1..close]), close))
}

/// The text between the first `{` and its matching `}`, trimmed.
pub fn extract_braced_body(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    let close = find_matching(text, open)?;
    Some(text[open + 1..close].trim())
}

/// The declared parameter list of a macro: the first parenthesised group that comes before the
/// body. Handles both `NAME(a, b) { ... }` and `NAME <- function(a, b) { ... }`.
pub fn macro_params(text: &str) -> Option<Vec<String>> {
    let open = text.find('(')?;
    if text.find('{').is_some_and(|brace| brace < open) {
        return None;
    }
    let (params, _) = call_arguments(text, open)?;
    Some(params)
}

/// The leading identifier of `text`, used as a macro name.
pub fn leading_identifier(text: &str) -> Option<&str> {
    let text = text.trim_start();
    let end = text
        .char_indices()
        .find(|(_, c)| !is_identifier_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    if end == 0 {
        None
    } else {
        Some(&text[..end])
    }
}

/// Net change in `{`/`}` nesting over one line of R, ignoring quoted strings and comments.
pub fn brace_delta(line: &str) -> i64 {
    let mut delta = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in line.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            c if is_quote(c) => quote = Some(c),
            '#' => break,
            '{' => delta += 1,
            '}' => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Byte index of the first occurrence of `pattern` that is outside any quoted string.
pub fn find_unquoted(line: &str, pattern: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if is_quote(c) {
            quote = Some(c);
        } else if line[i..].starts_with(pattern) {
            return Some(i);
        }
    }
    None
}

/// Render `s` as a double quoted R string literal.
pub fn r_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Leading whitespace of `line`.
pub fn indentation(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}
