//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use super::{LineTransform, TransformContext};
use crate::substitute::find_closing_quote;

const MARKER: &str = "..FMT(";
const MAX_REWRITES: usize = 32;

/// `..FMT("Hello {name}")` becomes `sprintf("Hello %s", name)`. The quote character of the
/// literal is kept. Text inside `{}` is copied verbatim as the argument expression.
pub struct InterpolateTransform;

impl LineTransform for InterpolateTransform {
    fn apply(&self, mut line: String, _cx: &mut TransformContext) -> String {
        for _ in 0..MAX_REWRITES {
            match rewrite_first(&line) {
                Some(rewritten) => line = rewritten,
                None => return line,
            }
        }
        line
    }
}

/// Rewrite the first `..FMT(` that opens a string literal. `None` when there is none or it is
/// malformed.
fn rewrite_first(line: &str) -> Option<String> {
    let start = line
        .match_indices(MARKER)
        .map(|(i, _)| i)
        .find(|i| matches!(line[i + MARKER.len()..].chars().next(), Some('"' | '\'')))?;
    let quote_at = start + MARKER.len();
    let quote = line[quote_at..].chars().next()?;
    let content_start = quote_at + 1;

    let Some(content_len) = find_closing_quote(&line[content_start..], quote) else {
        log::warn!("Unterminated string in ..FMT: {line}");
        return None;
    };
    let content = &line[content_start..content_start + content_len];
    let after_quote = content_start + content_len + 1;

    let rest = &line[after_quote..];
    let close = match rest.find(')') {
        Some(close) if rest[..close].trim().is_empty() => after_quote + close,
        _ => {
            log::warn!("Missing closing parenthesis in ..FMT: {line}");
            return None;
        }
    };

    let (format, vars) = split_spans(content);
    log::trace!("interpolate: {content:?} -> {format:?} {vars:?}");

    let mut out = String::with_capacity(line.len() + format.len());
    out.push_str(&line[..start]);
    out.push_str("sprintf(");
    out.push(quote);
    out.push_str(&format);
    out.push(quote);
    for var in vars {
        out.push_str(", ");
        out.push_str(var);
    }
    out.push(')');
    out.push_str(&line[close + 1..]);
    Some(out)
}

/// Replace each `{expr}` span with `%s`, returning the format and the span contents in order.
/// An unclosed `{` is kept as literal text.
fn split_spans(content: &str) -> (String, Vec<&str>) {
    let mut format = String::with_capacity(content.len());
    let mut vars = Vec::new();
    let mut rest = content;
    while let Some(open) = rest.find('{') {
        let Some(len) = rest[open + 1..].find('}') else {
            break;
        };
        format.push_str(&rest[..open]);
        format.push_str("%s");
        vars.push(rest[open + 1..open + 1 + len].trim());
        rest = &rest[open + len + 2..];
    }
    format.push_str(rest);
    (format, vars)
}
