//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use super::{LineTransform, TransformContext};
use crate::substitute::{find_matching, indentation, split_args};

pub const TEMPORARY: &str = ".destructure_tmp_";

/// `.[a, b] <- f()` assigns `f()` once to a temporary, then each name from it by position.
pub struct DestructureTransform;

impl LineTransform for DestructureTransform {
    fn apply(&self, line: String, _cx: &mut TransformContext) -> String {
        let indent = indentation(&line);
        let trimmed = &line[indent.len()..];
        if !trimmed.starts_with(".[") {
            return line;
        }
        let Some(close) = find_matching(trimmed, 1) else {
            return line;
        };
        let Some(expr) = trimmed[close + 1..].trim_start().strip_prefix("<-") else {
            return line;
        };
        let names = split_args(&trimmed[2..close]);
        if names.is_empty() || names.iter().any(|n| n.is_empty()) {
            log::warn!("Empty name in destructuring assignment: {line}");
            return line;
        }

        let mut out = format!("{indent}{TEMPORARY} <- {}", expr.trim());
        for (i, name) in names.iter().enumerate() {
            out.push('\n');
            out.push_str(&format!("{indent}{name} <- {TEMPORARY}[[{}]]", i + 1));
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transform::test::with_context;
    use similar_asserts::assert_eq;
    use test_log::test;

    fn destructure(line: &str) -> String {
        with_context(|cx| DestructureTransform.apply(line.to_owned(), cx))
    }

    #[test]
    fn test_two_names() {
        assert_eq!(
            destructure(".[a, b] <- f()"),
            ".destructure_tmp_ <- f()\n\
             a <- .destructure_tmp_[[1]]\n\
             b <- .destructure_tmp_[[2]]"
        );
    }

    #[test]
    fn test_indentation_and_single_evaluation() {
        let out = destructure("    .[x,y,z] <- compute(list(1, 2), 3)");
        assert_eq!(out.matches("compute(").count(), 1);
        assert_eq!(
            out,
            "    .destructure_tmp_ <- compute(list(1, 2), 3)\n    \
             x <- .destructure_tmp_[[1]]\n    \
             y <- .destructure_tmp_[[2]]\n    \
             z <- .destructure_tmp_[[3]]"
        );
    }

    #[test]
    fn test_not_destructuring() {
        assert_eq!(destructure("x[1] <- 2"), "x[1] <- 2");
        assert_eq!(destructure(".[a, b]"), ".[a, b]");
        assert_eq!(destructure(".[] <- f()"), ".[] <- f()");
    }
}
