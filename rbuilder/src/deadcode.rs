//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! A text-level unused-binding report over the generated files.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::substitute::{find_unquoted, leading_identifier, token_positions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unused {
    pub name: String,
    pub file: PathBuf,
    pub line: usize,
}

/// A top-level `name <- ...` or `name = ...` binding.
fn binding(line: &str) -> Option<&str> {
    if line.starts_with(char::is_whitespace) {
        return None;
    }
    let name = leading_identifier(line)?;
    let rest = line[name.len()..].trim_start();
    let assigns = (rest.starts_with("<-") && !rest.starts_with("<--"))
        || (rest.starts_with('=') && !rest.starts_with("=="));
    (assigns && !name.starts_with('.')).then_some(name)
}

/// Warn about every top-level binding in `paths` that is never mentioned again.
pub fn report(paths: &[PathBuf]) -> Result<Vec<Unused>> {
    let mut texts = Vec::with_capacity(paths.len());
    for path in paths {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::from(e).add_context(format!("reading {}", path.display())))?;
        texts.push((path.as_path(), text));
    }
    Ok(find_unused(&texts))
}

fn find_unused(texts: &[(&Path, String)]) -> Vec<Unused> {
    let code: Vec<String> = texts.iter().map(|(_, text)| strip_comments(text)).collect();
    let mut unused = Vec::new();
    for (path, text) in texts {
        for (number, line) in text.lines().enumerate() {
            let Some(name) = binding(line) else {
                continue;
            };
            let total: usize = code.iter().map(|c| token_positions(c, name).len()).sum();
            // The definition itself is one mention.
            if total <= 1 {
                log::warn!(
                    "{}:{}: `{name}` is defined but never used",
                    path.display(),
                    number + 1
                );
                unused.push(Unused {
                    name: name.to_owned(),
                    file: path.to_path_buf(),
                    line: number + 1,
                });
            }
        }
    }
    unused
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        match find_unquoted(line, "#") {
            Some(at) => out.push_str(&line[..at]),
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}
