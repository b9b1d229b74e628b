//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! `builder.ini`: one `key: value` per line, `#` starts a comment.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const FILE_NAME: &str = "builder.ini";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub tests: Option<PathBuf>,
    pub prepend: Option<PathBuf>,
    pub append: Option<PathBuf>,
    pub deadcode: Option<bool>,
    pub sourcemap: Option<bool>,
    pub clean: Option<bool>,
    pub watch: Option<bool>,
    pub plugins: Vec<String>,
    pub imports: Vec<String>,
    pub depends: Vec<String>,
    pub readers: Vec<(String, String)>,
}

impl Config {
    /// Read the config file at `path`. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                log::info!("Using {}", path.display());
                Ok(Some(Self::parse(&text)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::from(e).add_context(format!("reading {}", path.display()))),
        }
    }

    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                log::warn!("{FILE_NAME}:{}: expected `key: value`", number + 1);
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "input" => config.input = Some(value.into()),
                "output" => config.output = Some(value.into()),
                "tests" => config.tests = Some(value.into()),
                "prepend" => config.prepend = Some(value.into()),
                "append" => config.append = Some(value.into()),
                "deadcode" => config.deadcode = parse_bool(number, value),
                "sourcemap" => config.sourcemap = parse_bool(number, value),
                "clean" => config.clean = parse_bool(number, value),
                "watch" => config.watch = parse_bool(number, value),
                "plugin" | "plugins" => config.plugins.extend(words(value)),
                "import" | "imports" => config.imports.extend(words(value)),
                "depends" => config.depends.extend(words(value)),
                "reader" => match value.split_once(char::is_whitespace) {
                    Some((kind, function)) => config
                        .readers
                        .push((kind.to_owned(), function.trim().to_owned())),
                    None => log::warn!("{FILE_NAME}:{}: expected `reader: TYPE FN`", number + 1),
                },
                other => log::warn!("{FILE_NAME}:{}: unknown key {other:?}", number + 1),
            }
        }
        config
    }
}

fn words(value: &str) -> impl Iterator<Item = String> + '_ {
    value.split_whitespace().map(str::to_owned)
}

fn parse_bool(number: usize, value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => {
            log::warn!("{FILE_NAME}:{}: expected true or false, got {value:?}", number + 1);
            None
        }
    }
}
