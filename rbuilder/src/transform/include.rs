//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use super::{expand::expand, LineTransform, TransformContext};
use crate::definitions::Kind;
use crate::plugins::Hook;
use crate::substitute::{indentation, macro_params, r_string_literal};

const MARKER: &str = "#include:";

/// Maps an include type to the R function that reads it.
#[derive(Debug, Clone)]
pub struct Registry {
    readers: Vec<(String, String)>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self {
            readers: Vec::new(),
        };
        registry.register("txt", "readLines");
        registry.register("csv", "read.csv");
        registry.register("tsv", "read.delim");
        registry.register("json", "jsonlite::fromJSON");
        registry.register("xml", "function(path) xml2::as_list(xml2::read_xml(path))");
        registry.register("xlsx", "readxl::read_excel");
        registry.register("parquet", "arrow::read_parquet");
        registry.register("rds", "readRDS");
        registry
    }
}

impl Registry {
    /// Register `function` as the reader for `kind`, replacing any earlier reader.
    pub fn register(&mut self, kind: impl Into<String>, function: impl Into<String>) {
        let kind = kind.into();
        self.readers.retain(|(k, _)| *k != kind);
        self.readers.push((kind, function.into()));
    }

    pub fn get(&self, kind: &str) -> Option<&str> {
        self.readers
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, f)| f.as_str())
    }
}

/// `#include:<type> <path> <target>` reads `path` at build time and emits its value as an R
/// literal assigned to `target`.
pub struct IncludeTransform;

impl LineTransform for IncludeTransform {
    fn apply(&self, line: String, cx: &mut TransformContext) -> String {
        let Some(spec) = line.trim_start().strip_prefix(MARKER) else {
            return line;
        };
        let fields: Vec<&str> = spec.split_whitespace().collect();
        let &[kind, path, target] = fields.as_slice() else {
            log::error!("Expected `#include:<type> <path> <target>`, got: {line}");
            return line;
        };

        if let Some(replacement) =
            cx.plugins
                .call(&mut *cx.host, Hook::Include, line.trim(), cx.file)
        {
            return replacement;
        }

        let Some(expr) = read_expression(kind, path, cx) else {
            return line;
        };
        let deparse = format!("paste(deparse({expr}), collapse = \"\\n\")");
        match cx.host.eval_string(&deparse) {
            Ok(Some(value)) => {
                log::debug!("include: {kind} {path} -> {target}");
                format!("{}{target} <- {value}", indentation(&line))
            }
            Ok(None) => {
                log::error!("Reading {path} as {kind} produced nothing");
                line
            }
            Err(error) => {
                log::error!("Failed to include {path}: {error:#}");
                line
            }
        }
    }
}

/// The R expression that reads `path`: a registered reader, or else a one parameter macro named
/// after the type.
fn read_expression(kind: &str, path: &str, cx: &TransformContext) -> Option<String> {
    let quoted = r_string_literal(path);
    if let Some(function) = cx.registry.get(kind) {
        return Some(format!("({function})({quoted})"));
    }

    let Some(definition) = cx.definitions.get(kind).filter(|d| d.kind == Kind::Function) else {
        log::error!("No reader registered for include type {kind:?}");
        return None;
    };
    let params = definition.value.as_deref().and_then(macro_params)?;
    if params.len() != 1 {
        log::error!(
            "Macro {kind} used as an include reader must take exactly one argument, it takes {}",
            params.len()
        );
        return None;
    }
    Some(expand(format!("{kind}({quoted})"), &*cx.definitions))
}
