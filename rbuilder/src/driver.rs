//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! The two passes over every file. The first collects definitions and runs preflight blocks,
//! the second rewrites and writes the output.

use std::fs;
use std::path::{Path, PathBuf};

use crate::definitions::{Definition, DefinitionStore};
use crate::error::{Error, ErrorKind, Result};
use crate::host::HostEvaluator;
use crate::plugins::{Hook, Plugins};
use crate::scan::{Event, LineScanner, TestBlock};
use crate::source::SourceFile;
use crate::substitute::{extract_braced_body, macro_params, r_string_literal, replace_all};
use crate::transform::{apply_chain, Registry, TransformContext};

#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    pub tests_dir: PathBuf,
    pub sourcemap: bool,
    /// Text placed before every output file.
    pub prepend: Option<String>,
    /// Text placed after every output file.
    pub append: Option<String>,
}

pub struct Driver<'a> {
    pub definitions: DefinitionStore,
    host: &'a mut dyn HostEvaluator,
    plugins: &'a mut Plugins,
    registry: &'a Registry,
    options: &'a DriverOptions,
}

/// What a file's second pass collects besides the output text.
#[derive(Default)]
struct Emitted {
    output: String,
    tests: Vec<TestBlock>,
}

impl<'a> Driver<'a> {
    pub fn new(
        definitions: DefinitionStore,
        host: &'a mut dyn HostEvaluator,
        plugins: &'a mut Plugins,
        registry: &'a Registry,
        options: &'a DriverOptions,
    ) -> Self {
        Self {
            definitions,
            host,
            plugins,
            registry,
            options,
        }
    }

    /// Run both passes over `files`. Returns the paths written.
    pub fn run(&mut self, mut files: Vec<SourceFile>) -> Result<Vec<PathBuf>> {
        if !self.plugins.is_empty() {
            for file in &mut files {
                if let Some(content) =
                    self.plugins
                        .call(&mut *self.host, Hook::Preprocess, &file.content, &file.name())
                {
                    file.content = content;
                }
            }
        }

        let mut decisions = Vec::with_capacity(files.len());
        for file in &files {
            decisions.push(
                self.first_pass(file)
                    .map_err(|e| e.add_context(file.name()))?,
            );
        }
        log::debug!(
            "Driver::run() {} definitions after the first pass",
            self.definitions.iter().count()
        );

        let mut written = Vec::new();
        for (file, decisions) in files.iter().zip(decisions) {
            let Some(dest) = &file.dest_path else {
                continue;
            };
            let emitted = self
                .second_pass(file, decisions)
                .map_err(|e| e.add_context(file.name()))?;
            self.write_output(file, dest, emitted.output)?;
            written.push(dest.clone());
            if let Some(test_file) = self.write_tests(dest, &emitted.tests)? {
                written.push(test_file);
            }
        }
        Ok(written)
    }

    fn first_pass(&mut self, file: &SourceFile) -> Result<Vec<bool>> {
        let name = file.name();
        let mut scanner = LineScanner::new(name.clone(), file.namespace.clone());
        for (i, line) in file.content.lines().enumerate() {
            let Some(event) = scanner.feed(i + 1, line, &self.definitions, &mut *self.host) else {
                continue;
            };
            match event {
                Event::Define { name, value } => {
                    self.definitions.push(Definition::variable(name, value));
                }
                Event::Unique(name) => {
                    let value = self.definitions.next_unique();
                    self.definitions.push(Definition::variable(name, Some(value)));
                }
                Event::Macro { name, text, scope } => {
                    if macro_params(&text).is_none() || extract_braced_body(&text).is_none() {
                        log::warn!("{name}: macro needs a parameter list and a braced body");
                    }
                    self.definitions
                        .push(Definition::function(name, text, scope));
                }
                Event::Preflight { line, body } => {
                    self.host.eval_raw(&body).map_err(|e| {
                        Error::new(ErrorKind::Preflight)
                            .with_source(e)
                            .add_context(format!("block at line {line}"))
                    })?;
                    log::info!("Preflight check at {name}:{line} passed");
                }
                Event::Error { line, message } => {
                    return Err(Error::new(ErrorKind::ErrorDirective(message))
                        .add_context(format!("line {line}")));
                }
                _ => {}
            }
        }
        Ok(scanner.finish())
    }

    fn second_pass(&mut self, file: &SourceFile, decisions: Vec<bool>) -> Result<Emitted> {
        let name = file.name();
        let mut scanner = LineScanner::replay(name.clone(), file.namespace.clone(), decisions);
        let mut emitted = Emitted {
            output: String::with_capacity(file.content.len()),
            ..Default::default()
        };
        for (i, line) in file.content.lines().enumerate() {
            if let Some(event) = scanner.feed(i + 1, line, &self.definitions, &mut *self.host) {
                self.emit(event, &name, &mut emitted)?;
            }
        }
        scanner.finish();
        Ok(emitted)
    }

    fn emit(&mut self, event: Event, file: &str, emitted: &mut Emitted) -> Result<()> {
        match event {
            Event::Line(number, line) => {
                let line = self.transform(file, number, line, self.options.sourcemap);
                emitted.output.push_str(&line);
                emitted.output.push('\n');
            }
            Event::Loop {
                var,
                start,
                end,
                body,
            } => self.emit_loop(file, &var, start, end, &body, emitted)?,
            Event::Test(test) => {
                let expressions = test
                    .expressions
                    .into_iter()
                    .map(|(number, line)| (number, self.transform(file, number, line, false)))
                    .collect();
                emitted.tests.push(TestBlock {
                    description: test.description,
                    expressions,
                });
            }
            // Only reachable from a `#for` body, which the first pass does not scan.
            Event::Error { line, message } => {
                return Err(Error::new(ErrorKind::ErrorDirective(message))
                    .add_context(format!("line {line}")));
            }
            _ => {}
        }
        Ok(())
    }

    /// Emit `body` once per value of `var`, with `..var..` replaced by the value. The body is
    /// scanned afresh for every value, so it may hold directives of its own.
    fn emit_loop(
        &mut self,
        file: &str,
        var: &str,
        start: i64,
        end: i64,
        body: &[(usize, String)],
        emitted: &mut Emitted,
    ) -> Result<()> {
        let marker = format!("..{var}..");
        let values: Vec<i64> = if start <= end {
            (start..=end).collect()
        } else {
            (end..=start).rev().collect()
        };
        for value in values {
            let value = value.to_string();
            let mut scanner = LineScanner::new(file, None);
            for (number, line) in body {
                let line = replace_all(line.clone(), &marker, &value);
                if let Some(event) = scanner.feed(*number, &line, &self.definitions, &mut *self.host)
                {
                    self.emit(event, file, emitted)?;
                }
            }
            scanner.finish();
        }
        Ok(())
    }

    fn transform(&mut self, file: &str, number: usize, line: String, sourcemap: bool) -> String {
        if number > 0 {
            self.definitions.set_location(file, number);
        }
        let mut cx = TransformContext {
            definitions: &mut self.definitions,
            host: &mut *self.host,
            plugins: &mut *self.plugins,
            registry: self.registry,
            file,
            line_number: number,
            sourcemap,
        };
        apply_chain(line, &mut cx)
    }

    fn write_output(&mut self, file: &SourceFile, dest: &Path, mut output: String) -> Result<()> {
        if !self.plugins.is_empty() {
            if let Some(processed) =
                self.plugins
                    .call(&mut *self.host, Hook::Postprocess, &output, &file.name())
            {
                output = processed;
            }
        }
        let mut content = String::with_capacity(
            output.len()
                + self.options.prepend.as_ref().map_or(0, String::len)
                + self.options.append.as_ref().map_or(0, String::len)
                + 2,
        );
        if let Some(prepend) = &self.options.prepend {
            content.push_str(prepend);
            if !prepend.ends_with('\n') {
                content.push('\n');
            }
        }
        content.push_str(&output);
        if let Some(append) = &self.options.append {
            content.push_str(append);
            if !append.ends_with('\n') {
                content.push('\n');
            }
        }

        fs::write(dest, content).map_err(|e| {
            Error::from(e).add_context(format!("writing {}", dest.display()))
        })?;
        log::debug!("Wrote {}", dest.display());
        Ok(())
    }

    /// Write the non-empty tests of the file behind `dest` to `test-<stem>.R`.
    fn write_tests(&self, dest: &Path, tests: &[TestBlock]) -> Result<Option<PathBuf>> {
        let tests: Vec<&TestBlock> = tests.iter().filter(|t| !t.is_empty()).collect();
        if tests.is_empty() {
            return Ok(None);
        }
        let stem = dest
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        fs::create_dir_all(&self.options.tests_dir).map_err(|e| {
            Error::from(e).add_context(format!("creating {}", self.options.tests_dir.display()))
        })?;
        let path = self.options.tests_dir.join(format!("test-{stem}.R"));
        fs::write(&path, render_tests(&tests))
            .map_err(|e| Error::from(e).add_context(format!("writing {}", path.display())))?;
        log::debug!("Wrote {} test(s) to {}", tests.len(), path.display());
        Ok(Some(path))
    }
}

fn render_tests(tests: &[&TestBlock]) -> String {
    let mut out = String::new();
    for (i, test) in tests.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!(
            "test_that({}, {{\n",
            r_string_literal(&test.description)
        ));
        for line in test.expressions.iter().flat_map(|(_, e)| e.lines()) {
            if !line.trim().is_empty() {
                out.push_str("  ");
                out.push_str(line.trim_end());
            }
            out.push('\n');
        }
        out.push_str("})\n");
    }
    out
}
