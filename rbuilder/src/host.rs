//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::{Error, ErrorKind, Result};

/// Access to an R runtime.
pub trait HostEvaluator {
    /// Evaluate for side effects only.
    fn eval_raw(&mut self, expr: &str) -> Result<()>;
    /// Evaluate an expression that must produce a single `TRUE` or `FALSE`.
    fn eval_bool(&mut self, expr: &str) -> Result<bool>;
    /// Evaluate and render the result as text. `None` when the result is empty.
    fn eval_string(&mut self, expr: &str) -> Result<Option<String>>;
    /// Called at the start of every build. State left by an earlier build is dropped.
    fn begin_build(&mut self) {}
}

const RESULT_MARKER: &str = "<<rbuilder-result>>";

/// Runs every evaluation in a fresh `Rscript` process.
///
/// Successful [`HostEvaluator::eval_raw`] expressions are replayed before each later evaluation,
/// so objects created by preflight blocks and plugin constructors stay visible. The script goes
/// to the process over stdin, which has no size limit.
pub struct RscriptEvaluator {
    program: String,
    prelude: Vec<String>,
    /// Length of the prelude when the first build began. Later builds start again from here.
    base: Option<usize>,
}

impl RscriptEvaluator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            prelude: Vec::new(),
            base: None,
        }
    }

    /// Run `body` after the prelude and return what it printed after the result marker.
    fn run(&self, body: &str) -> Result<String> {
        let mut script = self.prelude.join("\n");
        script.push_str(&format!("\ncat(\"{RESULT_MARKER}\")\n"));
        script.push_str(body);

        log::trace!("RscriptEvaluator::run() {script}");
        let mut child = Command::new(&self.program)
            .arg("--vanilla")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::new(ErrorKind::Host)
                    .with_source(e)
                    .add_context(format!("failed to start {:?}", self.program))
            })?;

        // Written from another thread so a child filling its stdout pipe cannot block us.
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || {
                if let Err(e) = stdin.write_all(script.as_bytes()) {
                    log::debug!("RscriptEvaluator::run() stdin closed early: {e}");
                }
            })
        });
        let output = child.wait_with_output().map_err(|e| {
            Error::new(ErrorKind::Host)
                .with_source(e)
                .add_context(format!("waiting for {:?}", self.program))
        })?;
        if let Some(writer) = writer {
            let _ = writer.join();
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::new(ErrorKind::Host).add_context(stderr.trim().to_owned()));
        }
        Ok(stdout
            .rsplit_once(RESULT_MARKER)
            .map(|(_, result)| result.to_owned())
            .unwrap_or_default())
    }
}

impl HostEvaluator for RscriptEvaluator {
    fn eval_raw(&mut self, expr: &str) -> Result<()> {
        self.run(expr)?;
        if !self.prelude.iter().any(|known| known == expr) {
            self.prelude.push(expr.to_owned());
        }
        Ok(())
    }

    fn eval_bool(&mut self, expr: &str) -> Result<bool> {
        let body = format!(
            ".rbuilder_value <- ({expr})\n\
             if (is.logical(.rbuilder_value) && length(.rbuilder_value) == 1 && !is.na(.rbuilder_value)) \
             cat(if (.rbuilder_value) \"TRUE\" else \"FALSE\") else cat(\"NA\")"
        );
        match self.run(&body)?.trim() {
            "TRUE" => Ok(true),
            "FALSE" => Ok(false),
            _ => Err(Error::new(ErrorKind::Host)
                .add_context(format!("{expr:?} did not evaluate to TRUE or FALSE"))),
        }
    }

    fn eval_string(&mut self, expr: &str) -> Result<Option<String>> {
        let body = format!(
            ".rbuilder_value <- ({expr})\n\
             if (length(.rbuilder_value) > 0) cat(paste(as.character(.rbuilder_value), collapse = \"\\n\"))"
        );
        let result = self.run(&body)?;
        if result.is_empty() {
            Ok(None)
        } else {
            Ok(Some(result))
        }
    }

    fn begin_build(&mut self) {
        match self.base {
            Some(base) => self.prelude.truncate(base),
            None => self.base = Some(self.prelude.len()),
        }
        log::debug!("RscriptEvaluator::begin_build() prelude of {}", self.prelude.len());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    /// A stand-in for Rscript that reads the whole script from stdin and reports its size.
    #[cfg(unix)]
    fn counting_program(dir: &std::path::Path) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-rscript");
        std::fs::write(
            &path,
            "#!/bin/sh\nprintf '<<rbuilder-result>>'\nwc -c | tr -d ' '\n",
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[cfg(unix)]
    #[test]
    fn test_large_script_sent_over_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = RscriptEvaluator::new(counting_program(dir.path()));
        let expr = format!("\"{}\"", "x".repeat(200_000));
        let size: usize = host
            .eval_string(&expr)
            .unwrap()
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert!(size > 200_000);
    }

    #[cfg(unix)]
    #[test]
    fn test_prelude_not_repeated() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = RscriptEvaluator::new(counting_program(dir.path()));
        for _ in 0..3 {
            host.eval_raw("library(stats)").unwrap();
        }
        assert_eq!(host.prelude, vec!["library(stats)".to_owned()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_each_build_starts_from_plugin_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = RscriptEvaluator::new(counting_program(dir.path()));
        host.eval_raw("`p` <- p()").unwrap();

        host.begin_build();
        host.eval_raw("first <- 1").unwrap();
        assert_eq!(host.prelude.len(), 2);

        host.begin_build();
        host.eval_raw("second <- 2").unwrap();
        assert_eq!(
            host.prelude,
            vec!["`p` <- p()".to_owned(), "second <- 2".to_owned()]
        );
    }

    #[test]
    fn test_missing_program_is_host_error() {
        let mut host = RscriptEvaluator::new("/nonexistent/rbuilder-rscript");
        let error = host.eval_raw("x <- 1").unwrap_err();
        assert!(matches!(error.kind, ErrorKind::Host));
        assert!(host.prelude.is_empty());
    }
}
