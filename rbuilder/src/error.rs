//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ErrorKind {
    #[error("Error processing io")]
    Io,
    #[error("Failed to resolve import {0:?}")]
    Import(String),
    #[error("Preflight block failed")]
    Preflight,
    #[error("Error: {0}")]
    ErrorDirective(String),
    #[error("Host evaluation failed")]
    Host,
    #[error("Failed to initialize plugin {0:?}")]
    Plugin(String),
    #[error("Package {0:?} is not installed")]
    MissingDependency(String),
    #[error("Directory {0:?} does not exist")]
    MissingDirectory(PathBuf),
    #[error("Two sources are both written as {0:?}")]
    DuplicateOutput(PathBuf),
    #[error("Interrupted")]
    Interrupted,
}

/// The error type for everything that can abort a build.
///
/// Recoverable problems (duplicate definitions, macro arity mismatches, unknown include types)
/// never become an [`Error`], they are logged where they happen.
#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    context: Vec<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: Vec::new(),
            source: None,
        }
    }

    pub fn add_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        // Most recently added context describes the outermost operation.
        for context in self.context.iter().rev() {
            write!(f, ": {context}")?;
        }
        if f.alternate() {
            if let Some(source) = &self.source {
                write!(f, ": {source}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::new(ErrorKind::Io).with_source(error)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait ResultExt<T> {
    fn add_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn add_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|error| error.add_context(f()))
    }
}

pub trait GetExitCode {
    fn get_exit_code(&self) -> i32;
}

impl<T> GetExitCode for Result<T> {
    fn get_exit_code(&self) -> i32 {
        match self {
            Ok(_) => 0,
            Err(Error {
                kind: ErrorKind::Interrupted,
                ..
            }) => 130,
            Err(_) => 1,
        }
    }
}
