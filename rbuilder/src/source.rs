//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, ErrorKind, Result};

/// One file taking part in a build.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub source_path: PathBuf,
    /// `None` for imported headers, which only contribute definitions.
    pub dest_path: Option<PathBuf>,
    pub content: String,
    /// Set for files imported as `package::path`.
    pub namespace: Option<String>,
}

impl SourceFile {
    pub fn read(
        source_path: PathBuf,
        dest_path: Option<PathBuf>,
        namespace: Option<String>,
    ) -> Result<Self> {
        let content = fs::read_to_string(&source_path).map_err(|e| {
            Error::from(e).add_context(format!("reading {}", source_path.display()))
        })?;
        Ok(Self {
            source_path,
            dest_path,
            content,
            namespace,
        })
    }

    /// The name used for `..FILE..` and in log messages.
    pub fn name(&self) -> String {
        self.source_path.display().to_string()
    }
}

fn is_r_source(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("R" | "r"))
}

/// Every `*.R` file under `input`, in a stable order. Destinations are flattened into `output`,
/// so two sources sharing a file stem anywhere in the tree are an error: their outputs and
/// their `test-<stem>.R` files would overwrite each other.
pub fn collect_files(input: &Path, output: &Path) -> Result<Vec<SourceFile>> {
    if !input.is_dir() {
        return Err(Error::new(ErrorKind::MissingDirectory(input.to_path_buf())));
    }
    let mut paths = Vec::new();
    walk(input, &mut paths)?;
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    let mut stems: HashMap<String, PathBuf> = HashMap::new();
    for path in paths {
        let (Some(name), Some(stem)) = (path.file_name(), path.file_stem()) else {
            continue;
        };
        let dest = output.join(name);
        if let Some(first) = stems.insert(stem.to_string_lossy().into_owned(), path.clone()) {
            return Err(Error::new(ErrorKind::DuplicateOutput(dest))
                .add_context(format!("{} and {}", first.display(), path.display())));
        }
        log::debug!("collect_files: {} -> {}", path.display(), dest.display());
        files.push(SourceFile::read(path, Some(dest), None)?);
    }
    Ok(files)
}

fn walk(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| Error::from(e).add_context(format!("reading directory {}", dir.display())))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, paths)?;
        } else if is_r_source(&path) {
            paths.push(path);
        }
    }
    Ok(())
}

/// Remove generated R files from `output` and generated tests from `tests`. Missing directories
/// are fine.
pub fn clean(output: &Path, tests: &Path) -> Result<()> {
    remove_matching(output, |name| name.ends_with(".R") || name.ends_with(".r"))?;
    remove_matching(tests, |name| name.starts_with("test-") && name.ends_with(".R"))
}

fn remove_matching(dir: &Path, matches: impl Fn(&str) -> bool) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let path = entry?.path();
        let generated = path.is_file()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(&matches);
        if generated {
            log::debug!("clean: removing {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
