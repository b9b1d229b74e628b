//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! `#import` resolution. Imported files are read once, contribute definitions only, and are
//! placed ahead of the files that import them.
//!
//! Discovery scans the sources as they are on disk, before any `preprocess` hook runs. It
//! honours conditionals: an `#import` under a false `#ifdef` is never resolved. Definitions
//! seen so far, including those of earlier imports, decide those conditionals.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::definitions::{Definition, DefinitionStore};
use crate::error::{Error, ErrorKind, Result};
use crate::host::HostEvaluator;
use crate::scan::{Event, LineScanner};
use crate::source::SourceFile;
use crate::substitute::r_string_literal;

/// Resolve the `--import` specs and every live `#import` line of `files`. `definitions` holds
/// what is defined before any file is read. Returns the imported files, nested imports first,
/// followed by `files` unchanged.
pub fn resolve(
    files: Vec<SourceFile>,
    cli_specs: &[String],
    definitions: &DefinitionStore,
    host: &mut dyn HostEvaluator,
) -> Result<Vec<SourceFile>> {
    let mut resolver = Resolver {
        host,
        definitions: definitions.clone(),
        seen: files
            .iter()
            .filter_map(|f| fs::canonicalize(&f.source_path).ok())
            .collect(),
        imports: Vec::new(),
    };

    for spec in cli_specs {
        resolver.import(spec, None, None)?;
    }
    for file in &files {
        resolver.scan(file)?;
    }

    let mut imports = resolver.imports;
    if !imports.is_empty() {
        log::info!("Imported {} file(s)", imports.len());
    }
    imports.extend(files);
    Ok(imports)
}

struct Resolver<'a> {
    host: &'a mut dyn HostEvaluator,
    /// Working copy, only used to decide conditionals during discovery.
    definitions: DefinitionStore,
    seen: HashSet<PathBuf>,
    imports: Vec<SourceFile>,
}

impl Resolver<'_> {
    /// Follow the live `#import` lines of `file`, in order.
    fn scan(&mut self, file: &SourceFile) -> Result<()> {
        let mut scanner = LineScanner::new(file.name(), file.namespace.clone());
        for (i, line) in file.content.lines().enumerate() {
            match scanner.feed(i + 1, line, &self.definitions, &mut *self.host) {
                Some(Event::Import(spec)) if !spec.is_empty() => {
                    self.import(&spec, file.source_path.parent(), file.namespace.as_deref())?;
                }
                Some(Event::Define { name, value }) if !self.definitions.contains(&name) => {
                    self.definitions.push(Definition::variable(name, value));
                }
                Some(Event::Unique(name)) if !self.definitions.contains(&name) => {
                    self.definitions.push(Definition::variable(name, None));
                }
                _ => {}
            }
        }
        scanner.finish();
        Ok(())
    }

    fn import(
        &mut self,
        spec: &str,
        importer_dir: Option<&Path>,
        inherited_namespace: Option<&str>,
    ) -> Result<()> {
        let (path, namespace) = locate(spec, importer_dir, &mut *self.host)?;
        let namespace = namespace.or_else(|| inherited_namespace.map(str::to_owned));
        let canonical = fs::canonicalize(&path).map_err(|e| {
            Error::new(ErrorKind::Import(spec.to_owned()))
                .with_source(e)
                .add_context(path.display().to_string())
        })?;
        if !self.seen.insert(canonical) {
            log::debug!("import: {spec} already seen");
            return Ok(());
        }

        let file = SourceFile::read(path, None, namespace)
            .map_err(|e| e.add_context(format!("importing {spec:?}")))?;
        log::debug!("import: {spec} -> {}", file.source_path.display());
        self.scan(&file)?;
        self.imports.push(file);
        Ok(())
    }
}

/// Find the file behind an import spec and the namespace its definitions live in.
fn locate(
    spec: &str,
    importer_dir: Option<&Path>,
    host: &mut dyn HostEvaluator,
) -> Result<(PathBuf, Option<String>)> {
    if let Some((package, relative)) = spec.split_once("::") {
        let expr = format!(
            "system.file({}, package = {})",
            r_string_literal(relative),
            r_string_literal(package)
        );
        return match host.eval_string(&expr) {
            Ok(Some(path)) => Ok((PathBuf::from(path.trim()), Some(package.to_owned()))),
            Ok(None) => Err(Error::new(ErrorKind::Import(spec.to_owned()))
                .add_context(format!("{relative} not found in package {package}"))),
            Err(e) => Err(Error::new(ErrorKind::Import(spec.to_owned())).with_source(e)),
        };
    }

    let direct = PathBuf::from(spec);
    if direct.exists() {
        return Ok((direct, None));
    }
    if let Some(relative) = importer_dir.map(|dir| dir.join(spec)) {
        if relative.exists() {
            return Ok((relative, None));
        }
    }
    Err(Error::new(ErrorKind::Import(spec.to_owned())).add_context("file not found"))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::MockHost;
    use test_log::test;

    fn names(files: &[SourceFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.source_path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_post_order_and_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("base.rh"), "#define BASE 1\n").unwrap();
        fs::write(root.join("mid.rh"), "#import base.rh\n#define MID 2\n").unwrap();
        fs::write(
            root.join("main.R"),
            "#import mid.rh\n#import base.rh\nx <- MID\n",
        )
        .unwrap();
        let main = SourceFile::read(root.join("main.R"), Some(root.join("out.R")), None).unwrap();

        let mut host = MockHost::default();
        let files = resolve(vec![main], &[], &DefinitionStore::new(), &mut host).unwrap();
        assert_eq!(names(&files), vec!["base.rh", "mid.rh", "main.R"]);
        assert!(files[0].dest_path.is_none());
        assert!(files[1].dest_path.is_none());

        // Resolving again adds nothing.
        let again = resolve(files, &[], &DefinitionStore::new(), &mut host).unwrap();
        assert_eq!(names(&again), vec!["base.rh", "mid.rh", "main.R"]);
    }

    #[test]
    fn test_imports_follow_conditionals() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("fast.rh"), "#define FAST 1\n").unwrap();
        fs::write(root.join("config.rh"), "#define USE_FAST\n").unwrap();
        fs::write(
            root.join("main.R"),
            "#ifdef NEVER\n#import missing.rh\n#endif\n\
             #import config.rh\n\
             #ifdef USE_FAST\n#import fast.rh\n#endif\n",
        )
        .unwrap();
        let main = SourceFile::read(root.join("main.R"), Some(root.join("out.R")), None).unwrap();

        let files =
            resolve(vec![main], &[], &DefinitionStore::new(), &mut MockHost::default()).unwrap();
        assert_eq!(names(&files), vec!["config.rh", "fast.rh", "main.R"]);
    }

    #[test]
    fn test_imports_see_command_line_defines() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("extra.rh"), "").unwrap();
        fs::write(root.join("main.R"), "#ifndef MINIMAL\n#import extra.rh\n#endif\n").unwrap();
        let main = SourceFile::read(root.join("main.R"), Some(root.join("out.R")), None).unwrap();

        let mut definitions = DefinitionStore::new();
        definitions.push(Definition::variable("MINIMAL", None));
        let files = resolve(vec![main], &[], &definitions, &mut MockHost::default()).unwrap();
        assert_eq!(names(&files), vec!["main.R"]);
    }

    #[test]
    fn test_cycle_stops() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.rh"), "#import b.rh\n").unwrap();
        fs::write(root.join("b.rh"), "#import a.rh\n").unwrap();
        let a = root.join("a.rh").display().to_string();

        let files = resolve(Vec::new(), &[a], &DefinitionStore::new(), &mut MockHost::default()).unwrap();
        assert_eq!(names(&files), vec!["b.rh", "a.rh"]);
    }

    #[test]
    fn test_package_qualified() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("defs.rh");
        fs::write(&header, "#define N 1\n").unwrap();

        let mut host = MockHost::default().with_string(
            "system.file(\"inst/defs.rh\", package = \"mypkg\")",
            &header.display().to_string(),
        );
        let files = resolve(
            Vec::new(),
            &["mypkg::inst/defs.rh".to_owned()],
            &DefinitionStore::new(),
            &mut host,
        ).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].namespace.as_deref(), Some("mypkg"));
    }

    #[test]
    fn test_package_missing_file_fails() {
        let mut host = MockHost::default()
            .with_string("system.file(\"x.rh\", package = \"mypkg\")", "");
        let error = resolve(
            Vec::new(),
            &["mypkg::x.rh".to_owned()],
            &DefinitionStore::new(),
            &mut host,
        )
        .unwrap_err();
        assert!(matches!(error.kind, ErrorKind::Import(ref spec) if spec == "mypkg::x.rh"));
    }

    #[test]
    fn test_unreadable_path_fails() {
        let error = resolve(
            Vec::new(),
            &["/definitely/not/here.rh".to_owned()],
            &DefinitionStore::new(),
            &mut MockHost::default(),
        )
        .unwrap_err();
        assert!(matches!(error.kind, ErrorKind::Import(_)));
    }
}
