//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::fs;
use std::path::Path;

use crate::config::FILE_NAME;
use crate::error::{Error, Result};

const CONFIG_TEMPLATE: &str = "\
# rbuilder configuration, command line flags take precedence.
input: srcr
output: R
# tests: tests/testthat
# prepend: inst/header.R
# append: inst/footer.R
# import: inst/defs.rh
# plugin: pkg::plugin
# depends: rlang
# reader: tsv read.delim
deadcode: false
sourcemap: false
clean: true
watch: false
";

fn write_new(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)
        .map_err(|e| Error::from(e).add_context(format!("writing {}", path.display())))?;
    log::info!("Created {}", path.display());
    Ok(())
}

/// Write a commented `builder.ini` into `dir`, keeping an existing one.
pub fn init_config(dir: &Path) -> Result<()> {
    let path = dir.join(FILE_NAME);
    if path.exists() {
        log::warn!("{} already exists, leaving it alone", path.display());
        return Ok(());
    }
    write_new(&path, CONFIG_TEMPLATE)
}

/// Create the skeleton of a package called `name` in a new directory `root`.
pub fn create_package(root: &Path, name: &str) -> Result<()> {
    if root.exists() {
        return Err(Error::from(std::io::Error::from(
            std::io::ErrorKind::AlreadyExists,
        ))
        .add_context(format!("creating package {}", root.display())));
    }
    for dir in ["R", "srcr"] {
        fs::create_dir_all(root.join(dir))
            .map_err(|e| Error::from(e).add_context(format!("creating {dir}/")))?;
    }

    write_new(&root.join(".Rbuildignore"), "^srcr$\n^builder\\.ini$\n")?;
    write_new(
        &root.join("DESCRIPTION"),
        &format!(
            "Package: {name}\n\
             Title: What the Package Does (One Line, Title Case)\n\
             Version: 0.0.0.9000\n\
             Authors@R:\n    person(\"First\", \"Last\", email = \"first.last@example.com\", role = c(\"aut\", \"cre\"))\n\
             Description: What the package does (one paragraph).\n\
             License: What license it uses\n\
             Encoding: UTF-8\n\
             Roxygen: list(markdown = TRUE)\n"
        ),
    )?;
    write_new(&root.join("NAMESPACE"), "exportPattern(\"^[[:alpha:]]+\")\n")?;
    init_config(root)?;

    log::info!(target: "success", "Created package skeleton {name}, run `cd {} && rbuilder`", root.display());
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use test_log::test;

    #[test]
    fn test_create_package() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("mypkg");
        create_package(&root, "mypkg").unwrap();

        assert!(root.join("R").is_dir());
        assert!(root.join("srcr").is_dir());
        assert!(root.join("NAMESPACE").is_file());
        let description = fs::read_to_string(root.join("DESCRIPTION")).unwrap();
        assert!(description.starts_with("Package: mypkg\n"));
        let ignore = fs::read_to_string(root.join(".Rbuildignore")).unwrap();
        assert!(ignore.contains("^srcr$"));

        let config = Config::load(&root.join(FILE_NAME)).unwrap().unwrap();
        assert_eq!(config.input, Some("srcr".into()));
        assert_eq!(config.clean, Some(true));
    }

    #[test]
    fn test_create_package_existing_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(create_package(dir.path(), "x").is_err());
    }

    #[test]
    fn test_init_keeps_existing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FILE_NAME), "input: custom\n").unwrap();
        init_config(dir.path()).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join(FILE_NAME)).unwrap(),
            "input: custom\n"
        );
    }
}
