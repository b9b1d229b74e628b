//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::path::{Path, PathBuf};

use clap::builder::{TypedValueParser, ValueParserFactory};

use config::Config;
use definitions::{Definition, DefinitionStore};
use driver::{Driver, DriverOptions};
use error::{Error, ErrorKind, Result};
use host::{HostEvaluator, RscriptEvaluator};
use plugins::{Hook, Plugins};
use transform::Registry;

mod conditional;
pub mod config;
pub mod deadcode;
pub mod definitions;
mod directive;
pub mod driver;
pub mod error;
pub mod host;
pub mod import;
pub mod plugins;
pub mod scaffold;
mod scan;
pub mod source;
mod substitute;
#[cfg(test)]
mod test_utils;
pub mod transform;
pub mod watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentDefine {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Clone)]
pub struct ArgumentDefineParser;

impl TypedValueParser for ArgumentDefineParser {
    type Value = ArgumentDefine;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        _arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> std::result::Result<Self::Value, clap::Error> {
        let value = value
            .to_str()
            .ok_or_else(|| clap::Error::new(clap::error::ErrorKind::InvalidUtf8).with_cmd(cmd))?;
        let (name, value) = match value.split_once('=') {
            Some((name, value)) => (name, Some(value.to_owned())),
            None => (value, None),
        };
        if name.is_empty() {
            return Err(clap::Error::new(clap::error::ErrorKind::InvalidValue).with_cmd(cmd));
        }
        Ok(ArgumentDefine {
            name: name.to_owned(),
            value,
        })
    }
}

impl ValueParserFactory for ArgumentDefine {
    type Parser = ArgumentDefineParser;

    fn value_parser() -> Self::Parser {
        ArgumentDefineParser
    }
}

#[derive(Debug, clap::Parser, Clone, Default)]
#[command(version, about)]
pub struct Args {
    /// Directory holding the annotated sources [default: srcr].
    #[arg(short, long)]
    pub input: Option<PathBuf>,
    /// Directory the generated R files are written to [default: R].
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Directory for generated testthat files [default: <output>/../tests/testthat].
    #[arg(long)]
    pub tests: Option<PathBuf>,
    /// Keep previously generated files in the output directory.
    #[arg(long)]
    pub noclean: bool,
    /// Rebuild whenever the input directory changes.
    #[arg(short, long)]
    pub watch: bool,
    /// Report top-level bindings that nothing uses.
    #[arg(long)]
    pub deadcode: bool,
    /// Annotate output lines with their source location.
    #[arg(long)]
    pub sourcemap: bool,
    /// `name[=val]`
    ///
    /// Define `name` to `val`. Without `=val` the name is only marked as defined.
    #[arg(short = 'D', long)]
    pub define: Vec<ArgumentDefine>,
    /// Header file or `package::path` to take definitions from.
    #[arg(long)]
    pub import: Vec<String>,
    /// Register an R function reading `#include:TYPE` files.
    #[arg(long, num_args = 2, value_names = ["TYPE", "FN"])]
    pub reader: Vec<String>,
    /// File whose contents start every generated file.
    #[arg(long)]
    pub prepend: Option<PathBuf>,
    /// File whose contents end every generated file.
    #[arg(long)]
    pub append: Option<PathBuf>,
    /// Plugin constructor, as `package::function`.
    #[arg(long)]
    pub plugin: Vec<String>,
    /// Package that must be installed for the build to run.
    #[arg(long)]
    pub depends: Vec<String>,
    /// Program used to evaluate R expressions.
    #[arg(long, default_value = "Rscript")]
    pub rscript: String,
    /// Write a commented builder.ini in the current directory.
    #[arg(long)]
    pub init: bool,
    /// Create a package skeleton called NAME.
    #[arg(long, value_name = "NAME")]
    pub create: Option<String>,
}

/// Command line merged over `builder.ini`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub input: PathBuf,
    pub output: PathBuf,
    pub tests: PathBuf,
    pub prepend: Option<PathBuf>,
    pub append: Option<PathBuf>,
    pub clean: bool,
    pub watch: bool,
    pub deadcode: bool,
    pub sourcemap: bool,
    pub defines: Vec<ArgumentDefine>,
    pub imports: Vec<String>,
    pub readers: Vec<(String, String)>,
    pub plugins: Vec<String>,
    pub depends: Vec<String>,
}

impl Settings {
    pub fn resolve(args: Args, config: Option<Config>) -> Self {
        let config = config.unwrap_or_default();
        let input = args.input.or(config.input).unwrap_or_else(|| "srcr".into());
        let output = args.output.or(config.output).unwrap_or_else(|| "R".into());
        let tests = args
            .tests
            .or(config.tests)
            .unwrap_or_else(|| output.join("..").join("tests").join("testthat"));

        // Lists accumulate, with command line entries last so their readers win.
        let mut readers = config.readers;
        readers.extend(
            args.reader
                .chunks_exact(2)
                .map(|pair| (pair[0].clone(), pair[1].clone())),
        );
        let mut imports = config.imports;
        imports.extend(args.import);
        let mut plugins = config.plugins;
        plugins.extend(args.plugin);
        let mut depends = config.depends;
        depends.extend(args.depends);

        Self {
            input,
            output,
            tests,
            prepend: args.prepend.or(config.prepend),
            append: args.append.or(config.append),
            clean: if args.noclean {
                false
            } else {
                config.clean.unwrap_or(true)
            },
            watch: args.watch || config.watch.unwrap_or(false),
            deadcode: args.deadcode || config.deadcode.unwrap_or(false),
            sourcemap: args.sourcemap || config.sourcemap.unwrap_or(false),
            defines: args.define,
            imports,
            readers,
            plugins,
            depends,
        }
    }
}

fn require_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::MissingDirectory(dir.to_path_buf())))
    }
}

fn read_optional(path: Option<&Path>) -> Result<Option<String>> {
    path.map(|path| {
        std::fs::read_to_string(path)
            .map_err(|e| Error::from(e).add_context(format!("reading {}", path.display())))
    })
    .transpose()
}

/// Fail unless every package in `depends` can be loaded by the host.
pub fn check_depends(host: &mut dyn HostEvaluator, depends: &[String]) -> Result<()> {
    for package in depends {
        let expr = format!(
            "requireNamespace({}, quietly = TRUE)",
            substitute::r_string_literal(package)
        );
        match host.eval_bool(&expr) {
            Ok(true) => log::debug!("check_depends() {package} available"),
            Ok(false) => return Err(Error::new(ErrorKind::MissingDependency(package.clone()))),
            Err(e) => {
                return Err(Error::new(ErrorKind::MissingDependency(package.clone())).with_source(e))
            }
        }
    }
    Ok(())
}

/// One full build of `settings.input` into `settings.output`. Returns the paths written.
pub fn build(
    settings: &Settings,
    host: &mut dyn HostEvaluator,
    plugins: &mut Plugins,
    clean: bool,
) -> Result<Vec<PathBuf>> {
    require_dir(&settings.input)?;
    require_dir(&settings.output)?;
    host.begin_build();
    if clean {
        source::clean(&settings.output, &settings.tests)?;
    }

    let mut registry = Registry::default();
    for (kind, function) in &settings.readers {
        registry.register(kind.as_str(), function.as_str());
    }

    let mut definitions = DefinitionStore::new();
    for define in &settings.defines {
        definitions.push(Definition::variable(
            define.name.as_str(),
            define.value.clone(),
        ));
    }

    let options = DriverOptions {
        tests_dir: settings.tests.clone(),
        sourcemap: settings.sourcemap,
        prepend: read_optional(settings.prepend.as_deref())?,
        append: read_optional(settings.append.as_deref())?,
    };

    let files = source::collect_files(&settings.input, &settings.output)?;
    let files = import::resolve(files, &settings.imports, &definitions, host)?;
    let written = Driver::new(definitions, host, plugins, &registry, &options).run(files)?;

    if settings.deadcode {
        let outputs: Vec<PathBuf> = written
            .iter()
            .filter(|path| !path.starts_with(&settings.tests))
            .cloned()
            .collect();
        let unused = deadcode::report(&outputs)?;
        log::info!("Dead code check found {} unused binding(s)", unused.len());
    }

    log::info!(target: "success", "Built {} file(s) into {}", written.len(), settings.output.display());
    Ok(written)
}

fn watch_loop(settings: &Settings, host: &mut dyn HostEvaluator, plugins: &mut Plugins) -> Result<()> {
    watch::install_signal_handlers();
    let mut watcher = watch::Watcher::new(&settings.input)?;
    loop {
        log::info!("Waiting for changes...");
        if !watcher.wait()? {
            log::info!("Stopping");
            return Err(Error::new(ErrorKind::Interrupted));
        }
        log::info!("Change detected, rebuilding...");
        if let Err(error) = build(settings, host, plugins, false) {
            log::error!("{error:#}");
        }
    }
}

pub fn run(args: Args) -> Result<()> {
    if args.init {
        return scaffold::init_config(Path::new("."));
    }
    if let Some(name) = &args.create {
        return scaffold::create_package(Path::new(name), name);
    }

    let config = Config::load(Path::new(config::FILE_NAME))?;
    let mut host = RscriptEvaluator::new(args.rscript.as_str());
    let settings = Settings::resolve(args, config);
    log::debug!("run() {settings:?}");

    check_depends(&mut host, &settings.depends)?;
    let mut plugins = Plugins::load(&mut host, &settings.plugins)?;

    let mut result = build(&settings, &mut host, &mut plugins, settings.clean).map(|_| ());
    if result.is_ok() && settings.watch {
        result = watch_loop(&settings, &mut host, &mut plugins);
    }

    plugins.call(&mut host, Hook::End, "", "");
    result
}
