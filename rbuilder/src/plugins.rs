//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Plugins are R objects built by calling a constructor such as `mypkg::plugin`. They may
//! provide any of the hook methods, a missing method simply declines.

use crate::error::{Error, ErrorKind, Result};
use crate::host::HostEvaluator;
use crate::substitute::r_string_literal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// Raw file content before the first pass.
    Preprocess,
    /// Generated output before it is written.
    Postprocess,
    /// An `#include:` line, before the reader registry is consulted.
    Include,
    /// Once, when the program finishes.
    End,
}

impl Hook {
    fn method(&self) -> &'static str {
        match self {
            Hook::Preprocess => "preprocess",
            Hook::Postprocess => "postprocess",
            Hook::Include => "include",
            Hook::End => "end",
        }
    }
}

#[derive(Debug)]
struct Plugin {
    name: String,
    alive: bool,
}

#[derive(Debug, Default)]
pub struct Plugins {
    plugins: Vec<Plugin>,
}

impl Plugins {
    /// Construct every plugin and run its `setup` method. Any failure is fatal.
    pub fn load(host: &mut dyn HostEvaluator, names: &[String]) -> Result<Self> {
        let mut plugins = Vec::with_capacity(names.len());
        for name in names {
            let expr = format!(
                "`{name}` <- {name}()\n\
                 if (is.function(`{name}`$setup)) `{name}`$setup()"
            );
            host.eval_raw(&expr)
                .map_err(|e| Error::new(ErrorKind::Plugin(name.clone())).with_source(e))?;
            log::info!("Loaded plugin {name}");
            plugins.push(Plugin {
                name: name.clone(),
                alive: true,
            });
        }
        Ok(Self { plugins })
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Offer `text` from `file` to every live plugin.
    ///
    /// For [`Hook::Include`] the first plugin that answers wins. The other hooks thread the text
    /// through each plugin in turn. Returns `None` when no plugin changed anything. A plugin that
    /// fails is skipped for the rest of the run.
    pub fn call(
        &mut self,
        host: &mut dyn HostEvaluator,
        hook: Hook,
        text: &str,
        file: &str,
    ) -> Option<String> {
        let mut current: Option<String> = None;
        for plugin in self.plugins.iter_mut().filter(|p| p.alive) {
            let input = current.as_deref().unwrap_or(text);
            let expr = format!(
                "if (is.function(`{name}`${method})) `{name}`${method}({text}, {file})",
                name = plugin.name,
                method = hook.method(),
                text = r_string_literal(input),
                file = r_string_literal(file),
            );
            match host.eval_string(&expr) {
                Ok(Some(result)) => {
                    log::debug!("Plugins::call() {} handled {:?}", plugin.name, hook);
                    current = Some(result);
                    if hook == Hook::Include {
                        break;
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    log::error!(
                        "Plugin {} failed in {}, disabling it: {error}",
                        plugin.name,
                        hook.method()
                    );
                    plugin.alive = false;
                }
            }
        }
        current
    }
}
