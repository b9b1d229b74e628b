//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::io::Write;

use clap::Parser;
use rbuilder::error::{ErrorKind, GetExitCode};

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let tag = match record.level() {
                _ if record.target() == "success" => "SUCCESS",
                log::Level::Error => "ERROR",
                log::Level::Warn => "WARNING",
                log::Level::Info => "INFO",
                log::Level::Debug => "DEBUG",
                log::Level::Trace => "TRACE",
            };
            writeln!(buf, "[{tag}] {}", record.args())
        })
        .init();
}

fn main() {
    init_logger();
    let args = rbuilder::Args::parse();

    let result = rbuilder::run(args);
    if let Err(error) = &result {
        if !matches!(error.kind, ErrorKind::Interrupted) {
            log::error!("{error:#}");
        }
    }
    std::process::exit(result.get_exit_code());
}
