//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Waiting for changes under the input directory in `--watch` mode.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use notify_debouncer_full::notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};

use crate::error::{Error, ErrorKind, Result};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// How often a blocked [`Watcher::wait`] looks at the interrupt flag.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Quiet period that groups an editor's write-rename sequence into one change.
const DEBOUNCE: Duration = Duration::from_millis(200);

extern "C" fn handler(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to the interrupt flag.
pub fn install_signal_handlers() {
    for signal in [libc::SIGINT, libc::SIGTERM] {
        unsafe {
            let mut sig_action = std::mem::MaybeUninit::<libc::sigaction>::zeroed();
            let p_sa = sig_action.as_mut_ptr();
            (*p_sa).sa_sigaction = handler as extern "C" fn(libc::c_int) as usize;
            (*p_sa).sa_flags = 0;
            libc::sigemptyset(&mut (*p_sa).sa_mask);
            let sig_action = sig_action.assume_init();
            libc::sigaction(signal, &sig_action, std::ptr::null_mut());
        }
    }
}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

fn watch_error(error: notify_debouncer_full::notify::Error) -> Error {
    Error::new(ErrorKind::Io).with_source(error)
}

/// Recursive watch over a directory tree.
pub struct Watcher {
    // Watching stops when this is dropped.
    _debouncer: Debouncer<RecommendedWatcher, FileIdMap>,
    events: Receiver<DebounceEventResult>,
}

impl Watcher {
    pub fn new(root: &Path) -> Result<Self> {
        let (tx, events) = mpsc::channel();
        let mut debouncer = new_debouncer(DEBOUNCE, None, tx).map_err(watch_error)?;
        debouncer
            .watcher()
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| watch_error(e).add_context(format!("watching {}", root.display())))?;
        log::debug!("Watcher::new() watching {}", root.display());
        Ok(Self {
            _debouncer: debouncer,
            events,
        })
    }

    /// Block until something changes. Returns `false` when interrupted by a signal.
    pub fn wait(&mut self) -> Result<bool> {
        loop {
            if interrupted() {
                return Ok(false);
            }
            match self.events.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(events)) => {
                    let changed = events
                        .iter()
                        .filter(|event| !matches!(event.kind, EventKind::Access(_)))
                        .inspect(|event| {
                            log::debug!("Watcher::wait() {:?} {:?}", event.kind, event.paths)
                        })
                        .count();
                    if changed > 0 {
                        return Ok(true);
                    }
                }
                Ok(Err(errors)) => {
                    for error in errors {
                        log::warn!("watch error: {error}");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::new(ErrorKind::Io).add_context("file watcher stopped"));
                }
            }
        }
    }
}
