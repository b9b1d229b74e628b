//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Conditional inclusion: `#ifdef`, `#ifndef`, `#if`, `#elif`, `#else`, `#endif`.

/// State of one `#if` chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondState {
    /// In a taken branch, lines are emitted
    Active,
    /// In a branch not (yet) taken
    Skipping,
    /// A branch was already taken, skip the rest of the chain
    Done,
}

#[derive(Debug, Clone)]
struct Frame {
    state: CondState,
    /// Has any branch of this chain been taken?
    branch_taken: bool,
}

/// Stack of open conditional chains for one file.
#[derive(Debug, Default)]
pub struct ConditionalStack {
    frames: Vec<Frame>,
}

impl ConditionalStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether lines at the current position are emitted.
    pub fn is_active(&self) -> bool {
        self.frames
            .last()
            .map(|f| f.state == CondState::Active)
            .unwrap_or(true)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Open a chain whose first branch is `condition`.
    pub fn push(&mut self, condition: bool) {
        let parent_skipping = !self.is_active();
        let state = if !parent_skipping && condition {
            CondState::Active
        } else {
            CondState::Skipping
        };
        self.frames.push(Frame {
            state,
            // Under an inactive parent no later branch may activate either.
            branch_taken: parent_skipping || condition,
        });
    }

    /// Whether an `#elif` condition at this point needs evaluating at all.
    pub fn wants_elif(&self) -> bool {
        self.frames
            .last()
            .is_some_and(|f| f.state == CondState::Skipping && !f.branch_taken)
    }

    /// Returns `false` if there is no open chain.
    pub fn elif(&mut self, condition: bool) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        match frame.state {
            CondState::Active => {
                frame.state = CondState::Done;
                frame.branch_taken = true;
            }
            CondState::Skipping => {
                if !frame.branch_taken && condition {
                    frame.state = CondState::Active;
                    frame.branch_taken = true;
                }
            }
            CondState::Done => {}
        }
        true
    }

    /// Returns `false` if there is no open chain.
    pub fn else_branch(&mut self) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        match frame.state {
            CondState::Active => {
                frame.state = CondState::Done;
            }
            CondState::Skipping => {
                if frame.branch_taken {
                    frame.state = CondState::Done;
                } else {
                    frame.state = CondState::Active;
                    frame.branch_taken = true;
                }
            }
            CondState::Done => {}
        }
        true
    }

    /// Returns `false` if there is no open chain.
    pub fn endif(&mut self) -> bool {
        self.frames.pop().is_some()
    }
}
