//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Turns the lines of one file into [`Event`]s: ordinary lines, definitions and captured blocks.
//! Conditional inclusion is applied here, so suppressed lines never produce an event.

use crate::conditional::ConditionalStack;
use crate::definitions::{DefinitionStore, Scope};
use crate::directive::Directive;
use crate::host::HostEvaluator;
use crate::substitute::{brace_delta, leading_identifier};
use crate::transform::expand::expand;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestBlock {
    pub description: String,
    /// Body lines with their line numbers in the source file.
    pub expressions: Vec<(usize, String)>,
}

impl TestBlock {
    pub fn is_empty(&self) -> bool {
        self.expressions.iter().all(|(_, e)| e.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A line to emit, with its line number.
    Line(usize, String),
    Define {
        name: String,
        value: Option<String>,
    },
    Unique(String),
    Macro {
        name: String,
        text: String,
        scope: Scope,
    },
    Import(String),
    Preflight {
        line: usize,
        body: String,
    },
    Test(TestBlock),
    Loop {
        var: String,
        start: i64,
        end: i64,
        body: Vec<(usize, String)>,
    },
    Error {
        line: usize,
        message: String,
    },
}

#[derive(Debug)]
enum Block {
    Macro {
        scope: Scope,
        lines: Vec<String>,
        depth: i64,
        opened: bool,
    },
    Test(TestBlock),
    Preflight {
        line: usize,
        lines: Vec<String>,
    },
    Loop {
        var: String,
        start: i64,
        end: i64,
        depth: usize,
        body: Vec<(usize, String)>,
    },
}

impl Block {
    fn directive_name(&self) -> &'static str {
        match self {
            Block::Macro { .. } => "#macro",
            Block::Test(_) => "#test",
            Block::Preflight { .. } => "#preflight",
            Block::Loop { .. } => "#for",
        }
    }
}

/// Outcomes of conditional directives, recorded by the first pass over a file and replayed by
/// the second so both passes agree on which lines are live.
#[derive(Debug)]
enum Decisions {
    Record(Vec<bool>),
    Replay(std::vec::IntoIter<bool>),
}

#[derive(Debug)]
pub struct LineScanner {
    file: String,
    namespace: Option<String>,
    conditionals: ConditionalStack,
    block: Option<Block>,
    decisions: Decisions,
}

impl LineScanner {
    pub fn new(file: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            file: file.into(),
            namespace,
            conditionals: ConditionalStack::new(),
            block: None,
            decisions: Decisions::Record(Vec::new()),
        }
    }

    /// A scanner that takes conditional outcomes from an earlier scan instead of evaluating them.
    pub fn replay(file: impl Into<String>, namespace: Option<String>, decisions: Vec<bool>) -> Self {
        Self {
            decisions: Decisions::Replay(decisions.into_iter()),
            ..Self::new(file, namespace)
        }
    }

    /// Name a definition from this file is registered under.
    pub fn qualify(&self, name: &str) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}::{name}"),
            None => name.to_owned(),
        }
    }

    fn decide(&mut self, evaluate: impl FnOnce() -> bool) -> bool {
        match &mut self.decisions {
            Decisions::Replay(recorded) => recorded.next().unwrap_or(false),
            Decisions::Record(recorded) => {
                let value = evaluate();
                recorded.push(value);
                value
            }
        }
    }

    fn is_defined(&self, name: &str, definitions: &DefinitionStore) -> bool {
        definitions.contains(name) || definitions.contains(&self.qualify(name))
    }

    pub fn feed(
        &mut self,
        number: usize,
        line: &str,
        definitions: &DefinitionStore,
        host: &mut dyn HostEvaluator,
    ) -> Option<Event> {
        if self.block.is_some() {
            return self.feed_block(number, line);
        }

        let Some(directive) = Directive::parse(line) else {
            return self
                .conditionals
                .is_active()
                .then(|| Event::Line(number, line.to_owned()));
        };
        log::trace!("{}:{number}: {directive:?}", self.file);

        match directive {
            Directive::Ifdef(name) | Directive::Ifndef(name) => {
                let negate = matches!(directive, Directive::Ifndef(_));
                let condition = if self.conditionals.is_active() {
                    let defined = self.is_defined(name, definitions);
                    self.decide(|| defined != negate)
                } else {
                    false
                };
                self.conditionals.push(condition);
                None
            }
            Directive::If(expr) => {
                let condition = if self.conditionals.is_active() {
                    match &mut self.decisions {
                        Decisions::Replay(recorded) => recorded.next().unwrap_or(false),
                        Decisions::Record(recorded) => {
                            let expr = expand(expr.to_owned(), definitions);
                            let value = host.eval_bool(&expr).unwrap_or_else(|error| {
                                log::error!(
                                    "{}:{number}: #if {expr} is treated as false: {error}",
                                    self.file
                                );
                                false
                            });
                            recorded.push(value);
                            value
                        }
                    }
                } else {
                    false
                };
                self.conditionals.push(condition);
                None
            }
            Directive::Elif(name) => {
                let condition = if self.conditionals.wants_elif() {
                    let defined = self.is_defined(name, definitions);
                    self.decide(|| defined)
                } else {
                    false
                };
                if !self.conditionals.elif(condition) {
                    log::warn!("{}:{number}: #elif without #if", self.file);
                }
                None
            }
            Directive::Else => {
                if !self.conditionals.else_branch() {
                    log::warn!("{}:{number}: #else without #if", self.file);
                }
                None
            }
            Directive::Endif => {
                if !self.conditionals.endif() {
                    log::warn!("{}:{number}: #endif without #if, ignoring it", self.file);
                }
                None
            }
            _ if !self.conditionals.is_active() => None,
            Directive::Define { name, value } => Some(Event::Define {
                name: self.qualify(name),
                value: value.map(str::to_owned),
            }),
            Directive::Unique(name) => Some(Event::Unique(self.qualify(name))),
            Directive::Import(spec) => Some(Event::Import(spec.to_owned())),
            Directive::Error(message) => Some(Event::Error {
                line: number,
                message: message.to_owned(),
            }),
            Directive::Macro(scope) => {
                self.block = Some(Block::Macro {
                    scope,
                    lines: Vec::new(),
                    depth: 0,
                    opened: false,
                });
                None
            }
            Directive::Test(description) => {
                self.block = Some(Block::Test(TestBlock {
                    description: description.to_owned(),
                    expressions: Vec::new(),
                }));
                None
            }
            Directive::Preflight => {
                self.block = Some(Block::Preflight {
                    line: number,
                    lines: Vec::new(),
                });
                None
            }
            Directive::For { var, start, end } => {
                self.block = Some(Block::Loop {
                    var: var.to_owned(),
                    start,
                    end,
                    depth: 1,
                    body: Vec::new(),
                });
                None
            }
            // A macro closed by its braces may still be followed by `#endmacro`.
            Directive::EndMacro => None,
            Directive::EndTest | Directive::EndPreflight | Directive::EndFor => {
                log::warn!("{}:{number}: {} without an opening directive", self.file, line.trim());
                None
            }
        }
    }

    fn feed_block(&mut self, number: usize, line: &str) -> Option<Event> {
        let directive = Directive::parse(line);
        let block = self.block.as_mut()?;
        let finished = match block {
            Block::Macro {
                lines,
                depth,
                opened,
                ..
            } => {
                if directive == Some(Directive::EndMacro) {
                    true
                } else {
                    *depth += brace_delta(line);
                    *opened |= line.contains('{');
                    lines.push(line.to_owned());
                    *opened && *depth <= 0
                }
            }
            Block::Test(test) => {
                if directive == Some(Directive::EndTest) {
                    true
                } else {
                    test.expressions.push((number, line.to_owned()));
                    false
                }
            }
            Block::Preflight { lines, .. } => {
                if directive == Some(Directive::EndPreflight) {
                    true
                } else {
                    lines.push(line.to_owned());
                    false
                }
            }
            Block::Loop { depth, body, .. } => {
                match directive {
                    Some(Directive::For { .. }) => *depth += 1,
                    Some(Directive::EndFor) => *depth -= 1,
                    _ => {}
                }
                if *depth == 0 {
                    true
                } else {
                    body.push((number, line.to_owned()));
                    false
                }
            }
        };
        if !finished {
            return None;
        }

        match self.block.take()? {
            Block::Macro { scope, lines, .. } => {
                let text = lines.join("\n");
                let Some(name) = leading_identifier(&text) else {
                    log::warn!("{}:{number}: #macro block without a macro name", self.file);
                    return None;
                };
                let name = self.qualify(name);
                Some(Event::Macro { name, text, scope })
            }
            Block::Test(test) if test.is_empty() => {
                log::debug!("{}: skipping empty test {:?}", self.file, test.description);
                None
            }
            Block::Test(test) => Some(Event::Test(test)),
            Block::Preflight { line, lines } => Some(Event::Preflight {
                line,
                body: lines.join("\n"),
            }),
            Block::Loop {
                var,
                start,
                end,
                body,
                ..
            } => Some(Event::Loop {
                var,
                start,
                end,
                body,
            }),
        }
    }

    /// End of file. Warns about anything left open and hands back the recorded decisions.
    pub fn finish(self) -> Vec<bool> {
        if self.conditionals.depth() > 0 {
            log::warn!(
                "{}: {} unterminated #if directive(s)",
                self.file,
                self.conditionals.depth()
            );
        }
        if let Some(block) = &self.block {
            log::warn!(
                "{}: unterminated {} block, its contents are dropped",
                self.file,
                block.directive_name()
            );
        }
        match self.decisions {
            Decisions::Record(recorded) => recorded,
            Decisions::Replay(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::definitions::Definition;
    use crate::test_utils::MockHost;
    use test_log::test;

    fn scan(
        source: &str,
        definitions: &DefinitionStore,
        host: &mut MockHost,
    ) -> (Vec<Event>, Vec<bool>) {
        let mut scanner = LineScanner::new("main.R", None);
        let events = source
            .lines()
            .enumerate()
            .filter_map(|(i, line)| scanner.feed(i + 1, line, definitions, host))
            .collect();
        (events, scanner.finish())
    }

    fn lines(events: &[Event]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::Line(_, line) => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_ifdef_else_emits_one_branch() {
        let source = "#ifdef A\nyes\n#else\nno\n#endif\nafter";
        let mut host = MockHost::default();

        let empty = DefinitionStore::new();
        let (events, _) = scan(source, &empty, &mut host);
        assert_eq!(lines(&events), vec!["no", "after"]);

        let mut defined = DefinitionStore::new();
        defined.push(Definition::variable("A", None));
        let (events, _) = scan(source, &defined, &mut host);
        assert_eq!(lines(&events), vec!["yes", "after"]);
    }

    #[test]
    fn test_if_uses_host_and_errors_are_false() {
        let source = "#if N > 1\nbig\n#endif\n#if broken(\nnever\n#else\nfallback\n#endif";
        let mut definitions = DefinitionStore::new();
        definitions.push(Definition::variable("N", Some("3".to_owned())));
        let mut host = MockHost::default().with_bool("3 > 1", true);
        let (events, decisions) = scan(source, &definitions, &mut host);
        assert_eq!(lines(&events), vec!["big", "fallback"]);
        assert_eq!(decisions, vec![true, false]);
    }

    #[test]
    fn test_if_not_evaluated_under_inactive_parent() {
        let source = "#ifdef MISSING\n#if stop()\nx\n#endif\n#endif";
        let mut host = MockHost::default();
        let (events, decisions) = scan(source, &DefinitionStore::new(), &mut host);
        assert!(events.is_empty());
        assert_eq!(decisions, vec![false]);
    }

    #[test]
    fn test_replay_does_not_evaluate() {
        let source = "#if anything\nyes\n#else\nno\n#endif";
        let mut host = MockHost::default();
        let definitions = DefinitionStore::new();
        let mut scanner = LineScanner::replay("main.R", None, vec![true]);
        let events: Vec<Event> = source
            .lines()
            .enumerate()
            .filter_map(|(i, line)| scanner.feed(i + 1, line, &definitions, &mut host))
            .collect();
        assert_eq!(lines(&events), vec!["yes"]);
    }

    #[test]
    fn test_elif_chain() {
        let source = "#ifdef A\na\n#elif B\nb\n#elif C\nc\n#else\nd\n#endif";
        let mut definitions = DefinitionStore::new();
        definitions.push(Definition::variable("B", None));
        definitions.push(Definition::variable("C", None));
        let (events, _) = scan(source, &definitions, &mut MockHost::default());
        assert_eq!(lines(&events), vec!["b"]);
    }

    #[test]
    fn test_stray_endif_ignored() {
        let (events, _) = scan("#endif\nx", &DefinitionStore::new(), &mut MockHost::default());
        assert_eq!(lines(&events), vec!["x"]);
    }

    #[test]
    fn test_macro_block_by_brace_depth() {
        let source = "#macro local\nSQ(x) {\n  .x * .x\n}\ny <- SQ(2)";
        let (events, _) = scan(source, &DefinitionStore::new(), &mut MockHost::default());
        assert_eq!(
            events[0],
            Event::Macro {
                name: "SQ".to_owned(),
                text: "SQ(x) {\n  .x * .x\n}".to_owned(),
                scope: Scope::Local,
            }
        );
        assert_eq!(events[1], Event::Line(5, "y <- SQ(2)".to_owned()));
    }

    #[test]
    fn test_macro_block_until_endmacro() {
        let source = "#> macro\nM <- function(a)\n{\n  .a\n}\n#> endmacro";
        let (events, _) = scan(source, &DefinitionStore::new(), &mut MockHost::default());
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Event::Macro { name, scope: Scope::Global, .. } if name == "M"));
    }

    #[test]
    fn test_namespaced_definitions() {
        let mut scanner = LineScanner::new("pkg/inst/defs.rh", Some("pkg".to_owned()));
        let mut host = MockHost::default();
        let event = scanner.feed(1, "#define N 1", &DefinitionStore::new(), &mut host);
        assert_eq!(
            event,
            Some(Event::Define {
                name: "pkg::N".to_owned(),
                value: Some("1".to_owned())
            })
        );
    }

    #[test]
    fn test_test_blocks() {
        let source = "#test \"adds\"\nexpect_equal(1 + 1, 2)\n#endtest\n#test empty\n\n#endtest";
        let (events, _) = scan(source, &DefinitionStore::new(), &mut MockHost::default());
        assert_eq!(
            events,
            vec![Event::Test(TestBlock {
                description: "adds".to_owned(),
                expressions: vec![(2, "expect_equal(1 + 1, 2)".to_owned())],
            })]
        );
    }

    #[test]
    fn test_nested_for_captured_whole() {
        let source = "#for i in 1:2\n#for j in 1:2\nx..i....j..\n#endfor\n#endfor\nend";
        let (events, _) = scan(source, &DefinitionStore::new(), &mut MockHost::default());
        assert_eq!(events.len(), 2);
        let Event::Loop { var, start, end, body } = &events[0] else {
            panic!("expected a loop, got {:?}", events[0]);
        };
        assert_eq!((var.as_str(), *start, *end), ("i", 1, 2));
        assert_eq!(body.len(), 3);
        assert_eq!(events[1], Event::Line(6, "end".to_owned()));
    }

    #[test]
    fn test_preflight_and_error() {
        let source = "#preflight\nlibrary(stats)\n#endflight\n#error stop here";
        let (events, _) = scan(source, &DefinitionStore::new(), &mut MockHost::default());
        assert_eq!(
            events,
            vec![
                Event::Preflight {
                    line: 1,
                    body: "library(stats)".to_owned()
                },
                Event::Error {
                    line: 4,
                    message: "stop here".to_owned()
                },
            ]
        );
    }

    #[test]
    fn test_directives_in_inactive_region_ignored() {
        let source = "#ifdef NOPE\n#error unreachable\n#define X 1\n#endif";
        let (events, _) = scan(source, &DefinitionStore::new(), &mut MockHost::default());
        assert!(events.is_empty());
    }
}
