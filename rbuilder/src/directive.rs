//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use crate::definitions::Scope;

/// A recognised directive line. `#keyword` and `#> keyword` are the same directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<'a> {
    Define {
        name: &'a str,
        value: Option<&'a str>,
    },
    /// `#macro [local|global]`, the macro text follows on the next lines.
    Macro(Scope),
    EndMacro,
    Ifdef(&'a str),
    Ifndef(&'a str),
    If(&'a str),
    Elif(&'a str),
    Else,
    Endif,
    Import(&'a str),
    Test(&'a str),
    EndTest,
    Preflight,
    EndPreflight,
    Error(&'a str),
    Unique(&'a str),
    For {
        var: &'a str,
        start: i64,
        end: i64,
    },
    EndFor,
}

impl<'a> Directive<'a> {
    /// Recognise `line` as a directive. Any other line, including `#` comments and `#include:`,
    /// gives `None`.
    pub fn parse(line: &'a str) -> Option<Self> {
        let body = line.trim().strip_prefix('#')?;
        let body = match body.strip_prefix('>') {
            Some(alternate) => alternate.trim_start(),
            None => body,
        };
        let keyword_len = body
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(body.len());
        let (keyword, rest) = body.split_at(keyword_len);
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let rest = rest.trim();

        let directive = match keyword {
            "define" => {
                let (name, value) = match rest.split_once(char::is_whitespace) {
                    Some((name, value)) => (name, Some(value.trim())),
                    None => (rest, None),
                };
                if name.is_empty() {
                    log::warn!("#define without a name: {line}");
                    return None;
                }
                Directive::Define {
                    name,
                    value: value.filter(|v| !v.is_empty()),
                }
            }
            "macro" => match rest {
                "local" => Directive::Macro(Scope::Local),
                "" | "global" => Directive::Macro(Scope::Global),
                other => {
                    log::warn!("Unknown macro scope {other:?}, using global");
                    Directive::Macro(Scope::Global)
                }
            },
            "endmacro" => Directive::EndMacro,
            "ifdef" => Directive::Ifdef(first_word(rest)),
            "ifndef" => Directive::Ifndef(first_word(rest)),
            "if" => Directive::If(rest),
            "elif" => Directive::Elif(first_word(rest)),
            "else" => Directive::Else,
            "endif" => Directive::Endif,
            "import" => Directive::Import(first_word(rest)),
            "test" => Directive::Test(unquote(rest)),
            "endtest" => Directive::EndTest,
            "preflight" => Directive::Preflight,
            "endpreflight" | "endflight" => Directive::EndPreflight,
            "error" => Directive::Error(rest),
            "unique" => Directive::Unique(first_word(rest)),
            "for" => parse_for(rest).or_else(|| {
                log::warn!("Expected `#for VAR in START:END`, got: {line}");
                None
            })?,
            "endfor" => Directive::EndFor,
            _ => return None,
        };
        Some(directive)
    }
}

fn first_word(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or("")
}

fn unquote(text: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|t| t.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

fn parse_for(rest: &str) -> Option<Directive<'_>> {
    let mut words = rest.split_whitespace();
    let var = words.next()?;
    if words.next()? != "in" {
        return None;
    }
    let (start, end) = words.next()?.split_once(':')?;
    Some(Directive::For {
        var,
        start: start.parse().ok()?,
        end: end.parse().ok()?,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn test_define() {
        assert_eq!(
            Directive::parse("#define N 10 * 2"),
            Some(Directive::Define {
                name: "N",
                value: Some("10 * 2")
            })
        );
        assert_eq!(
            Directive::parse("  #define DEBUG  "),
            Some(Directive::Define {
                name: "DEBUG",
                value: None
            })
        );
    }

    #[test]
    fn test_alternate_marker() {
        assert_eq!(
            Directive::parse("#> define N 1"),
            Directive::parse("#define N 1")
        );
        assert_eq!(
            Directive::parse("#> macro local"),
            Some(Directive::Macro(Scope::Local))
        );
        assert_eq!(Directive::parse("#>endflight"), Some(Directive::EndPreflight));
    }

    #[test]
    fn test_whole_keyword_only() {
        assert_eq!(Directive::parse("#ifdef X"), Some(Directive::Ifdef("X")));
        assert_eq!(Directive::parse("#if X > 1"), Some(Directive::If("X > 1")));
        assert_eq!(Directive::parse("#iffy"), None);
        assert_eq!(Directive::parse("#include:csv a.csv x"), None);
        assert_eq!(Directive::parse("# a comment"), None);
        assert_eq!(Directive::parse("x <- 1 # define"), None);
    }

    #[test]
    fn test_test_description() {
        assert_eq!(
            Directive::parse("#test \"adds numbers\""),
            Some(Directive::Test("adds numbers"))
        );
        assert_eq!(Directive::parse("#test plain"), Some(Directive::Test("plain")));
    }

    #[test]
    fn test_for() {
        assert_eq!(
            Directive::parse("#for i in 1:3"),
            Some(Directive::For {
                var: "i",
                start: 1,
                end: 3
            })
        );
        assert_eq!(Directive::parse("#for i in a:b"), None);
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            Directive::parse("#error Not supported on this platform"),
            Some(Directive::Error("Not supported on this platform"))
        );
    }
}
