//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use crate::substitute::r_string_literal;

pub const FILE: &str = "..FILE..";
pub const LINE: &str = "..LINE..";
pub const COUNTER: &str = "..COUNTER..";
pub const DATE: &str = "..DATE..";
pub const TIME: &str = "..TIME..";
pub const OS: &str = "..OS..";

/// Value held by built-ins that are only known once a line is being emitted.
pub const DYNAMIC: &str = "\0dynamic";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Variable,
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    Global,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    /// For a [`Kind::Function`] this is the full macro text, signature and braced body.
    pub value: Option<String>,
    pub kind: Kind,
    pub scope: Scope,
}

impl Definition {
    pub fn variable(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
            kind: Kind::Variable,
            scope: Scope::Global,
        }
    }

    pub fn function(name: impl Into<String>, text: String, scope: Scope) -> Self {
        Self {
            name: name.into(),
            value: Some(text),
            kind: Kind::Function,
            scope,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.value.as_deref() == Some(DYNAMIC)
    }

    /// The value to substitute for a variable, if it has one yet.
    pub fn substitution(&self) -> Option<&str> {
        match (&self.kind, self.value.as_deref()) {
            (Kind::Variable, Some(value)) if !self.is_dynamic() => Some(value),
            _ => None,
        }
    }
}

/// The definition table for one build. Insertion order is kept, lookups return the first match.
#[derive(Debug, Clone)]
pub struct DefinitionStore {
    definitions: Vec<Definition>,
    unique: usize,
}

impl Default for DefinitionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DefinitionStore {
    pub fn new() -> Self {
        let now = chrono::Local::now();
        let definitions = vec![
            Definition::variable(FILE, Some(DYNAMIC.to_owned())),
            Definition::variable(LINE, Some(DYNAMIC.to_owned())),
            Definition::variable(COUNTER, Some("0".to_owned())),
            Definition::variable(
                DATE,
                Some(r_string_literal(&now.format("%Y-%m-%d").to_string())),
            ),
            Definition::variable(
                TIME,
                Some(r_string_literal(&now.format("%H:%M:%S").to_string())),
            ),
            Definition::variable(OS, Some(r_string_literal(std::env::consts::OS))),
        ];
        Self {
            definitions,
            unique: 0,
        }
    }

    /// Add a definition. Returns `false`, and keeps the existing entry, when the name is taken.
    pub fn push(&mut self, definition: Definition) -> bool {
        if self.contains(&definition.name) {
            log::warn!(
                "{:?} is already defined, ignoring the new definition",
                definition.name
            );
            return false;
        }
        log::debug!(
            "DefinitionStore::push() {:?} {:?} {:?}",
            definition.name,
            definition.kind,
            definition.value
        );
        self.definitions.push(definition);
        true
    }

    /// Replace the value of an existing definition. Absent names are ignored.
    pub fn overwrite(&mut self, name: &str, value: impl Into<String>) {
        if let Some(definition) = self.definitions.iter_mut().find(|d| d.name == name) {
            definition.value = Some(value.into());
        }
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.iter()
    }

    pub fn functions(&self) -> impl Iterator<Item = &Definition> {
        self.definitions
            .iter()
            .filter(|d| d.kind == Kind::Function)
    }

    /// Bump `..COUNTER..` when `line` is about to use it, so each use sees a fresh number.
    pub fn increment_counter(&mut self, line: &str) {
        if !line.contains(COUNTER) {
            return;
        }
        let next = self
            .get(COUNTER)
            .and_then(|d| d.value.as_deref())
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(1, |n| n + 1);
        self.overwrite(COUNTER, next.to_string());
    }

    /// Point `..FILE..` and `..LINE..` at the line about to be emitted.
    pub fn set_location(&mut self, file: &str, line: usize) {
        self.overwrite(FILE, r_string_literal(file));
        self.overwrite(LINE, line.to_string());
    }

    /// A fresh name for `#unique`, never repeated within this build.
    pub fn next_unique(&mut self) -> String {
        self.unique += 1;
        format!("._unq.{}", self.unique)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn test_builtins_seeded() {
        let store = DefinitionStore::new();
        for name in [FILE, LINE, COUNTER, DATE, TIME, OS] {
            assert!(store.contains(name), "missing {name}");
        }
        assert!(store.get(FILE).unwrap().is_dynamic());
        assert_eq!(store.get(FILE).unwrap().substitution(), None);
        assert_eq!(store.get(COUNTER).unwrap().substitution(), Some("0"));

        let date = store.get(DATE).unwrap().substitution().unwrap();
        assert_eq!(date.len(), "\"2024-01-01\"".len());
        assert!(date.starts_with('"') && date.ends_with('"'));
        let os = store.get(OS).unwrap().substitution().unwrap();
        assert_eq!(os, format!("\"{}\"", std::env::consts::OS));
    }

    #[test]
    fn test_push_rejects_duplicate() {
        let mut store = DefinitionStore::new();
        assert!(store.push(Definition::variable("N", Some("10".to_owned()))));
        assert!(!store.push(Definition::variable("N", Some("20".to_owned()))));
        assert_eq!(store.get("N").unwrap().value.as_deref(), Some("10"));
    }

    #[test]
    fn test_overwrite_absent_is_noop() {
        let mut store = DefinitionStore::new();
        let before = store.iter().count();
        store.overwrite("MISSING", "1");
        assert_eq!(store.iter().count(), before);
        assert!(!store.contains("MISSING"));
    }

    #[test]
    fn test_increment_counter_only_when_referenced() {
        let mut store = DefinitionStore::new();
        store.increment_counter("x <- 1");
        assert_eq!(store.get(COUNTER).unwrap().substitution(), Some("0"));
        store.increment_counter("id <- ..COUNTER..");
        store.increment_counter("id <- ..COUNTER..");
        assert_eq!(store.get(COUNTER).unwrap().substitution(), Some("2"));
    }

    #[test]
    fn test_set_location() {
        let mut store = DefinitionStore::new();
        store.set_location("srcr/main.R", 12);
        assert_eq!(
            store.get(FILE).unwrap().substitution(),
            Some("\"srcr/main.R\"")
        );
        assert_eq!(store.get(LINE).unwrap().substitution(), Some("12"));
    }

    #[test]
    fn test_unique_names() {
        let mut store = DefinitionStore::new();
        assert_eq!(store.next_unique(), "._unq.1");
        assert_eq!(store.next_unique(), "._unq.2");
    }
}
