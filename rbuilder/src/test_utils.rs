use std::collections::HashMap;

use crate::error::{Error, ErrorKind, Result};
use crate::host::HostEvaluator;

/// A host whose answers are scripted per expression. Unknown expressions fail.
#[derive(Default)]
pub struct MockHost {
    pub bools: HashMap<String, bool>,
    pub strings: HashMap<String, String>,
    /// `eval_raw` fails for any expression containing one of these.
    pub failing: Vec<String>,
    pub raw: Vec<String>,
    pub string_calls: Vec<String>,
}

impl MockHost {
    pub fn with_bool(mut self, expr: &str, value: bool) -> Self {
        self.bools.insert(expr.to_owned(), value);
        self
    }

    pub fn with_string(mut self, expr: &str, value: &str) -> Self {
        self.strings.insert(expr.to_owned(), value.to_owned());
        self
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.failing.push(needle.to_owned());
        self
    }
}

impl HostEvaluator for MockHost {
    fn eval_raw(&mut self, expr: &str) -> Result<()> {
        if self.failing.iter().any(|needle| expr.contains(needle.as_str())) {
            return Err(Error::new(ErrorKind::Host).add_context(format!("scripted failure: {expr}")));
        }
        self.raw.push(expr.to_owned());
        Ok(())
    }

    fn eval_bool(&mut self, expr: &str) -> Result<bool> {
        self.bools
            .get(expr.trim())
            .copied()
            .ok_or_else(|| Error::new(ErrorKind::Host).add_context(format!("unscripted {expr}")))
    }

    fn eval_string(&mut self, expr: &str) -> Result<Option<String>> {
        self.string_calls.push(expr.to_owned());
        match self.strings.get(expr) {
            Some(value) if value.is_empty() => Ok(None),
            Some(value) => Ok(Some(value.clone())),
            None => Err(Error::new(ErrorKind::Host).add_context(format!("unscripted {expr}"))),
        }
    }
}
