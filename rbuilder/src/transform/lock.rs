//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use super::{LineTransform, TransformContext};
use crate::substitute::{find_unquoted, indentation, is_identifier_char};

const OPERATOR: &str = "-<";

/// `name -< value` assigns and then locks the binding in the current environment.
pub struct LockTransform;

impl LineTransform for LockTransform {
    fn apply(&self, line: String, _cx: &mut TransformContext) -> String {
        if !line.contains(OPERATOR) {
            return line;
        }
        line.split('\n').map(lock_line).collect::<Vec<_>>().join("\n")
    }
}

fn lock_line(line: &str) -> String {
    let Some(at) = find_unquoted(line, OPERATOR) else {
        return line.to_owned();
    };
    let indent = indentation(line);
    let name = line[indent.len()..at].trim();
    let value = line[at + OPERATOR.len()..].trim();
    if name.is_empty() || value.is_empty() || !name.chars().all(is_identifier_char) {
        return line.to_owned();
    }
    format!("{indent}{name} <- {value}; lockBinding(\"{name}\", environment())")
}
