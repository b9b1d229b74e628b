//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use super::{LineTransform, TransformContext};

/// Appends ` # <file>:<line>` so generated code can be traced back to its source. Blank lines and
/// lines that already contain a `#` are left alone.
pub struct SourceMapTransform;

impl LineTransform for SourceMapTransform {
    fn apply(&self, line: String, cx: &mut TransformContext) -> String {
        if !cx.sourcemap {
            return line;
        }
        let annotation = format!(" # {}:{}", cx.file, cx.line_number);
        line.split('\n')
            .map(|l| {
                if l.trim().is_empty() || l.contains('#') {
                    l.to_owned()
                } else {
                    format!("{l}{annotation}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
