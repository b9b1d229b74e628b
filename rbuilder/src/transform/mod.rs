//
// Copyright (c) 2024 rbuilder contributors
//
// This file is part of the rbuilder project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! The per-line transform chain. Every emitted line passes through each [`Transform`] in
//! declaration order.

mod destructure;
pub mod expand;
mod include;
mod interpolate;
mod lock;
mod sourcemap;

use destructure::DestructureTransform;
use expand::ExpandTransform;
use include::IncludeTransform;
use interpolate::InterpolateTransform;
use lock::LockTransform;
use sourcemap::SourceMapTransform;

pub use include::Registry;

use crate::definitions::DefinitionStore;
use crate::host::HostEvaluator;
use crate::plugins::Plugins;

/// Everything a transform may read or update while rewriting a line.
pub struct TransformContext<'a> {
    pub definitions: &'a mut DefinitionStore,
    pub host: &'a mut dyn HostEvaluator,
    pub plugins: &'a mut Plugins,
    pub registry: &'a Registry,
    /// Source file name used for source map annotations.
    pub file: &'a str,
    pub line_number: usize,
    pub sourcemap: bool,
}

pub trait LineTransform {
    /// Takes ownership of the working line and hands back the rewritten one, which is the same
    /// allocation when nothing applied.
    fn apply(&self, line: String, cx: &mut TransformContext) -> String;
}

macro_rules! transform_chain {
    (
        $(#[$meta:meta])*
        pub enum Transform {
            $($variant_name:ident($variant_type:ident)),* $(,)?
        }
    ) => {
        $(#[$meta])*
        pub enum Transform {
            $($variant_name),*
        }

        impl Transform {
            /// Every transform, in the order they are applied.
            pub fn enumerate() -> &'static [Self] {
                &[$(Self::$variant_name),*]
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant_name => stringify!($variant_name)),*
                }
            }
        }

        impl LineTransform for Transform {
            fn apply(&self, line: String, cx: &mut TransformContext) -> String {
                match self {
                    $(Self::$variant_name => $variant_type.apply(line, cx)),*
                }
            }
        }
    };
}

transform_chain!(
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Transform {
        Interpolate(InterpolateTransform),
        Expand(ExpandTransform),
        Include(IncludeTransform),
        Destructure(DestructureTransform),
        Lock(LockTransform),
        SourceMap(SourceMapTransform),
    }
);

/// Run `line` through the whole chain.
pub fn apply_chain(line: String, cx: &mut TransformContext) -> String {
    Transform::enumerate().iter().fold(line, |line, transform| {
        let out = transform.apply(line, cx);
        log::trace!("{}: {out:?}", transform.name());
        out
    })
}
