// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The [`wire_enum!`] macro for closed string-valued enums.

/// Define an enum whose variants cross the wire as fixed snake_case strings.
///
/// Statuses, phases, and modes show up in three places that must agree: the
/// serde encoding of persisted state, log and error text, and the enum
/// listings served to clients. One declaration keeps them in lockstep:
///
/// - serde `rename` per variant, so JSON and YAML use the wire name
/// - `as_str()` and `Display` returning the same wire name
/// - `ALL`, every value in declaration order, for enum listings
/// - `parse()` back from a wire name
///
/// ```ignore
/// crate::wire_enum! {
///     /// Execution phase within a run.
///     pub enum Phase {
///         Analyze => "analyze",
///         Plan => "plan",
///         Execute => "execute",
///         Done => "done",
///     }
/// }
/// ```
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $wire:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Every value, in declaration order.
            pub const ALL: &'static [$name] = &[ $( $name::$variant, )+ ];

            /// Wire name, identical to the serde encoding.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $wire, )+
                }
            }

            /// Inverse of [`Self::as_str`].
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $( $wire => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[cfg(test)]
#[path = "macros_tests.rs"]
mod tests;
