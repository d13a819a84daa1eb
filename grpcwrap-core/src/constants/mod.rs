//! Domain state tables shared by services.
//!
//! Each table is a closed set of integer codes. The codes start at 1 and are
//! the values stored and exchanged by services, so they must never be
//! renumbered. Zero is never a valid code.

mod instance;
mod workflow;
mod workspace;

pub use instance::{InstanceState, InstanceTrigger};
pub use workflow::{
    FlowDependStrategy, FlowFailureStrategy, FlowNotifyStrategy, FlowPriority,
    FlowReleaseStatus, FlowScheduleStrategy, FlowType,
};
pub use workspace::{RoleType, SpaceStatus, SystemRole, UnknownRoleId};

/// Returned when an integer does not belong to a state table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown {table} code: {code}")]
pub struct UnknownCode {
    pub table: &'static str,
    pub code: i32,
}

/// Declare a state table: a `#[repr(i32)]` enum plus its conversions.
macro_rules! state_table {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal => $label:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $code, )+
        }

        impl $name {
            /// Every member of the table, in code order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The stored integer code.
            pub fn code(self) -> i32 {
                self as i32
            }

            /// Human-readable label.
            pub fn label(self) -> &'static str {
                match self {
                    $( $name::$variant => $label, )+
                }
            }
        }

        impl TryFrom<i32> for $name {
            type Error = $crate::constants::UnknownCode;

            fn try_from(code: i32) -> Result<Self, Self::Error> {
                match code {
                    $( $code => Ok($name::$variant), )+
                    _ => Err($crate::constants::UnknownCode {
                        table: stringify!($name),
                        code,
                    }),
                }
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> i32 {
                value.code()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

pub(crate) use state_table;
