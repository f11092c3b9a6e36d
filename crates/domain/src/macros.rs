//! Macro for implementing Display and FromStr for status enums
//!
//! Job statuses, job types and mapping transaction types are persisted as
//! lowercase TEXT columns. This macro keeps the string form of every such
//! enum in one place.
//!
//! # Example
//!
//! ```rust
//! use ledgersync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum RunState {
//!     Idle,
//!     Busy,
//! }
//!
//! impl_domain_status_conversions!(RunState {
//!     Idle => "idle",
//!     Busy => "busy",
//! });
//!
//! assert_eq!(RunState::Busy.to_string(), "busy");
//! assert_eq!("IDLE".parse::<RunState>(), Ok(RunState::Idle));
//! ```

/// Implements Display and FromStr traits for status enums
///
/// * Display writes the mapped lowercase string.
/// * FromStr parses case-insensitively and reports the enum name on failure.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
