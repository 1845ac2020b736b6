//! Logging facade.
//!
//! With the `tracing-integration` feature this re-exports the `tracing`
//! macros. Without it the same macros expand to nothing, so call sites never
//! need their own `cfg`.
//!
//! Levels used by the crate:
//!
//! - `trace`: object construction and close
//! - `debug`: successful initialization
//! - `info`: default loop creation
//! - `warn`: engine failures and use of the deprecated dispatch facade

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }
    macro_rules! info {
        ($($arg:tt)*) => {};
    }
    // `warn` is also a built-in attribute; importing a `macro_rules!` of that
    // name by path is ambiguous, so it is defined under another name.
    macro_rules! warn_ {
        ($($arg:tt)*) => {};
    }

    pub(crate) use {debug, info, trace, warn_};
}

#[cfg(not(feature = "tracing-integration"))]
pub(crate) use noop::{debug, info, trace, warn_ as warn};
