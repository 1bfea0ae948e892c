//! Thin wrapper over the optional `log` facade.
//!
//! Compiles to nothing when the `logging` feature is off, so call sites don't
//! need to be sprinkled with `#[cfg(feature = "logging")]` themselves.

cfg_if::cfg_if! {
    if #[cfg(feature = "logging")] {
        macro_rules! debug {
            ($($arg:tt)*) => { log::debug!($($arg)*) };
        }
        macro_rules! warn_ {
            ($($arg:tt)*) => { log::warn!($($arg)*) };
        }
    } else {
        macro_rules! debug {
            ($($arg:tt)*) => {};
        }
        macro_rules! warn_ {
            ($($arg:tt)*) => {};
        }
    }
}

pub(crate) use debug;
pub(crate) use warn_ as warn;
