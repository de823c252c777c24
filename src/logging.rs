//! Logging shims.
//!
//! Each macro forwards to `defmt` when the `defmt-log` feature is enabled and
//! to the `log` facade when the `log` feature is enabled. With neither
//! feature the macros expand to nothing.

macro_rules! trace {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt")]
        ::defmt::trace!($($args)*);
        #[cfg(feature = "log")]
        ::log::trace!($($args)*);
    }
}

macro_rules! debug {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($args)*);
        #[cfg(feature = "log")]
        ::log::debug!($($args)*);
    }
}

macro_rules! warn {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($args)*);
        #[cfg(feature = "log")]
        ::log::warn!($($args)*);
    }
}
