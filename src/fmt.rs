//! Diagnostic macros routed to either `log` or `defmt`, depending on the
//! enabled feature. With neither feature the calls compile to nothing.
#![allow(unused_macros)]

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(feature = "log-impl")]
        ::log::trace!($s $(, $x)*);
        #[cfg(feature = "defmt-impl")]
        ::defmt::trace!($s $(, $x)*);
        #[cfg(not(any(feature = "log-impl", feature = "defmt-impl")))]
        let _ = ($( & $x ),*);
    }};
}

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(feature = "log-impl")]
        ::log::debug!($s $(, $x)*);
        #[cfg(feature = "defmt-impl")]
        ::defmt::debug!($s $(, $x)*);
        #[cfg(not(any(feature = "log-impl", feature = "defmt-impl")))]
        let _ = ($( & $x ),*);
    }};
}

macro_rules! warning {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(feature = "log-impl")]
        ::log::warn!($s $(, $x)*);
        #[cfg(feature = "defmt-impl")]
        ::defmt::warn!($s $(, $x)*);
        #[cfg(not(any(feature = "log-impl", feature = "defmt-impl")))]
        let _ = ($( & $x ),*);
    }};
}
