#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]

#[macro_use]
mod fmt;

pub(crate) mod buffer;
pub(crate) mod commands;
pub(crate) mod deframe;

pub mod channel;
#[cfg(feature = "examples")]
pub mod example;
pub mod serial;
pub mod stack;
pub mod status;
pub mod wifi;

#[cfg(test)]
mod tests;
