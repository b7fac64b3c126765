//! # Collect
//!
//! Collection of the commands: drives the probe, the consumer and the store
//! session through a single run.

pub(crate) mod collector;
pub(crate) use collector::*;

pub(crate) mod sink;
pub(crate) use sink::*;
