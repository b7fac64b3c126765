//! # Inspect
//!
//! Checks the host provides what is needed to install probes.

pub(crate) mod check;
pub(crate) use check::*;
