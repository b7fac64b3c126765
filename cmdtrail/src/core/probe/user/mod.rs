//! # User-level probes
//!
//! Module providing an API to attach probes to userspace programs and
//! libraries.

pub(crate) mod symbols;
pub(crate) use symbols::*;

pub(crate) mod uretprobe;
pub(crate) use uretprobe::*;
