//! # cmdtrail events
//!
//! This crate contains the definitions of the types flowing through the
//! cmdtrail capture pipeline: the raw record layout emitted by the BPF part,
//! the decoded command event, the entry persisted in the remote store and the
//! key addressing it.

pub mod raw;
pub use raw::*;

pub mod command;
pub use command::*;

pub mod entry;
pub use entry::*;

pub mod key;
pub use key::*;
