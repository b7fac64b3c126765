//! # Events
//!
//! Retrieval of the raw events emitted by the BPF part and their hand-off to
//! the consumer.

pub(crate) mod bpf;
pub(crate) use bpf::*;

pub(crate) mod channel;
pub(crate) use channel::*;
