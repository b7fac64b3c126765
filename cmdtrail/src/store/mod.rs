//! # Store
//!
//! Client side of the append-only remote store: the store abstraction, the
//! immudb client and the authenticated session shared by all writes.

// Re-export store.rs
#[allow(clippy::module_inception)]
pub(crate) mod store;
pub(crate) use store::*;

pub(crate) mod immudb;
pub(crate) use immudb::*;

pub(crate) mod session;
pub(crate) use session::*;

#[cfg(test)]
pub(crate) mod mock;
