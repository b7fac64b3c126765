pub(crate) mod events;
pub(crate) mod inspect;
pub(crate) mod probe;
