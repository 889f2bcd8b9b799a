pub(crate) mod digest;
pub(crate) mod error;
