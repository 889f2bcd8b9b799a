pub(crate) mod options;
pub(crate) mod pipeline;
pub(crate) mod policy;
pub(crate) mod profile;
