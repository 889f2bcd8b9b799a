pub(crate) mod convert;
pub(crate) mod quantize;
pub(crate) mod rle4;
pub(crate) mod rle4_fix;
