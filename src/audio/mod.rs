pub(crate) mod codec;
pub(crate) mod id3;
pub(crate) mod mp3;
