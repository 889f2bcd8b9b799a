use crate::foundation::error::{PackError, PackResult};

const ID3V2_HEADER_LEN: usize = 10;
const ID3V2_FOOTER_FLAG: u8 = 0x10;
const ID3V1_LEN: usize = 128;

/// Strip every leading ID3v2 tag (stacked tags included).
///
/// Input without a well-formed tag header is returned as is. A tag whose declared size runs past
/// the end of the data is a decode error.
pub fn strip_id3v2(mut bytes: &[u8]) -> PackResult<&[u8]> {
    while let Some(tag_len) = id3v2_len(bytes) {
        if tag_len > bytes.len() {
            return Err(PackError::decode(format!(
                "ID3v2 tag declares {tag_len} bytes but only {} are present",
                bytes.len()
            )));
        }
        tracing::trace!(tag_len, "stripping ID3v2 tag");
        bytes = &bytes[tag_len..];
    }
    Ok(bytes)
}

/// Strip a trailing 128-byte ID3v1 tag, if present.
pub fn strip_id3v1(bytes: &[u8]) -> &[u8] {
    match bytes.len().checked_sub(ID3V1_LEN) {
        Some(start) if bytes[start..].starts_with(b"TAG") => &bytes[..start],
        _ => bytes,
    }
}

/// Strip leading ID3v2 and trailing ID3v1 tags.
pub fn strip_id3_tags(bytes: &[u8]) -> PackResult<&[u8]> {
    Ok(strip_id3v1(strip_id3v2(bytes)?))
}

/// Total length (header, body and optional footer) of the ID3v2 tag at the start of `bytes`.
fn id3v2_len(bytes: &[u8]) -> Option<usize> {
    let header = bytes.get(..ID3V2_HEADER_LEN)?;
    if &header[..3] != b"ID3" || header[3] == 0xff || header[4] == 0xff {
        return None;
    }
    let size = &header[6..10];
    if size.iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    let body = size
        .iter()
        .fold(0usize, |acc, &b| (acc << 7) | usize::from(b));
    let footer = if header[5] & ID3V2_FOOTER_FLAG != 0 {
        ID3V2_HEADER_LEN
    } else {
        0
    };
    Some(ID3V2_HEADER_LEN + body + footer)
}

#[cfg(test)]
#[path = "../../tests/unit/audio/id3.rs"]
mod tests;
