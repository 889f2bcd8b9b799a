use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(PackError::decode("x").to_string().contains("decode failure:"));
    assert!(PackError::encode("x").to_string().contains("encode failure:"));
    assert!(
        PackError::malformed_rle("x")
            .to_string()
            .contains("malformed RLE stream:")
    );
    assert!(
        PackError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        PackError::unsupported_format("image/gif")
            .to_string()
            .contains("unsupported format: image/gif")
    );
}

#[test]
fn unsupported_transition_names_both_ends() {
    let err = PackError::unsupported_transition(
        AssetKind::Audio,
        "audio/x-wav",
        "audio/x-wav",
        "compressed",
    );
    let msg = err.to_string();
    assert!(msg.contains("audio"));
    assert!(msg.contains("audio/x-wav -> audio/x-wav"));
    assert!(msg.contains("(compressed)"));
}

#[test]
fn root_cause_unwraps_asset_context() {
    let err = PackError::decode("bad png")
        .in_asset(3, AssetKind::Image)
        .in_asset(4, AssetKind::Image);
    assert!(err.to_string().starts_with("node 4 image asset:"));
    assert!(matches!(err.root_cause(), PackError::Decode(m) if m == "bad png"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = PackError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
