use base64::Engine;

/// Decode an uploaded photo payload.
///
/// Accepts `data:image/...;base64,....` URIs and bare base64. A `data:` URI
/// with any non-image media type is rejected outright rather than decoded and
/// failed later at the image parser.
pub fn decode_image_payload(input: &str) -> Option<Vec<u8>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    let b64 = match s.strip_prefix("data:") {
        Some(rest) => {
            let (media, data) = rest.split_once(',')?;
            if !media.starts_with("image/") {
                return None;
            }
            data.trim()
        }
        None => s,
    };
    base64::engine::general_purpose::STANDARD
        .decode(b64.as_bytes())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_uris_and_bare_base64_decode() {
        assert_eq!(
            decode_image_payload("data:image/png;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
        assert_eq!(decode_image_payload("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn non_image_and_malformed_payloads_are_rejected() {
        assert!(decode_image_payload("").is_none());
        assert!(decode_image_payload("data:text/plain;base64,aGVsbG8=").is_none());
        // no comma separator
        assert!(decode_image_payload("data:image/png;base64").is_none());
        assert!(decode_image_payload("not base64 !!!").is_none());
    }
}
