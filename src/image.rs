use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::ServiceError;

/// Image bytes ready to be sent inline to the hosted model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: &'static str,
    pub base64: String,
}

impl ImagePayload {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ServiceError> {
        if bytes.is_empty() {
            return Err(ServiceError::InvalidImage("image is empty".to_string()));
        }
        Ok(Self {
            mime_type: sniff_mime(bytes),
            base64: STANDARD.encode(bytes),
        })
    }
}

/// Guess the content type from magic bytes. Unknown formats go out as JPEG,
/// which is what phone cameras produce anyway.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        [_, _, _, _, b'f', b't', b'y', b'p', brand @ ..] if brand.starts_with(b"heic") || brand.starts_with(b"heix") => {
            "image/heic"
        }
        [_, _, _, _, b'f', b't', b'y', b'p', brand @ ..] if brand.starts_with(b"mif1") || brand.starts_with(b"msf1") => {
            "image/heif"
        }
        _ => "image/jpeg",
    }
}

/// Decode what a browser `FileReader.readAsDataURL` hands us. The `data:...;base64,`
/// header is optional, so a bare base64 string works too.
pub fn decode_data_url(input: &str) -> Result<Vec<u8>, ServiceError> {
    let input = input.trim();
    let encoded = match input.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| ServiceError::InvalidImage("data URL has no payload".to_string()))?;
            if !header.ends_with(";base64") {
                return Err(ServiceError::InvalidImage(format!(
                    "data URL is not base64 encoded ({})",
                    header
                )));
            }
            data
        }
        None => input,
    };

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| ServiceError::InvalidImage(e.to_string()))?;
    if bytes.is_empty() {
        return Err(ServiceError::InvalidImage("image is empty".to_string()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_sniff_common_formats() {
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), "image/jpeg");
        assert_eq!(sniff_mime(PNG_HEADER), "image/png");
        assert_eq!(sniff_mime(b"GIF89a...."), "image/gif");
        assert_eq!(sniff_mime(b"RIFF\x10\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(sniff_mime(b"\x00\x00\x00\x18ftypheic\x00\x00"), "image/heic");
        assert_eq!(sniff_mime(b"not an image"), "image/jpeg");
    }

    #[test]
    fn test_data_url_prefix_is_stripped() {
        let encoded = STANDARD.encode(PNG_HEADER);
        let url = format!("data:image/png;base64,{}", encoded);
        assert_eq!(decode_data_url(&url).unwrap(), PNG_HEADER);
        assert_eq!(decode_data_url(&encoded).unwrap(), PNG_HEADER);
    }

    #[test]
    fn test_payload_never_carries_prefix() {
        let payload = ImagePayload::from_bytes(PNG_HEADER).unwrap();
        assert_eq!(payload.mime_type, "image/png");
        assert!(!payload.base64.starts_with("data:"));
        assert_eq!(STANDARD.decode(&payload.base64).unwrap(), PNG_HEADER);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(ImagePayload::from_bytes(&[]), Err(ServiceError::InvalidImage(_))));
        assert!(decode_data_url("data:image/png;base64").is_err());
        assert!(decode_data_url("data:text/plain,hello").is_err());
        assert!(decode_data_url("***").is_err());
        assert!(decode_data_url("").is_err());
    }
}
