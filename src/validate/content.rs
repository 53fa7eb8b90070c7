//! `contentEncoding` decoding and in-memory media type sniffing.
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Leading-byte signatures, checked in order.
const MAGIC: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"%PDF-", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b", "application/gzip"),
    (b"BZh", "application/x-bzip2"),
    (b"\x7fELF", "application/x-executable"),
    (b"<?xml", "text/xml"),
];

/// Decode `s` per `encoding`. `None` means the encoding is unknown.
pub fn decode(encoding: &str, s: &str) -> Option<Result<Vec<u8>, String>> {
    let decoded = match encoding.to_ascii_lowercase().as_str() {
        "base64" => {
            let compact: String = s.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            STANDARD.decode(compact).map_err(|e| e.to_string())
        }
        "quoted-printable" => quoted_printable(s),
        "7bit" => {
            if s.is_ascii() { Ok(s.as_bytes().to_vec()) } else { Err("non-ASCII byte in 7bit content".into()) }
        }
        "8bit" | "binary" => Ok(s.as_bytes().to_vec()),
        _ => return None,
    };
    Some(decoded)
}

fn quoted_printable(s: &str) -> Result<Vec<u8>, String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'=' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        match bytes.get(i + 1..) {
            // soft line breaks
            Some([b'\r', b'\n', ..]) => i += 3,
            Some([b'\n', ..]) => i += 2,
            Some([hi, lo, ..]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                let pair = [*hi, *lo];
                let hex = std::str::from_utf8(&pair).map_err(|e| e.to_string())?;
                out.push(u8::from_str_radix(hex, 16).map_err(|e| e.to_string())?);
                i += 3;
            }
            _ => return Err(format!("malformed escape at byte {i}")),
        }
    }
    Ok(out)
}

/// Best-effort media type of `bytes`.
pub fn sniff(bytes: &[u8]) -> &'static str {
    if bytes.is_empty() {
        return "application/x-empty";
    }
    if let Some((_, media)) = MAGIC.iter().find(|(magic, _)| bytes.starts_with(magic)) {
        return *media;
    }
    if serde_json::from_slice::<serde_json::Value>(bytes).is_ok() {
        return "application/json";
    }
    match std::str::from_utf8(bytes) {
        Ok(text) if looks_like_html(text) => "text/html",
        Ok(_) => "text/plain",
        Err(_) => "application/octet-stream",
    }
}

fn looks_like_html(text: &str) -> bool {
    let head = text.trim_start().get(..15).unwrap_or(text.trim_start()).to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Whether sniffed content satisfies a declared `contentMediaType`.
/// Parameters are ignored. Plain text is accepted for `application/json`
/// (text sniffing cannot tell them apart reliably), and JSON is text.
pub fn media_matches(declared: &str, sniffed: &str) -> bool {
    let declared = declared.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    if declared == sniffed || declared == "application/octet-stream" {
        return true;
    }
    match (declared.as_str(), sniffed) {
        ("application/json", "text/plain") => true,
        ("text/plain", "application/json") => true,
        (d, s) => d.strip_suffix("/*").is_some_and(|top| s.split('/').next() == Some(top)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_encodings() {
        assert_eq!(decode("base64", "aGk=").unwrap().unwrap(), b"hi");
        assert_eq!(decode("BASE64", "aG\nk=").unwrap().unwrap(), b"hi");
        assert!(decode("base64", "!!").unwrap().is_err());
        assert_eq!(decode("quoted-printable", "caf=C3=A9 =\r\nok").unwrap().unwrap(), "café ok".as_bytes());
        assert!(decode("quoted-printable", "bad=ZZ").unwrap().is_err());
        assert!(decode("7bit", "é").unwrap().is_err());
        assert!(decode("rot13", "x").is_none());
    }

    #[test]
    fn sniffs_from_content() {
        assert_eq!(sniff(b"\x89PNG\r\n\x1a\n...."), "image/png");
        assert_eq!(sniff(br#"{"a": [1]}"#), "application/json");
        assert_eq!(sniff(b"hello"), "text/plain");
        assert_eq!(sniff(b"<!DOCTYPE html><p>"), "text/html");
        assert_eq!(sniff(&[0xff, 0xfe, 0x00]), "application/octet-stream");
    }

    #[test]
    fn json_accepts_plain_text() {
        assert!(media_matches("application/json", "text/plain"));
        assert!(media_matches("application/json; charset=utf-8", "application/json"));
        assert!(media_matches("image/*", "image/gif"));
        assert!(!media_matches("image/png", "text/plain"));
    }
}
