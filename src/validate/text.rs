use tracing::warn;

use crate::error::{PathSegment, Result, UnsupportedFeature};
use crate::ir::StringKeywords;

use super::{Walker, content, format, invalid};

impl Walker<'_> {
    pub(super) fn string(&self, kw: &StringKeywords, s: &str, path: &[PathSegment]) -> Result<()> {
        // lengths count Unicode scalar values, not bytes
        let len = s.chars().count() as u64;
        if let Some(min) = kw.min_length {
            if len < min {
                return Err(invalid(path, format!("string of length {len} is shorter than minLength {min}")));
            }
        }
        if let Some(max) = kw.max_length {
            if len > max {
                return Err(invalid(path, format!("string of length {len} is longer than maxLength {max}")));
            }
        }
        if let Some(pattern) = &kw.pattern {
            if !pattern.is_match(s) {
                return Err(invalid(path, format!("string does not match pattern `{pattern}`")));
            }
        }

        if let Some(name) = &kw.format {
            if self.options.assert_formats {
                match format::check(name, s) {
                    Some(true) => {}
                    Some(false) => return Err(invalid(path, format!("string is not a valid {name}"))),
                    None => warn!(format = %name, "unknown format; not asserted"),
                }
            }
        }

        if self.options.assert_content && (kw.content_encoding.is_some() || kw.content_media_type.is_some()) {
            self.content(kw, s, path)?;
        }
        Ok(())
    }

    fn content(&self, kw: &StringKeywords, s: &str, path: &[PathSegment]) -> Result<()> {
        let bytes = match &kw.content_encoding {
            None => s.as_bytes().to_vec(),
            Some(encoding) => match content::decode(encoding, s) {
                None => {
                    return Err(UnsupportedFeature {
                        path: path.to_vec(),
                        keyword: "contentEncoding".to_string(),
                        detail: format!("unknown encoding `{encoding}`"),
                    }
                    .into());
                }
                Some(Err(reason)) => {
                    return Err(invalid(path, format!("content is not valid {encoding}: {reason}")));
                }
                Some(Ok(bytes)) => bytes,
            },
        };
        if let Some(declared) = &kw.content_media_type {
            let sniffed = content::sniff(&bytes);
            if !content::media_matches(declared, sniffed) {
                return Err(invalid(path, format!("content looks like {sniffed}, expected {declared}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::Validator;
    use crate::config::Options;
    use crate::error::Error;
    use crate::resolve::NoSource;
    use serde_json::json;

    #[test]
    fn lengths_count_characters() {
        let v = Validator::new(&json!({"type": "string", "minLength": 2, "maxLength": 3})).unwrap();
        assert!(v.is_valid(&json!("日本")));
        assert!(!v.is_valid(&json!("日")));
        assert!(!v.is_valid(&json!("abcd")));
    }

    #[test]
    fn patterns_are_unanchored() {
        let v = Validator::new(&json!({"pattern": "b+"})).unwrap();
        assert!(v.is_valid(&json!("abbc")));
        assert!(!v.is_valid(&json!("ac")));
        // only strings are checked
        assert!(v.is_valid(&json!(12)));
    }

    #[test]
    fn formats_assert_unless_disabled() {
        let schema = json!({"format": "ipv4"});
        assert!(!Validator::new(&schema).unwrap().is_valid(&json!("300.1.1.1")));
        let lax = Validator::with_options(&schema, Options::default().assert_formats(false), &NoSource).unwrap();
        assert!(lax.is_valid(&json!("300.1.1.1")));
        assert!(Validator::new(&json!({"format": "no-such-format"})).unwrap().is_valid(&json!("x")));
    }

    #[test]
    fn content_is_decoded_and_sniffed() {
        let v = Validator::new(&json!({"contentEncoding": "base64", "contentMediaType": "application/json"})).unwrap();
        assert!(v.is_valid(&json!("eyJhIjogMX0="))); // {"a": 1}
        assert!(!v.is_valid(&json!("not base64!")));
        let png = Validator::new(&json!({"contentEncoding": "base64", "contentMediaType": "image/png"})).unwrap();
        assert!(!png.is_valid(&json!("eyJhIjogMX0=")));
    }

    #[test]
    fn unknown_encodings_are_unsupported() {
        let v = Validator::new(&json!({"contentEncoding": "base32"})).unwrap();
        assert!(matches!(v.validate(&json!("MZXW6===")), Err(Error::Unsupported(_))));
    }
}
