//! `format` checks. Every named format here is asserted; names not listed
//! return `None` and are treated as annotations by the caller.
use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;
use uuid::Uuid;

static FULL_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static regex"));

static FULL_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{2}:\d{2}:\d{2}(\.\d+)?([zZ]|[+-]\d{2}:\d{2})$").expect("static regex")
});

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^P(\d+W|(\d+Y)?(\d+M)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?)$").expect("static regex")
});

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@([A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?\.)*[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?$",
    )
    .expect("static regex")
});

static HOST_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("static regex"));

static URI_TEMPLATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^{}]|\{[^{}]+\})*$").expect("static regex"));

static JSON_POINTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(/([^~/]|~[01])*)*$").expect("static regex"));

static RELATIVE_JSON_POINTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0|[1-9][0-9]*)(#|(/([^~/]|~[01])*)*)$").expect("static regex"));

static BASE: Lazy<Url> = Lazy::new(|| Url::parse("http://example.com/").expect("static url"));

/// `Some(valid)` for a known format, `None` otherwise.
pub fn check(format: &str, s: &str) -> Option<bool> {
    let ok = match format {
        "date-time" => date_time(s),
        "date" => date(s),
        "time" => time(s),
        "duration" => duration(s),
        "email" => EMAIL.is_match(s),
        "hostname" => hostname(s),
        "ipv4" => s.parse::<Ipv4Addr>().is_ok(),
        "ipv6" => s.parse::<Ipv6Addr>().is_ok(),
        "uuid" => s.len() == 36 && Uuid::try_parse(s).is_ok(),
        "uri" => !has_space(s) && Url::parse(s).is_ok(),
        "uri-reference" => !has_space(s) && !s.contains('\\') && BASE.join(s).is_ok(),
        "uri-template" => URI_TEMPLATE.is_match(s),
        "json-pointer" => JSON_POINTER.is_match(s),
        "relative-json-pointer" => RELATIVE_JSON_POINTER.is_match(s),
        "regex" => Regex::new(s).is_ok(),
        _ => return None,
    };
    Some(ok)
}

fn has_space(s: &str) -> bool { s.chars().any(char::is_whitespace) }

fn date(s: &str) -> bool {
    FULL_DATE.is_match(s) && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn date_time(s: &str) -> bool {
    match s.find(['T', 't']) {
        Some(i) => date(&s[..i]) && time(&s[i + 1..]),
        None => false,
    }
}

fn time(s: &str) -> bool {
    if !FULL_TIME.is_match(s) {
        return false;
    }
    // chrono knows leap seconds and offsets; borrow a fixed date
    DateTime::parse_from_rfc3339(&format!("1970-01-01T{s}")).is_ok()
}

fn duration(s: &str) -> bool {
    DURATION.is_match(s) && s != "P" && !s.ends_with('T')
}

fn hostname(s: &str) -> bool {
    let s = s.strip_suffix('.').unwrap_or(s);
    !s.is_empty() && s.len() <= 253 && s.split('.').all(|label| HOST_LABEL.is_match(label))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(format: &str, s: &str) -> bool { check(format, s).unwrap() }

    #[test]
    fn dates_and_times() {
        assert!(ok("date-time", "2024-02-29T12:30:00Z"));
        assert!(ok("date-time", "2024-02-29t12:30:00.5+02:00"));
        assert!(!ok("date-time", "2023-02-29T12:30:00Z"));
        assert!(!ok("date", "2024-2-01"));
        assert!(ok("time", "23:59:59-05:00"));
        assert!(!ok("time", "24:00:00Z"));
        assert!(ok("duration", "P1Y2M3DT4H5M6.5S"));
        assert!(ok("duration", "P2W"));
        assert!(!ok("duration", "PT"));
        assert!(!ok("duration", "P"));
    }

    #[test]
    fn network_names() {
        assert!(ok("email", "ada@example.com"));
        assert!(!ok("email", "ada@@example.com"));
        assert!(ok("hostname", "api.example.com"));
        assert!(!ok("hostname", "-bad.example.com"));
        assert!(ok("ipv4", "192.168.0.1"));
        assert!(!ok("ipv4", "192.168.00.1"));
        assert!(ok("ipv6", "::1"));
        assert!(!ok("ipv6", "12345::"));
    }

    #[test]
    fn identifiers_and_pointers() {
        assert!(ok("uuid", "2eb8aa08-aa98-11ea-b4aa-73b441d16380"));
        assert!(!ok("uuid", "2eb8aa08aa9811eab4aa73b441d16380"));
        assert!(ok("uri", "https://example.com/a?b=c"));
        assert!(!ok("uri", "/relative"));
        assert!(ok("uri-reference", "/relative#frag"));
        assert!(ok("uri-template", "https://example.com/{id}"));
        assert!(!ok("uri-template", "https://example.com/{id"));
        assert!(ok("json-pointer", "/a~1b/0"));
        assert!(!ok("json-pointer", "a"));
        assert!(ok("relative-json-pointer", "1/a"));
        assert!(ok("regex", "^a+$"));
        assert!(!ok("regex", "("));
        assert_eq!(check("iri", "x"), None);
    }
}
