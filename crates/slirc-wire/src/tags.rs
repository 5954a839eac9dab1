//! IRCv3 message tags and their escaping rules.

use std::fmt::{Result as FmtResult, Write};

/// A single message tag.
///
/// A tag that appears on the wire without an `=` is a boolean flag and
/// carries no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Tag key, e.g. `badge-info` or `msgid`.
    pub key: String,
    /// Tag value; `None` for bare boolean keys.
    pub value: Option<String>,
}

impl Tag {
    /// Create a tag from a key and optional value.
    pub fn new(key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Tag {
            key: key.into(),
            value: value.map(Into::into),
        }
    }
}

/// Parse the tag block of a line (the part after `@`, before the first space).
///
/// Entries are `;`-separated; each entry splits on its first `=` into a
/// key and an escaped value. Empty entries are skipped.
pub fn parse_tag_block(block: &str) -> Vec<Tag> {
    block
        .split(';')
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => Tag {
                key: key.to_owned(),
                value: Some(unescape_value(value)),
            },
            None => Tag {
                key: entry.to_owned(),
                value: None,
            },
        })
        .collect()
}

/// Escape a tag value for serialization per the message-tags spec.
pub fn escape_value(f: &mut dyn Write, value: &str) -> FmtResult {
    for c in value.chars() {
        match c {
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\\' => f.write_str("\\\\")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Reverse [`escape_value`].
///
/// Unknown escape sequences drop the backslash; a trailing lone backslash
/// is dropped entirely, per the message-tags spec.
pub fn unescape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let unescaped = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(other) => other,
                None => break,
            }
        } else {
            c
        };
        out.push(unescaped);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_and_values() {
        let tags = parse_tag_block("badge-info=subscriber/8;badges=subscriber/6");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].key, "badge-info");
        assert_eq!(tags[0].value.as_deref(), Some("subscriber/8"));
        assert_eq!(tags[1].key, "badges");
        assert_eq!(tags[1].value.as_deref(), Some("subscriber/6"));
    }

    #[test]
    fn bare_key_has_no_value() {
        let tags = parse_tag_block("first-msg;mod=1");
        assert_eq!(tags[0].key, "first-msg");
        assert_eq!(tags[0].value, None);
        assert_eq!(tags[1].value.as_deref(), Some("1"));
    }

    #[test]
    fn empty_entries_are_skipped() {
        let tags = parse_tag_block("a=1;;b=2;");
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn empty_value_is_empty_string() {
        let tags = parse_tag_block("emotes=");
        assert_eq!(tags[0].value.as_deref(), Some(""));
    }

    #[test]
    fn unescape_known_sequences() {
        assert_eq!(unescape_value("a\\:b"), "a;b");
        assert_eq!(unescape_value("hello\\sworld"), "hello world");
        assert_eq!(unescape_value("path\\\\file"), "path\\file");
        assert_eq!(unescape_value("line\\rend"), "line\rend");
        assert_eq!(unescape_value("line\\nend"), "line\nend");
    }

    #[test]
    fn unescape_unknown_drops_backslash() {
        assert_eq!(unescape_value("a\\xb"), "axb");
    }

    #[test]
    fn unescape_trailing_backslash_dropped() {
        assert_eq!(unescape_value("test\\"), "test");
    }

    #[test]
    fn escape_round_trip() {
        let values = [
            "simple",
            "with space",
            "with;semicolon",
            "with\\backslash",
            "with\nnewline",
            "all; \\ \n \r together",
        ];
        for original in values {
            let mut escaped = String::new();
            escape_value(&mut escaped, original).unwrap();
            assert_eq!(
                unescape_value(&escaped),
                original,
                "round trip failed for {original:?} via {escaped:?}"
            );
        }
    }
}
