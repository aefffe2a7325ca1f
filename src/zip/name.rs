//! Member name encoding.

use crate::error::{Result, ZipError};

/// Longest name the 16-bit length field of a header can describe.
pub const MAX_NAME_LEN: usize = u16::MAX as usize;

/// A member name as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryName {
    /// Text names are always written as UTF-8 and flagged as such.
    Text(String),
    /// Raw names are written verbatim; see [`Utf8Policy`] for the flag.
    Raw(Vec<u8>),
}

impl EntryName {
    pub fn is_empty(&self) -> bool {
        match self {
            EntryName::Text(s) => s.is_empty(),
            EntryName::Raw(b) => b.is_empty(),
        }
    }

    /// True when the name denotes a directory member.
    pub fn is_directory(&self) -> bool {
        match self {
            EntryName::Text(s) => s.ends_with('/'),
            EntryName::Raw(b) => b.ends_with(b"/"),
        }
    }

    /// Return the name with a trailing `/`, adding one if missing.
    pub fn into_directory(self) -> Self {
        if self.is_directory() {
            return self;
        }
        match self {
            EntryName::Text(mut s) => {
                s.push('/');
                EntryName::Text(s)
            }
            EntryName::Raw(mut b) => {
                b.push(b'/');
                EntryName::Raw(b)
            }
        }
    }
}

impl From<&str> for EntryName {
    fn from(value: &str) -> Self {
        EntryName::Text(value.to_string())
    }
}

impl From<String> for EntryName {
    fn from(value: String) -> Self {
        EntryName::Text(value)
    }
}

impl From<Vec<u8>> for EntryName {
    fn from(value: Vec<u8>) -> Self {
        EntryName::Raw(value)
    }
}

/// How to set the UTF-8 flag (general purpose bit 11) for raw byte names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Utf8Policy {
    /// Flag names that are valid UTF-8 and not plain ASCII.
    #[default]
    Auto,
    Always,
    Never,
}

/// Encode a name into header bytes and the UTF-8 flag.
pub fn encode_name(name: EntryName, policy: Utf8Policy) -> Result<(Vec<u8>, bool)> {
    let (bytes, utf8) = match name {
        EntryName::Text(s) => (s.into_bytes(), true),
        EntryName::Raw(b) => {
            let utf8 = match policy {
                Utf8Policy::Always => true,
                Utf8Policy::Never => false,
                Utf8Policy::Auto => std::str::from_utf8(&b).is_ok(),
            };
            (b, utf8)
        }
    };

    check_name(&bytes)?;
    Ok((bytes, utf8))
}

/// Check that encoded name bytes fit the 16-bit length field of a header.
pub fn check_name(bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Err(ZipError::EmptyName);
    }
    if bytes.len() > MAX_NAME_LEN {
        return Err(ZipError::NameTooLong { len: bytes.len() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_names_are_always_flagged() {
        let (bytes, utf8) = encode_name("plain.txt".into(), Utf8Policy::Never).unwrap();
        assert_eq!(bytes, b"plain.txt");
        assert!(utf8);
    }

    #[test]
    fn auto_flags_non_ascii_utf8() {
        let raw = "résumé.txt".as_bytes().to_vec();
        let (bytes, utf8) = encode_name(EntryName::Raw(raw.clone()), Utf8Policy::Auto).unwrap();
        assert_eq!(bytes, raw);
        assert!(utf8);
    }

    #[test]
    fn auto_leaves_invalid_utf8_unflagged() {
        let raw = vec![b'a', 0xFF, 0xFE, b'b'];
        let (_, utf8) = encode_name(EntryName::Raw(raw), Utf8Policy::Auto).unwrap();
        assert!(!utf8);
    }

    #[test]
    fn auto_flags_plain_ascii() {
        let (_, utf8) = encode_name(EntryName::Raw(b"a.txt".to_vec()), Utf8Policy::Auto).unwrap();
        assert!(utf8);
    }

    #[test]
    fn forced_policies() {
        let raw = vec![0xFF];
        let (_, on) = encode_name(EntryName::Raw(raw.clone()), Utf8Policy::Always).unwrap();
        let (_, off) = encode_name(EntryName::Raw("é".into()), Utf8Policy::Never).unwrap();
        assert!(on);
        assert!(!off);
    }

    #[test]
    fn rejects_empty_and_oversized_names() {
        assert!(matches!(
            encode_name(EntryName::Raw(Vec::new()), Utf8Policy::Auto),
            Err(ZipError::EmptyName)
        ));
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            encode_name(long.into(), Utf8Policy::Auto),
            Err(ZipError::NameTooLong { len }) if len == MAX_NAME_LEN + 1
        ));
        let edge = "x".repeat(MAX_NAME_LEN);
        assert!(encode_name(edge.into(), Utf8Policy::Auto).is_ok());
    }

    #[test]
    fn directory_names() {
        let name = EntryName::from("dir").into_directory();
        assert_eq!(name, EntryName::from("dir/"));
        assert!(name.is_directory());
        assert_eq!(name.clone().into_directory(), name);
    }
}
