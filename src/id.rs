use log::warn;
use std::fmt;

/// Printable identifier of a package
///
/// Each raw byte becomes two letters in `'a'..='p'`, high nibble first. The 16
/// raw bytes found in signed packages produce the familiar 32 character ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CrxId(String);

impl CrxId {
    /// Length in bytes of the raw id carried by signed packages
    pub const RAW_LEN: usize = 16;

    /// Derives the printable id from raw id bytes
    pub fn from_raw(raw: &[u8]) -> CrxId {
        if !raw.is_empty() && raw.len() != Self::RAW_LEN {
            warn!("unexpected raw crx id length: {}", raw.len());
        }

        let mut id = String::with_capacity(raw.len() * 2);
        for &b in raw {
            id.push(nibble_char(b >> 4));
            id.push(nibble_char(b & 0x0f));
        }

        CrxId(id)
    }

    /// Validates a printable id. Returns `None` if the text has an odd length
    /// or contains a character outside of `'a'..='p'`.
    pub fn parse(id: &str) -> Option<CrxId> {
        let valid = id.len() % 2 == 0 && id.bytes().all(|b| (b'a'..=b'p').contains(&b));
        valid.then(|| CrxId(id.to_string()))
    }

    /// Recovers the raw id bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0
            .as_bytes()
            .chunks_exact(2)
            .map(|pair| ((pair[0] - b'a') << 4) | (pair[1] - b'a'))
            .collect()
    }

    /// Returns the id as text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for packages opened without signed metadata
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[inline]
fn nibble_char(nibble: u8) -> char {
    char::from(b'a' + nibble)
}

impl fmt::Display for CrxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CrxId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<str> for CrxId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for CrxId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_sequential_bytes() {
        let raw: Vec<u8> = (0x00..=0x0f).collect();
        let id = CrxId::from_raw(&raw);
        assert_eq!(id.as_str(), "aaabacadaeafagahaiajakalamanaoap");
        assert_eq!(id.as_str().len(), 32);
    }

    #[test]
    fn test_high_nibble_first() {
        assert_eq!(CrxId::from_raw(&[0x00]), "aa");
        assert_eq!(CrxId::from_raw(&[0x0f]), "ap");
        assert_eq!(CrxId::from_raw(&[0xf0]), "pa");
        assert_eq!(CrxId::from_raw(&[0xff]), "pp");
        assert_eq!(CrxId::from_raw(&[0x4a, 0xc1]), "ekmb");
    }

    #[test]
    fn test_web_store_id() {
        let raw = [
            0x4a, 0xc1, 0x27, 0x4f, 0x23, 0x66, 0xf2, 0x13, 0xf9, 0xf8, 0x9f, 0x79, 0x88, 0x88,
            0xc5, 0x60,
        ];
        let id = CrxId::from_raw(&raw);
        assert_eq!(id.to_string(), "ekmbchepcdggpcbdpjpijphjiiiimfga");

        let parsed = CrxId::parse("ekmbchepcdggpcbdpjpijphjiiiimfga").unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.to_bytes(), raw.to_vec());
    }

    #[test]
    fn test_empty_id() {
        let id = CrxId::from_raw(&[]);
        assert!(id.is_empty());
        assert_eq!(id.to_string(), "");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(CrxId::parse("abc").is_none());
        assert!(CrxId::parse("aq").is_none());
        assert!(CrxId::parse("AA").is_none());
        assert!(CrxId::parse("").is_some());
    }

    #[quickcheck]
    fn id_alphabet_and_length(raw: Vec<u8>) -> bool {
        let id = CrxId::from_raw(&raw);
        id.as_str().len() == raw.len() * 2 && id.as_str().bytes().all(|b| (b'a'..=b'p').contains(&b))
    }

    #[quickcheck]
    fn id_is_injective(a: Vec<u8>, b: Vec<u8>) -> bool {
        (CrxId::from_raw(&a) == CrxId::from_raw(&b)) == (a == b)
    }

    #[quickcheck]
    fn id_round_trips(raw: Vec<u8>) -> bool {
        let id = CrxId::from_raw(&raw);
        CrxId::parse(id.as_str()) == Some(id.clone()) && id.to_bytes() == raw
    }
}
