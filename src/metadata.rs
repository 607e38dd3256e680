//! Decode the protobuf encoded metadata block of a CRX3 envelope.
//!
//! Only the path needed to identify a package is decoded:
//!
//! ```text
//! CrxFileHeader
//! └── signed_header_data (10000, bytes) → SignedData
//!     └── crx_id (1, bytes)
//! ```
//!
//! Every other field (the RSA and ECDSA proofs, verified contents, ...) is
//! skipped by its wire type.

use crate::errors::{CrxError, CrxErrorKind};
use log::trace;

/// Field number of `CrxFileHeader.signed_header_data`
pub const SIGNED_HEADER_DATA_FIELD: u32 = 10000;

/// Field number of `SignedData.crx_id`
pub const CRX_ID_FIELD: u32 = 1;

/// The signed portion of the envelope metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignedMetadata<'a> {
    crx_id: &'a [u8],
}

impl<'a> SignedMetadata<'a> {
    /// Decodes the metadata block.
    ///
    /// Metadata without signed header data, or signed header data without a
    /// crx id, decodes to an empty crx id.
    pub fn parse(metadata: &'a [u8]) -> Result<Self, CrxError> {
        let Some(signed) = last_bytes_field(metadata, SIGNED_HEADER_DATA_FIELD)? else {
            return Ok(SignedMetadata::default());
        };

        let crx_id = last_bytes_field(signed, CRX_ID_FIELD)?.unwrap_or_default();
        Ok(SignedMetadata { crx_id })
    }

    /// Returns the raw package id bytes. Empty when the metadata is unsigned.
    pub fn crx_id(&self) -> &'a [u8] {
        self.crx_id
    }
}

/// A decoded protobuf field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireValue<'a> {
    /// Wire type 0
    Varint(u64),

    /// Wire type 1
    Fixed64(u64),

    /// Wire type 2
    Bytes(&'a [u8]),

    /// Wire type 5
    Fixed32(u32),
}

/// Walks the top level fields of a protobuf message without a schema
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    /// Creates a reader over an encoded message
    pub fn new(data: &'a [u8]) -> Self {
        FieldReader { data, offset: 0 }
    }

    /// Returns the current byte offset into the message
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the next field number and value, or `None` at the end of the
    /// message
    pub fn next_field(&mut self) -> Result<Option<(u32, WireValue<'a>)>, CrxError> {
        if self.offset == self.data.len() {
            return Ok(None);
        }

        let start = self.offset;
        let key = self.read_varint()?;
        let field = key >> 3;
        if field == 0 || field > u64::from(u32::MAX >> 3) {
            return Err(self.malformed(start, "invalid field number"));
        }

        let value = match key & 0x7 {
            0 => WireValue::Varint(self.read_varint()?),
            1 => {
                let data = self.read_slice(8, "truncated fixed64")?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(data);
                WireValue::Fixed64(u64::from_le_bytes(buf))
            }
            2 => {
                let len_offset = self.offset;
                let len = self.read_varint()?;
                let len = usize::try_from(len)
                    .map_err(|_| self.malformed(len_offset, "length overflow"))?;
                WireValue::Bytes(self.read_slice(len, "length exceeds message")?)
            }
            5 => {
                let data = self.read_slice(4, "truncated fixed32")?;
                let mut buf = [0u8; 4];
                buf.copy_from_slice(data);
                WireValue::Fixed32(u32::from_le_bytes(buf))
            }
            3 | 4 => return Err(self.malformed(start, "groups are not supported")),
            _ => return Err(self.malformed(start, "unknown wire type")),
        };

        Ok(Some((field as u32, value)))
    }

    fn read_varint(&mut self) -> Result<u64, CrxError> {
        let start = self.offset;
        let mut result = 0u64;
        for i in 0..10 {
            let Some(&byte) = self.data.get(self.offset) else {
                return Err(self.malformed(start, "truncated varint"));
            };
            self.offset += 1;
            result |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }

        Err(self.malformed(start, "varint too long"))
    }

    fn read_slice(&mut self, len: usize, reason: &'static str) -> Result<&'a [u8], CrxError> {
        let start = self.offset;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| self.malformed(start, reason))?;
        self.offset = end;
        let data: &'a [u8] = self.data;
        Ok(&data[start..end])
    }

    fn malformed(&self, offset: usize, reason: &'static str) -> CrxError {
        CrxErrorKind::MalformedMetadata { offset, reason }.into()
    }
}

/// Returns the last occurrence of a length delimited field, validating every
/// field of the message along the way
fn last_bytes_field(data: &[u8], field: u32) -> Result<Option<&[u8]>, CrxError> {
    let mut reader = FieldReader::new(data);
    let mut result = None;
    while let Some((number, value)) = reader.next_field()? {
        match value {
            WireValue::Bytes(bytes) if number == field => result = Some(bytes),
            _ => trace!("skipping metadata field {} at {}", number, reader.offset()),
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn varint(mut value: u64, out: &mut Vec<u8>) {
        while value >= 0x80 {
            out.push((value as u8) | 0x80);
            value >>= 7;
        }
        out.push(value as u8);
    }

    fn bytes_field(field: u32, data: &[u8], out: &mut Vec<u8>) {
        varint(u64::from(field) << 3 | 2, out);
        varint(data.len() as u64, out);
        out.extend_from_slice(data);
    }

    fn signed_header(crx_id: &[u8]) -> Vec<u8> {
        let mut signed = Vec::new();
        bytes_field(CRX_ID_FIELD, crx_id, &mut signed);
        let mut out = Vec::new();
        bytes_field(SIGNED_HEADER_DATA_FIELD, &signed, &mut out);
        out
    }

    #[test]
    fn test_signed_header_key_encoding() {
        // field 10000, wire type 2
        let data = signed_header(&[]);
        assert_eq!(&data[..3], &[0x82, 0xf1, 0x04]);
    }

    #[test]
    fn test_crx_id_extraction() {
        let id: Vec<u8> = (0u8..16).collect();
        let data = signed_header(&id);
        let meta = SignedMetadata::parse(&data).unwrap();
        assert_eq!(meta.crx_id(), &id[..]);
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let id = [0xab; 16];
        let mut data = Vec::new();

        // sha256_with_rsa proof: { public_key, signature }
        let mut proof = Vec::new();
        bytes_field(1, b"public key", &mut proof);
        bytes_field(2, b"signature", &mut proof);
        bytes_field(2, &proof, &mut data);

        // a varint, fixed64 and fixed32 field
        varint(5 << 3, &mut data);
        varint(300, &mut data);
        varint(6 << 3 | 1, &mut data);
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        varint(7 << 3 | 5, &mut data);
        data.extend_from_slice(&[1, 2, 3, 4]);

        data.extend_from_slice(&signed_header(&id));

        let meta = SignedMetadata::parse(&data).unwrap();
        assert_eq!(meta.crx_id(), &id[..]);
    }

    #[test]
    fn test_missing_signed_data_is_empty() {
        let mut data = Vec::new();
        bytes_field(2, b"proof", &mut data);
        let meta = SignedMetadata::parse(&data).unwrap();
        assert!(meta.crx_id().is_empty());

        let meta = SignedMetadata::parse(&[]).unwrap();
        assert!(meta.crx_id().is_empty());
    }

    #[test]
    fn test_signed_data_without_crx_id_is_empty() {
        let mut signed = Vec::new();
        varint(2 << 3, &mut signed);
        varint(1, &mut signed);
        let mut data = Vec::new();
        bytes_field(SIGNED_HEADER_DATA_FIELD, &signed, &mut data);

        let meta = SignedMetadata::parse(&data).unwrap();
        assert!(meta.crx_id().is_empty());
    }

    #[test]
    fn test_last_occurrence_wins() {
        let mut data = signed_header(&[1; 16]);
        data.extend_from_slice(&signed_header(&[2; 16]));
        let meta = SignedMetadata::parse(&data).unwrap();
        assert_eq!(meta.crx_id(), &[2; 16][..]);
    }

    #[rstest]
    // length delimited field declares 16 bytes with only 3 present
    #[case(&[0x12, 0x10, 1, 2, 3][..])]
    // truncated varint
    #[case(&[0x08, 0x80][..])]
    // varint longer than 10 bytes
    #[case(&[0x08, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01][..])]
    // truncated fixed64
    #[case(&[0x09, 1, 2, 3][..])]
    // truncated fixed32
    #[case(&[0x0d, 1, 2][..])]
    // start group
    #[case(&[0x0b][..])]
    // wire type 7
    #[case(&[0x0f][..])]
    // field number zero
    #[case(&[0x02, 0x00][..])]
    fn test_malformed_metadata(#[case] data: &[u8]) {
        let err = SignedMetadata::parse(data).unwrap_err();
        assert!(matches!(err.kind(), CrxErrorKind::MalformedMetadata { .. }));
        assert!(err.is_format());
    }

    #[test]
    fn test_malformed_nested_crx_id() {
        let mut data = Vec::new();
        bytes_field(SIGNED_HEADER_DATA_FIELD, &[0x0a, 0x10, 0xaa], &mut data);
        let err = SignedMetadata::parse(&data).unwrap_err();
        assert!(matches!(
            err.kind(),
            CrxErrorKind::MalformedMetadata { offset: 2, .. }
        ));
    }

    #[test]
    fn test_field_reader_values() {
        let mut data = Vec::new();
        varint(1 << 3, &mut data);
        varint(150, &mut data);
        bytes_field(2, b"abc", &mut data);

        let mut reader = FieldReader::new(&data);
        assert_eq!(reader.next_field().unwrap(), Some((1, WireValue::Varint(150))));
        assert_eq!(
            reader.next_field().unwrap(),
            Some((2, WireValue::Bytes(&b"abc"[..])))
        );
        assert_eq!(reader.next_field().unwrap(), None);
        assert_eq!(reader.offset(), data.len());
    }
}
