use crate::{
    archive::MAX_PREALLOC,
    errors::{CrxError, CrxErrorKind},
};
use std::io::{self, Read};

/// The fixed envelope that precedes every CRX3 package
///
/// ```text
/// offset 0   magic             "Cr24"
/// offset 4   version           u32 little endian, always 3
/// offset 8   metadata length   u32 little endian (n)
/// offset 12  metadata          n bytes, protobuf encoded CrxFileHeader
/// offset 12+n                  zip archive
/// ```
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CrxHeader {
    version: u32,
    metadata_len: u32,
}

impl CrxHeader {
    /// Size of the envelope prefix in bytes
    pub const SIZE: usize = 12;

    /// Magic bytes that open every package
    pub const MAGIC: [u8; 4] = *b"Cr24";

    /// The only container version that can be read
    pub const VERSION: u32 = 3;

    /// Parses the envelope prefix from the start of a byte slice
    pub fn from_slice(data: &[u8]) -> Result<Self, CrxError> {
        let magic: &[u8; 4] = data
            .first_chunk()
            .ok_or_else(|| CrxError::from(CrxErrorKind::InvalidMagic))?;
        check_magic(magic)?;

        let version = data
            .get(4..8)
            .ok_or_else(|| CrxError::from(CrxErrorKind::TruncatedHeader))?;
        let version = check_version(le_u32(version))?;

        let metadata_len = data
            .get(8..12)
            .ok_or_else(|| CrxError::from(CrxErrorKind::TruncatedHeader))?;

        Ok(CrxHeader {
            version,
            metadata_len: le_u32(metadata_len),
        })
    }

    /// Parses the envelope prefix from a stream.
    ///
    /// Fields are read one at a time so that a stream which does not carry the
    /// magic is only advanced by four bytes.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, CrxError> {
        let mut magic = [0u8; 4];
        read_field(&mut reader, &mut magic, CrxErrorKind::InvalidMagic)?;
        check_magic(&magic)?;

        let mut buf = [0u8; 4];
        read_field(&mut reader, &mut buf, CrxErrorKind::TruncatedHeader)?;
        let version = check_version(u32::from_le_bytes(buf))?;

        read_field(&mut reader, &mut buf, CrxErrorKind::TruncatedHeader)?;
        Ok(CrxHeader {
            version,
            metadata_len: u32::from_le_bytes(buf),
        })
    }

    /// Returns the magic bytes of the envelope
    pub fn magic(&self) -> [u8; 4] {
        Self::MAGIC
    }

    /// Returns the container format version
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the length of the metadata block in bytes
    pub fn metadata_len(&self) -> u32 {
        self.metadata_len
    }

    /// Returns the byte offset where the zip archive begins
    pub fn archive_offset(&self) -> u64 {
        Self::SIZE as u64 + u64::from(self.metadata_len)
    }

    /// Returns exactly the metadata block from the complete package bytes
    pub fn metadata<'a>(&self, data: &'a [u8]) -> Result<&'a [u8], CrxError> {
        let rest = data.get(Self::SIZE..).unwrap_or_default();
        rest.get(..self.metadata_len as usize).ok_or_else(|| {
            CrxErrorKind::TruncatedMetadata {
                expected: self.metadata_len,
                available: rest.len(),
            }
            .into()
        })
    }

    /// Reads exactly the metadata block from a stream positioned just after
    /// the envelope prefix
    pub fn read_metadata<R: Read>(&self, reader: R) -> Result<Vec<u8>, CrxError> {
        let expected = self.metadata_len;
        let mut buf = Vec::with_capacity(u64::from(expected).min(MAX_PREALLOC) as usize);
        reader.take(u64::from(expected)).read_to_end(&mut buf)?;
        if buf.len() != expected as usize {
            return Err(CrxErrorKind::TruncatedMetadata {
                expected,
                available: buf.len(),
            }
            .into());
        }

        Ok(buf)
    }
}

fn check_magic(magic: &[u8; 4]) -> Result<(), CrxError> {
    if magic != &CrxHeader::MAGIC {
        return Err(CrxErrorKind::InvalidMagic.into());
    }

    Ok(())
}

fn check_version(version: u32) -> Result<u32, CrxError> {
    if version != CrxHeader::VERSION {
        return Err(CrxErrorKind::UnsupportedVersion(version).into());
    }

    Ok(version)
}

fn read_field<R: Read>(reader: &mut R, buf: &mut [u8], eof: CrxErrorKind) -> Result<(), CrxError> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(eof.into()),
        Err(e) => Err(e.into()),
    }
}

#[inline]
fn le_u32(data: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(data);
    u32::from_le_bytes(buf)
}
