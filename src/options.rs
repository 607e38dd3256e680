use crate::{
    errors::{CrxError, CrxErrorKind},
    file::CrxFile,
    header::CrxHeader,
    id::CrxId,
    metadata::SignedMetadata,
};
use log::debug;
use rawzip::ReaderAt;
use std::io::{Cursor, Read};

/// Builder for opening packages with non-default limits
///
/// ```no_run
/// use crxfile::CrxOptions;
///
/// let data = std::fs::read("extension.crx")?;
/// let crx = CrxOptions::new()
///     .max_metadata_len(1024 * 1024)
///     .open_slice(&data)?;
/// println!("{}", crx.id());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrxOptions {
    max_search_space: u64,
    max_metadata_len: u32,
}

impl Default for CrxOptions {
    fn default() -> Self {
        CrxOptions {
            max_search_space: 64 * 1024,
            max_metadata_len: 16 * 1024 * 1024,
        }
    }
}

impl CrxOptions {
    /// Creates options with the default limits
    pub fn new() -> Self {
        CrxOptions::default()
    }

    /// Set how many bytes from the end of the archive are searched for the
    /// zip end of central directory record
    pub fn max_search_space(&mut self, bytes: u64) -> &mut Self {
        self.max_search_space = bytes;
        self
    }

    /// Set the largest metadata block the envelope may declare
    pub fn max_metadata_len(&mut self, bytes: u32) -> &mut Self {
        self.max_metadata_len = bytes;
        self
    }

    /// Opens a package held in memory
    pub fn open_slice<'a>(&self, data: &'a [u8]) -> Result<CrxFile<Cursor<&'a [u8]>>, CrxError> {
        let header = self.check_header(CrxHeader::from_slice(data)?)?;
        let metadata = header.metadata(data)?;
        let id = derive_id(metadata)?;

        let payload = &data[CrxHeader::SIZE + metadata.len()..];
        let archive = self.locate(payload)?;
        CrxFile::from_parts(id, Some(header), archive)
    }

    /// Opens a package from a stream. Everything after the metadata block is
    /// buffered in memory.
    pub fn open_reader<R: Read>(&self, mut reader: R) -> Result<CrxFile<Cursor<Vec<u8>>>, CrxError> {
        let header = self.check_header(CrxHeader::from_reader(&mut reader)?)?;
        let id = derive_id(&header.read_metadata(&mut reader)?)?;

        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;
        let archive = self.locate(payload)?;
        CrxFile::from_parts(id, Some(header), archive)
    }

    /// Opens a bare zip archive held in memory. The package id is empty.
    pub fn open_zip_slice<'a>(&self, data: &'a [u8]) -> Result<CrxFile<Cursor<&'a [u8]>>, CrxError> {
        let archive = self.locate(data)?;
        CrxFile::from_parts(CrxId::default(), None, archive)
    }

    /// Opens an already located zip archive. The package id is empty.
    pub fn open_archive<R: ReaderAt>(
        &self,
        archive: rawzip::ZipArchive<R>,
    ) -> Result<CrxFile<R>, CrxError> {
        CrxFile::from_parts(CrxId::default(), None, archive)
    }

    fn check_header(&self, header: CrxHeader) -> Result<CrxHeader, CrxError> {
        debug!(
            "crx header: version {}, {} metadata bytes, archive at {}",
            header.version(),
            header.metadata_len(),
            header.archive_offset()
        );

        if header.metadata_len() > self.max_metadata_len {
            return Err(CrxErrorKind::MetadataTooLarge {
                declared: header.metadata_len(),
                limit: self.max_metadata_len,
            }
            .into());
        }

        Ok(header)
    }

    fn locate<T: AsRef<[u8]>>(&self, payload: T) -> Result<rawzip::ZipArchive<Cursor<T>>, CrxError> {
        if payload.as_ref().is_empty() {
            return Err(CrxErrorKind::TruncatedArchive.into());
        }

        let archive = rawzip::ZipArchive::with_max_search_space(self.max_search_space)
            .locate_in_slice(payload)
            .map_err(|(_, e)| CrxErrorKind::Zip(e))?;
        Ok(archive.into_zip_archive())
    }
}

fn derive_id(metadata: &[u8]) -> Result<CrxId, CrxError> {
    let signed = SignedMetadata::parse(metadata)?;
    if signed.crx_id().is_empty() {
        debug!("crx metadata carries no signed crx id");
    }

    Ok(CrxId::from_raw(signed.crx_id()))
}
