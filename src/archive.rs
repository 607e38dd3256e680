use crate::errors::{CrxError, CrxErrorKind};
use log::debug;
use rawzip::{CompressionMethod, ReaderAt, ZipArchiveEntryWayfinder, ZipReader};
use std::io::Read;

/// Upper bound on the buffer preallocated from an entry's declared size
pub(crate) const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// A file within the package archive
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    path: String,
    compression: CompressionMethod,
    wayfinder: ZipArchiveEntryWayfinder,
}

impl ArchiveEntry {
    /// Returns the full path of the entry within the archive
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the last path segment of the entry
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Returns true if the entry is a directory marker
    pub fn is_dir(&self) -> bool {
        self.path.ends_with('/')
    }

    /// Returns the compression method of the entry
    pub fn compression_method(&self) -> CompressionMethod {
        self.compression
    }

    /// Returns the uncompressed size declared by the archive
    pub fn uncompressed_size_hint(&self) -> u64 {
        self.wayfinder.uncompressed_size_hint()
    }
}

/// The zip archive embedded in a package, indexed by entry path
///
/// Reads are positional (`rawzip::ReaderAt`), so every read of an entry is
/// independent of any other and yields the same bytes.
#[derive(Debug, Clone)]
pub struct PackageArchive<R> {
    archive: rawzip::ZipArchive<R>,
    entries: Vec<ArchiveEntry>,
}

impl<R> PackageArchive<R> {
    /// Returns every entry in central directory order
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Looks up an entry by its full path
    pub fn entry(&self, path: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|entry| entry.path == path)
    }

    /// Returns a reference to the underlying zip archive
    pub fn get_ref(&self) -> &rawzip::ZipArchive<R> {
        &self.archive
    }

    /// Consumes the package archive and returns the underlying zip archive
    pub fn into_inner(self) -> rawzip::ZipArchive<R> {
        self.archive
    }
}

impl<R> PackageArchive<R>
where
    R: ReaderAt,
{
    /// Indexes the entries of an opened zip archive
    pub fn try_from_archive(archive: rawzip::ZipArchive<R>) -> Result<Self, CrxError> {
        let mut buf = vec![0u8; rawzip::RECOMMENDED_BUFFER_SIZE];
        let mut entries = Vec::new();

        {
            let mut records = archive.entries(&mut buf);
            while let Some(record) = records.next_entry().map_err(CrxErrorKind::Zip)? {
                let path = String::from_utf8_lossy(record.file_path().as_ref()).into_owned();
                entries.push(ArchiveEntry {
                    path,
                    compression: record.compression_method(),
                    wayfinder: record.wayfinder(),
                });
            }
        }

        debug!("indexed {} archive entries", entries.len());
        Ok(PackageArchive { archive, entries })
    }

    /// Returns a reader over the decompressed contents of an entry
    pub fn open(&self, entry: &ArchiveEntry) -> Result<impl Read + '_, CrxError> {
        let zip_entry = self
            .archive
            .get_entry(entry.wayfinder)
            .map_err(CrxErrorKind::Zip)?;
        EntryReader::from_zip(entry, zip_entry)
    }

    /// Reads the whole decompressed contents of an entry
    ///
    /// The entry must decompress to exactly its declared size, otherwise a
    /// `CrxErrorKind::EntrySizeMismatch` is returned. No more than one byte
    /// past the declared size is ever decompressed.
    pub fn read(&self, entry: &ArchiveEntry) -> Result<Vec<u8>, CrxError> {
        let declared = entry.uncompressed_size_hint();
        let mut data = Vec::with_capacity(declared.min(MAX_PREALLOC) as usize);
        self.open(entry)?
            .take(declared.saturating_add(1))
            .read_to_end(&mut data)?;

        let actual = data.len() as u64;
        if actual != declared {
            debug!(
                "{} declared {} bytes but decompressed to {}",
                entry.path(),
                declared,
                actual
            );
            return Err(CrxErrorKind::EntrySizeMismatch {
                path: entry.path.clone(),
                declared,
                actual,
            }
            .into());
        }

        Ok(data)
    }

    /// Reads the whole decompressed contents of the entry at the given path
    ///
    /// Will return a `CrxErrorKind::MissingEntry` if the path is not found.
    pub fn read_entry(&self, path: &str) -> Result<Vec<u8>, CrxError> {
        let entry = self
            .entry(path)
            .ok_or_else(|| CrxErrorKind::MissingEntry(path.to_string()))?;
        self.read(entry)
    }
}

/// Reader over a stored or deflated zip entry
#[derive(Debug)]
pub enum EntryReader<R> {
    /// The entry is stored without compression
    Stored(R),

    /// The entry is deflate compressed
    Deflated(flate2::read::DeflateDecoder<R>),
}

impl EntryReader<()> {
    fn from_zip<'a, R>(
        entry: &ArchiveEntry,
        zip_entry: rawzip::ZipEntry<'a, R>,
    ) -> Result<EntryReader<ZipReader<&'a R>>, CrxError>
    where
        R: ReaderAt,
    {
        let reader = zip_entry.reader();
        match entry.compression {
            CompressionMethod::Store => Ok(EntryReader::Stored(reader)),
            CompressionMethod::Deflate => Ok(EntryReader::Deflated(
                flate2::read::DeflateDecoder::new(reader),
            )),
            _ => Err(CrxErrorKind::UnsupportedCompression {
                path: entry.path.clone(),
            }
            .into()),
        }
    }
}

impl<R> Read for EntryReader<R>
where
    R: Read,
{
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            EntryReader::Stored(reader) => reader.read(buf),
            EntryReader::Deflated(reader) => reader.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn fixture_archive(name: &str) -> PackageArchive<Cursor<Vec<u8>>> {
        let data = std::fs::read(format!("tests/fixtures/{}", name)).unwrap();
        let archive = rawzip::ZipArchive::with_max_search_space(64 * 1024)
            .locate_in_slice(data)
            .map_err(|(_, e)| e)
            .unwrap()
            .into_zip_archive();
        PackageArchive::try_from_archive(archive).unwrap()
    }

    fn entry(path: &str) -> Option<String> {
        let archive = fixture_archive("plain.zip");
        let entry = archive.entry(path)?;
        Some(String::from_utf8(archive.read(entry).unwrap()).unwrap())
    }

    #[test]
    fn test_read_stored_and_deflated_entries() {
        let manifest = entry("manifest.json").unwrap();
        assert!(manifest.contains("\"name\""));

        let messages = entry("_locales/en/messages.json").unwrap();
        assert!(messages.contains("appName"));
    }

    #[test]
    fn test_missing_entry() {
        assert!(entry("nope.json").is_none());
    }

    #[test]
    fn test_entry_names() {
        let archive = fixture_archive("plain.zip");

        let entry = archive.entry("_locales/en/messages.json").unwrap();
        assert_eq!(entry.name(), "messages.json");
        assert!(!entry.is_dir());

        let entry = archive.entry("manifest.json").unwrap();
        assert_eq!(entry.name(), "manifest.json");

        let err = archive.read_entry("icons/missing.png").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_read_matches_declared_size() {
        let archive = fixture_archive("odd_entries.zip");
        let data = archive.read_entry("exact.txt").unwrap();
        assert_eq!(data, b"exactly twenty bytes");
    }

    #[test]
    fn test_entry_inflating_past_declared_size() {
        // 4096 bytes deflated, but the archive declares 40
        let archive = fixture_archive("odd_entries.zip");
        let entry = archive.entry("inflated.txt").unwrap();
        assert_eq!(entry.uncompressed_size_hint(), 40);

        let err = archive.read(entry).unwrap_err();
        assert!(err.is_format());
        match err.kind() {
            CrxErrorKind::EntrySizeMismatch {
                path,
                declared,
                actual,
            } => {
                assert_eq!(path, "inflated.txt");
                assert_eq!(*declared, 40);
                assert_eq!(*actual, 41);
            }
            x => panic!("unexpected error: {:?}", x),
        }
    }

    #[test]
    fn test_unsupported_compression() {
        let archive = fixture_archive("odd_entries.zip");
        let entry = archive.entry("packed.bin").unwrap();
        assert!(!matches!(
            entry.compression_method(),
            CompressionMethod::Store | CompressionMethod::Deflate
        ));

        let err = archive.read(entry).unwrap_err();
        assert!(err.is_format());
        assert!(
            matches!(err.kind(), CrxErrorKind::UnsupportedCompression { path } if path == "packed.bin")
        );
    }
}
