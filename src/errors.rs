use std::fmt;

/// An error that can occur when reading a CRX package
#[derive(Debug)]
pub struct CrxError {
    kind: Box<CrxErrorKind>,
}

impl CrxError {
    /// Return the specific type of error
    pub fn kind(&self) -> &CrxErrorKind {
        &self.kind
    }

    /// Consume the error and return the specific type of error
    pub fn into_kind(self) -> CrxErrorKind {
        *self.kind
    }

    /// Returns true if the package bytes are structurally invalid: a bad
    /// envelope, malformed metadata, or an unreadable archive.
    pub fn is_format(&self) -> bool {
        matches!(
            *self.kind,
            CrxErrorKind::InvalidMagic
                | CrxErrorKind::UnsupportedVersion(_)
                | CrxErrorKind::TruncatedHeader
                | CrxErrorKind::TruncatedMetadata { .. }
                | CrxErrorKind::MetadataTooLarge { .. }
                | CrxErrorKind::MalformedMetadata { .. }
                | CrxErrorKind::TruncatedArchive
                | CrxErrorKind::Zip(_)
                | CrxErrorKind::UnsupportedCompression { .. }
                | CrxErrorKind::EntrySizeMismatch { .. }
        )
    }

    /// Returns true if a requested entry or icon does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            *self.kind,
            CrxErrorKind::MissingEntry(_) | CrxErrorKind::UnknownIcon(_)
        )
    }

    /// Returns true if an entry exists but its JSON content could not be decoded
    pub fn is_decode(&self) -> bool {
        matches!(*self.kind, CrxErrorKind::Json { .. })
    }
}

impl From<CrxErrorKind> for CrxError {
    fn from(kind: CrxErrorKind) -> Self {
        CrxError {
            kind: Box::new(kind),
        }
    }
}

impl From<std::io::Error> for CrxError {
    fn from(error: std::io::Error) -> Self {
        CrxErrorKind::Io(error).into()
    }
}

/// Specific kind of CRX error
#[derive(Debug)]
pub enum CrxErrorKind {
    /// IO error while reading the package
    Io(std::io::Error),

    /// Error from ZIP archive processing
    Zip(rawzip::Error),

    /// The input does not start with the `Cr24` magic
    InvalidMagic,

    /// The container declares a format version other than 3
    UnsupportedVersion(u32),

    /// The input ends inside the fixed 12 byte envelope prefix
    TruncatedHeader,

    /// Fewer metadata bytes are available than the envelope declares
    TruncatedMetadata { expected: u32, available: usize },

    /// The envelope declares more metadata than the configured limit
    MetadataTooLarge { declared: u32, limit: u32 },

    /// The metadata block is not a well formed protobuf message
    MalformedMetadata { offset: usize, reason: &'static str },

    /// No archive bytes follow the metadata block
    TruncatedArchive,

    /// A ZIP entry uses a compression method other than store or deflate
    UnsupportedCompression { path: String },

    /// A ZIP entry decompressed to a different length than the archive
    /// declares. Reading stops one byte past the declared size, so `actual`
    /// never exceeds `declared + 1`.
    EntrySizeMismatch {
        path: String,
        declared: u64,
        actual: u64,
    },

    /// The archive has no entry at the given path
    MissingEntry(String),

    /// The manifest does not declare an icon under the given key
    UnknownIcon(String),

    /// An archive entry could not be decoded as the expected JSON document
    Json {
        path: String,
        source: serde_json::Error,
    },
}

impl std::error::Error for CrxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &*self.kind {
            CrxErrorKind::Io(err) => Some(err),
            CrxErrorKind::Zip(err) => Some(err),
            CrxErrorKind::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for CrxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.kind {
            CrxErrorKind::Io(err) => write!(f, "IO error: {}", err),
            CrxErrorKind::Zip(err) => write!(f, "Zip error: {}", err),
            CrxErrorKind::InvalidMagic => write!(f, "not a crx file: invalid magic"),
            CrxErrorKind::UnsupportedVersion(version) => {
                write!(f, "unsupported crx version: {}", version)
            }
            CrxErrorKind::TruncatedHeader => write!(f, "crx header is truncated"),
            CrxErrorKind::TruncatedMetadata {
                expected,
                available,
            } => write!(
                f,
                "crx metadata is truncated (expected: {} bytes, available: {})",
                expected, available
            ),
            CrxErrorKind::MetadataTooLarge { declared, limit } => write!(
                f,
                "crx metadata of {} bytes exceeds the limit of {} bytes",
                declared, limit
            ),
            CrxErrorKind::MalformedMetadata { offset, reason } => {
                write!(f, "malformed crx metadata: {} (offset: {})", reason, offset)
            }
            CrxErrorKind::TruncatedArchive => write!(f, "crx archive payload is empty"),
            CrxErrorKind::UnsupportedCompression { path } => {
                write!(f, "zip entry {} uses an unsupported compression method", path)
            }
            CrxErrorKind::EntrySizeMismatch {
                path,
                declared,
                actual,
            } => write!(
                f,
                "zip entry {} declares {} bytes but decompressed to {}",
                path, declared, actual
            ),
            CrxErrorKind::MissingEntry(path) => write!(f, "{} not found", path),
            CrxErrorKind::UnknownIcon(key) => write!(f, "manifest declares no icon {}", key),
            CrxErrorKind::Json { path, source } => {
                write!(f, "{} parse failed: {}", path, source)
            }
        }
    }
}
