use crate::{
    archive::PackageArchive,
    errors::CrxError,
    header::CrxHeader,
    icon::{self, Icon},
    id::CrxId,
    locale::Translator,
    manifest::Manifest,
    options::CrxOptions,
};
use log::debug;
use rawzip::ReaderAt;
use std::{
    collections::HashMap,
    io::{Cursor, Read},
};

/// An opened CRX3 package
///
/// The package id and manifest are decoded when the package is opened, and
/// the message tables of every locale are loaded when the manifest declares a
/// default locale. Icons are read from the archive on every request.
#[derive(Debug, Clone)]
pub struct CrxFile<R> {
    id: CrxId,
    header: Option<CrxHeader>,
    manifest: Manifest,
    translator: Translator,
    archive: PackageArchive<R>,
}

impl CrxFile<()> {
    /// Opens a package held in memory
    pub fn from_slice(data: &[u8]) -> Result<CrxFile<Cursor<&[u8]>>, CrxError> {
        CrxOptions::new().open_slice(data)
    }

    /// Opens a package from a stream
    pub fn from_reader<R: Read>(reader: R) -> Result<CrxFile<Cursor<Vec<u8>>>, CrxError> {
        CrxOptions::new().open_reader(reader)
    }
}

impl<R> CrxFile<R>
where
    R: ReaderAt,
{
    /// Opens a package from an already located zip archive, skipping the
    /// envelope. The package id is empty.
    pub fn from_archive(archive: rawzip::ZipArchive<R>) -> Result<Self, CrxError> {
        CrxOptions::new().open_archive(archive)
    }

    pub(crate) fn from_parts(
        id: CrxId,
        header: Option<CrxHeader>,
        archive: rawzip::ZipArchive<R>,
    ) -> Result<Self, CrxError> {
        let archive = PackageArchive::try_from_archive(archive)?;
        let manifest = Manifest::from_archive(&archive)?;
        let translator = Translator::from_archive(manifest.default_locale(), &archive)?;

        debug!(
            "opened crx {:?} ({} version {})",
            id.as_str(),
            manifest.name,
            manifest.version
        );

        Ok(CrxFile {
            id,
            header,
            manifest,
            translator,
            archive,
        })
    }

    /// Returns every icon the manifest declares keyed by manifest key
    ///
    /// Fails with a `CrxErrorKind::MissingEntry` if any declared icon is
    /// absent from the archive.
    pub fn icons(&self) -> Result<HashMap<String, Icon>, CrxError> {
        icon::extract_all(&self.archive, &self.manifest)
    }

    /// Returns the icons that could be read, logging the rest
    pub fn icons_lossy(&self) -> HashMap<String, Icon> {
        icon::extract_available(&self.archive, &self.manifest)
    }

    /// Returns the icon declared under a manifest key (e.g. `"16"`)
    pub fn icon(&self, key: &str) -> Result<Icon, CrxError> {
        icon::extract_key(&self.archive, &self.manifest, key)
    }
}

impl<R> CrxFile<R> {
    /// Returns the package id. Empty when opened from a bare archive or when
    /// the metadata carries no signed data.
    pub fn id(&self) -> &CrxId {
        &self.id
    }

    /// Returns the envelope, if the package was opened with one
    pub fn header(&self) -> Option<&CrxHeader> {
        self.header.as_ref()
    }

    /// Returns the decoded manifest
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Returns the message tables
    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Returns the package archive for reading other entries
    pub fn archive(&self) -> &PackageArchive<R> {
        &self.archive
    }

    /// Resolves a `__MSG_<key>__` placeholder for a language. Other input is
    /// returned unchanged.
    pub fn message<'a>(&'a self, lang: Option<&str>, raw: &'a str) -> &'a str {
        self.translator.message(lang, raw)
    }

    /// Returns the manifest with its name and description resolved for a
    /// language
    pub fn localized_manifest(&self, lang: Option<&str>) -> Manifest {
        self.manifest.localized(&self.translator, lang)
    }
}
