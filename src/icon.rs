use crate::{
    archive::PackageArchive,
    errors::{CrxError, CrxErrorKind},
    manifest::Manifest,
};
use log::warn;
use rawzip::ReaderAt;
use std::collections::HashMap;

/// An icon extracted from the package archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    name: String,
    data: Vec<u8>,
}

impl Icon {
    /// Returns the file name of the archive entry (e.g. `icon16.png`), which
    /// need not match the manifest key the icon was requested by
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw icon bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the icon and returns the raw bytes
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Reads the icon declared at an archive path
pub fn extract<R: ReaderAt>(archive: &PackageArchive<R>, path: &str) -> Result<Icon, CrxError> {
    let entry = archive
        .entry(path)
        .ok_or_else(|| CrxErrorKind::MissingEntry(path.to_string()))?;
    let data = archive.read(entry)?;
    Ok(Icon {
        name: entry.name().to_string(),
        data,
    })
}

/// Reads the icon the manifest declares under a key
pub fn extract_key<R: ReaderAt>(
    archive: &PackageArchive<R>,
    manifest: &Manifest,
    key: &str,
) -> Result<Icon, CrxError> {
    let path = manifest
        .icons
        .get(key)
        .ok_or_else(|| CrxErrorKind::UnknownIcon(key.to_string()))?;
    extract(archive, path)
}

/// Reads every icon the manifest declares, failing on the first that cannot
/// be read
pub fn extract_all<R: ReaderAt>(
    archive: &PackageArchive<R>,
    manifest: &Manifest,
) -> Result<HashMap<String, Icon>, CrxError> {
    manifest
        .icons
        .iter()
        .map(|(key, path)| Ok((key.clone(), extract(archive, path)?)))
        .collect()
}

/// Reads every icon the manifest declares, skipping those that cannot be read
pub fn extract_available<R: ReaderAt>(
    archive: &PackageArchive<R>,
    manifest: &Manifest,
) -> HashMap<String, Icon> {
    let mut icons = HashMap::with_capacity(manifest.icons.len());
    for (key, path) in &manifest.icons {
        match extract(archive, path) {
            Ok(icon) => {
                icons.insert(key.clone(), icon);
            }
            Err(e) => warn!("skipping icon {}: {}", key, e),
        }
    }

    icons
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn archive(name: &str) -> PackageArchive<Cursor<Vec<u8>>> {
        let data = std::fs::read(format!("tests/fixtures/{}", name)).unwrap();
        let archive = rawzip::ZipArchive::with_max_search_space(64 * 1024)
            .locate_in_slice(data)
            .map_err(|(_, e)| e)
            .unwrap()
            .into_zip_archive();
        PackageArchive::try_from_archive(archive).unwrap()
    }

    fn manifest(icons: &[(&str, &str)]) -> Manifest {
        Manifest {
            icons: icons
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Manifest::default()
        }
    }

    #[test]
    fn test_extract_declared_icons() {
        let archive = archive("plain.zip");
        let manifest = Manifest::from_archive(&archive).unwrap();

        let icons = extract_all(&archive, &manifest).unwrap();
        assert_eq!(icons.len(), 3);
        assert_eq!(icons["128"].name(), "logo.png");
        assert_eq!(icons["16"].clone().into_data().len(), 40);

        let icon = extract(&archive, "icons/icon48.png").unwrap();
        assert_eq!(icon, icons["48"]);
    }

    #[test]
    fn test_unreadable_icons() {
        let archive = archive("odd_entries.zip");
        let manifest = manifest(&[
            ("16", "exact.txt"),
            ("32", "inflated.txt"),
            ("48", "packed.bin"),
            ("64", "missing.png"),
        ]);

        let icon = extract_key(&archive, &manifest, "16").unwrap();
        assert_eq!(icon.data(), b"exactly twenty bytes");

        let err = extract_key(&archive, &manifest, "32").unwrap_err();
        assert!(matches!(err.kind(), CrxErrorKind::EntrySizeMismatch { .. }));

        let err = extract_key(&archive, &manifest, "48").unwrap_err();
        assert!(matches!(err.kind(), CrxErrorKind::UnsupportedCompression { .. }));

        let err = extract_key(&archive, &manifest, "64").unwrap_err();
        assert!(matches!(err.kind(), CrxErrorKind::MissingEntry(path) if path == "missing.png"));

        let err = extract_key(&archive, &manifest, "128").unwrap_err();
        assert!(matches!(err.kind(), CrxErrorKind::UnknownIcon(key) if key == "128"));

        assert!(extract_all(&archive, &manifest).is_err());

        let icons = extract_available(&archive, &manifest);
        assert_eq!(icons.len(), 1);
        assert_eq!(icons["16"].name(), "exact.txt");
    }
}
