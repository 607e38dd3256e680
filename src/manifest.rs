use crate::{
    archive::PackageArchive,
    errors::{CrxError, CrxErrorKind},
    locale::Translator,
};
use rawzip::ReaderAt;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Path of the manifest within the package archive
pub const MANIFEST_PATH: &str = "manifest.json";

/// The package description found at `manifest.json`
///
/// Missing fields take empty defaults so partial manifests are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Manifest {
    /// Display name, possibly a `__MSG_<key>__` placeholder
    pub name: String,

    /// Package version
    pub version: String,

    /// Description, possibly a `__MSG_<key>__` placeholder
    pub description: String,

    /// Locale used when a requested language has no message table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_locale: Option<String>,

    /// Icon paths within the archive keyed by size
    pub icons: HashMap<String, String>,

    /// Manifest format version. Values that are not an unsigned integer are
    /// treated as absent.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_u32"
    )]
    pub manifest_version: Option<u32>,
}

impl Manifest {
    /// Locates and decodes the manifest of a package archive
    pub fn from_archive<R: ReaderAt>(archive: &PackageArchive<R>) -> Result<Self, CrxError> {
        let data = archive.read_entry(MANIFEST_PATH)?;
        decode_json(MANIFEST_PATH, &data)
    }

    /// Decodes a manifest document
    pub fn from_slice(data: &[u8]) -> Result<Self, CrxError> {
        decode_json(MANIFEST_PATH, data)
    }

    /// Returns the default locale, treating an empty declaration as absent
    pub fn default_locale(&self) -> Option<&str> {
        self.default_locale.as_deref().filter(|x| !x.is_empty())
    }

    /// Returns a copy with the name and description resolved for a language
    pub fn localized(&self, translator: &Translator, lang: Option<&str>) -> Manifest {
        Manifest {
            name: translator.message(lang, &self.name).to_string(),
            description: translator.message(lang, &self.description).to_string(),
            ..self.clone()
        }
    }
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_u64().and_then(|x| u32::try_from(x).ok()))
}

/// Decodes a JSON document from the archive, skipping a UTF-8 byte order mark
pub(crate) fn decode_json<T: DeserializeOwned>(path: &str, data: &[u8]) -> Result<T, CrxError> {
    let data = data.strip_prefix(b"\xef\xbb\xbf").unwrap_or(data);
    serde_json::from_slice(data).map_err(|source| {
        CrxErrorKind::Json {
            path: path.to_string(),
            source,
        }
        .into()
    })
}
