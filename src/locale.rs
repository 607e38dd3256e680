//! Resolve `__MSG_<key>__` placeholders against the package's message tables.
//!
//! Message tables live at `_locales/<lang>/messages.json` and map a message key
//! to a record holding the message text:
//!
//! ```json
//! { "appName": { "message": "My Extension", "description": "shown in the store" } }
//! ```
//!
//! Resolution looks for the requested language, then the manifest's default
//! locale, and otherwise returns the input untouched. Substitution is a single
//! pass: resolved text is never expanded again.

use crate::{archive::PackageArchive, errors::CrxError, manifest::decode_json};
use log::debug;
use rawzip::ReaderAt;
use serde::Deserialize;
use std::collections::HashMap;

/// Directory that holds one sub directory per language
pub const LOCALES_ROOT: &str = "_locales/";

/// File name of a language's message table
pub const MESSAGES_FILE: &str = "messages.json";

const PLACEHOLDER_PREFIX: &str = "__MSG_";
const PLACEHOLDER_SUFFIX: &str = "__";

#[derive(Debug, Deserialize)]
struct MessageRecord {
    #[serde(default)]
    message: String,
}

/// Per language message tables with a default locale fallback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translator {
    default_locale: String,
    locales: HashMap<String, HashMap<String, String>>,
}

impl Translator {
    /// Creates a translator from already decoded message tables
    pub fn new(
        default_locale: impl Into<String>,
        locales: HashMap<String, HashMap<String, String>>,
    ) -> Self {
        Translator {
            default_locale: default_locale.into(),
            locales,
        }
    }

    /// A translator without any message tables. Every input is returned
    /// unchanged.
    pub fn passthrough() -> Self {
        Translator::default()
    }

    /// Loads every `_locales/<lang>/messages.json` table from the archive.
    ///
    /// Without a default locale the archive is not scanned and a passthrough
    /// translator is returned.
    pub fn from_archive<R: ReaderAt>(
        default_locale: Option<&str>,
        archive: &PackageArchive<R>,
    ) -> Result<Self, CrxError> {
        let Some(default_locale) = default_locale else {
            return Ok(Translator::passthrough());
        };

        let mut locales = HashMap::new();
        for entry in archive.entries() {
            let Some(lang) = locale_of(entry.path()) else {
                continue;
            };

            let data = archive.read(entry)?;
            let records: HashMap<String, MessageRecord> = decode_json(entry.path(), &data)?;
            let messages = records
                .into_iter()
                .map(|(key, record)| (key, record.message))
                .collect::<HashMap<_, _>>();

            debug!("loaded {} messages for locale {}", messages.len(), lang);
            locales.insert(lang.to_string(), messages);
        }

        if !locales.contains_key(default_locale) {
            debug!("default locale {} has no message table", default_locale);
        }

        Ok(Translator::new(default_locale, locales))
    }

    /// Returns the locale used when a requested language is unavailable
    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Returns the languages that have a message table
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.locales.keys().map(|x| x.as_str())
    }

    /// Returns the message table of a language
    pub fn messages(&self, lang: &str) -> Option<&HashMap<String, String>> {
        self.locales.get(lang)
    }

    /// Resolves a message for a language.
    ///
    /// - unknown or absent `lang` falls back to the default locale
    /// - without either table the input is returned
    /// - input that is not a `__MSG_<key>__` placeholder is returned
    /// - a key missing from the table resolves to the bare key
    pub fn message<'a>(&'a self, lang: Option<&str>, raw: &'a str) -> &'a str {
        let messages = lang
            .and_then(|lang| self.locales.get(lang))
            .or_else(|| self.locales.get(&self.default_locale));

        let Some(messages) = messages else {
            return raw;
        };

        let Some(key) = placeholder_key(raw) else {
            return raw;
        };

        match messages.get(key) {
            Some(message) => message.as_str(),
            None => {
                debug!("no message for placeholder key {}", key);
                key
            }
        }
    }
}

/// Extracts `<key>` from `__MSG_<key>__`
pub fn placeholder_key(raw: &str) -> Option<&str> {
    raw.strip_prefix(PLACEHOLDER_PREFIX)
        .and_then(|x| x.strip_suffix(PLACEHOLDER_SUFFIX))
        .filter(|key| !key.is_empty())
}

/// Returns the language of a `_locales/<lang>/messages.json` path
fn locale_of(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(LOCALES_ROOT)?;
    let (lang, file) = rest.split_once('/')?;
    (!lang.is_empty() && file == MESSAGES_FILE).then_some(lang)
}
