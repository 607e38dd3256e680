/*!

A reader for CRX3 browser extension packages.

A CRX3 package is a small binary envelope followed by a zip archive:

```text
"Cr24" | version (u32 LE, 3) | metadata length n (u32 LE) | metadata (n bytes) | zip
```

The metadata is a protobuf encoded `CrxFileHeader` whose signed header data
carries the raw package id. The zip archive holds the `manifest.json`, the icon
assets and the `_locales/<lang>/messages.json` message tables.

## Quick Start

```no_run
use crxfile::CrxFile;

let data = std::fs::read("extension.crx")?;
let crx = CrxFile::from_slice(&data)?;

println!("id: {}", crx.id());
println!("name: {}", crx.message(Some("de"), &crx.manifest().name));

for (key, icon) in crx.icons()? {
    println!("icon {}: {} ({} bytes)", key, icon.name(), icon.data().len());
}
# Ok::<(), Box<dyn std::error::Error>>(())
```

## Package ids

The printable id maps every nibble of the raw id bytes to a letter in
`'a'..='p'`, high nibble first:

```rust
use crxfile::CrxId;

let id = CrxId::from_raw(&[0x00, 0x01, 0x0f, 0xf0]);
assert_eq!(id.as_str(), "aaabappa");
```

Packages opened without an envelope ([`CrxFile::from_archive`]) or without
signed header data have an empty id rather than failing to open.

## Messages

Strings of the form `__MSG_<key>__` resolve against the requested language,
then the manifest's `default_locale`. Anything else passes through untouched.

```rust
use crxfile::Translator;
use std::collections::HashMap;

let mut en = HashMap::new();
en.insert(String::from("foo"), String::from("Foo!"));
let mut locales = HashMap::new();
locales.insert(String::from("en"), en);

let translator = Translator::new("en", locales);
assert_eq!(translator.message(Some("fr"), "__MSG_foo__"), "Foo!");
assert_eq!(translator.message(Some("fr"), "plain text"), "plain text");
```

## Logging

Diagnostics are emitted through the [`log`](https://docs.rs/log) facade. No
logger is installed by the library.

*/

pub mod archive;
mod errors;
mod file;
mod header;
pub mod icon;
mod id;
pub mod locale;
mod manifest;
pub mod metadata;
mod options;

pub use self::archive::{ArchiveEntry, PackageArchive};
pub use self::errors::*;
pub use self::file::CrxFile;
pub use self::header::CrxHeader;
pub use self::icon::Icon;
pub use self::id::CrxId;
pub use self::locale::Translator;
pub use self::manifest::{Manifest, MANIFEST_PATH};
pub use self::metadata::SignedMetadata;
pub use self::options::CrxOptions;
pub use rawzip::ReaderAt;
