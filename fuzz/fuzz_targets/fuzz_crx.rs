#![no_main]
use crxfile::{CrxFile, CrxId, SignedMetadata};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The metadata decoder must reject or accept arbitrary bytes without panicking
    if let Ok(meta) = SignedMetadata::parse(data) {
        let _ = CrxId::from_raw(meta.crx_id());
    }

    let Ok(crx) = CrxFile::from_slice(data) else {
        return;
    };

    let _id = crx.id();
    let manifest = crx.manifest();
    let _ = crx.message(None, &manifest.name);
    let _ = crx.localized_manifest(Some("en"));
    let _ = crx.icons_lossy();

    for entry in crx.archive().entries() {
        let _ = crx.archive().read(entry);
    }
});
