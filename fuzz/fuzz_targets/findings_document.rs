#![no_main]

use libfuzzer_sys::fuzz_target;

use imgwarden_scanner::RawFinding;
use imgwarden_scanner::findings::convert_finding;

fuzz_target!(|data: &[u8]| {
    let Ok(records) = serde_json::from_slice::<Vec<RawFinding>>(data) else {
        return;
    };
    for raw in &records {
        if let Some(finding) = convert_finding(raw, None) {
            assert!(!finding.title.is_empty());
            assert!(!finding.repository.is_empty());
            assert!(!finding.package_manager.is_empty());
            assert!(!finding.image_tag.is_empty());
        }
    }
});
