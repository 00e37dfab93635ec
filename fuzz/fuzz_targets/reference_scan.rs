#![no_main]

use std::collections::HashSet;

use ask_github_context::reference_extractor::{extract_references, ExtractionScope};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let scope = ExtractionScope {
        default_owner: "acme",
        default_repo: "widgets",
        origin_owner: "acme",
        same_owner_only: true,
        follow_hash_references: true,
    };

    let refs = extract_references(&text, &scope);
    let mut seen = HashSet::new();
    for entity_ref in &refs {
        assert_eq!(entity_ref.owner(), "acme");
        assert!(seen.insert(entity_ref.key.clone()), "duplicate key in scan output");
    }
});
