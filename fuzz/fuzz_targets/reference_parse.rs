#![no_main]

use ask_github_context::{normalize_key, parse_reference, EntityKey};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);

    if let Ok(entity_ref) = parse_reference(&raw, Some(("fuzz-owner", "fuzz-repo"))) {
        let canonical = entity_ref.key.to_string();
        let reparsed = EntityKey::parse(&canonical).expect("canonical key reparses");
        assert_eq!(reparsed, entity_ref.key);
        assert!(entity_ref.number() > 0);
        assert_eq!(entity_ref.owner(), entity_ref.owner().to_ascii_lowercase());
    }

    if let Ok(key) = normalize_key(&raw) {
        assert_eq!(normalize_key(&key.to_string()), Ok(key));
    }
});
