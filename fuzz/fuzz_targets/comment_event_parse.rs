#![no_main]

use ask_github_context::{
    extract_question, parse_comment_event, seed_from_event_payload, QuestionTrigger,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let Ok(event) = parse_comment_event(&raw) else {
        return;
    };

    if let Ok(seed) = seed_from_event_payload(&event) {
        assert!(seed.number() > 0);
        assert!(!seed.url.trim().is_empty());
    }

    for trigger in [QuestionTrigger::mention("askbot"), QuestionTrigger::gpt_command()] {
        if let Ok(question) = extract_question(&event, &trigger) {
            assert!(!question.trim().is_empty());
            assert_eq!(question, question.trim());
        }
    }
});
