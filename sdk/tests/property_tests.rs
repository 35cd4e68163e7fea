use proptest::prelude::*;
use sdk::errors::{EngineError, LifeOsErrorExt};
use sdk::types::{ActionType, ProjectStatus};

// Every error carries a non-empty, static user hint that never echoes the
// raw payload it was built from.
proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "zq[0-9]{6,20}") {
        let errs = vec![
            EngineError::Config(error_str.clone()),
            EngineError::LLMProvider(error_str.clone()),
            EngineError::InvalidRequest(error_str.clone()),
            EngineError::MalformedResponse { raw: error_str.clone() },
            EngineError::NotConfigured(error_str.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains(&error_str));
        }
    }
}

proptest! {
    #[test]
    fn test_project_status_cycle_modulo_three(start in 0usize..3, toggles in 0usize..50) {
        let all = [ProjectStatus::Planning, ProjectStatus::Active, ProjectStatus::Completed];
        let mut status = all[start];
        for _ in 0..toggles {
            status = status.next();
        }
        prop_assert_eq!(status, all[(start + toggles) % 3]);
    }

    #[test]
    fn test_action_type_tag_round_trip(tag in "[A-Za-z_]{1,20}") {
        let parsed = ActionType::parse(&tag);
        let reparsed = ActionType::parse(parsed.as_str());
        prop_assert_eq!(parsed, reparsed);
    }
}
