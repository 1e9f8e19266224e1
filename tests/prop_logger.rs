//! Property tests: every enabled record reaches the sink, in order.

mod test_utils;

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::Value;
use tetherlog::{ConsoleSink, TetherLevel, TetherLogger};
use test_utils::SharedBuf;

fn level() -> impl Strategy<Value = TetherLevel> {
    prop_oneof![
        Just(TetherLevel::Trace),
        Just(TetherLevel::Debug),
        Just(TetherLevel::Info),
        Just(TetherLevel::Warn),
        Just(TetherLevel::Error),
        Just(TetherLevel::Critical),
    ]
}

proptest! {
    #[test]
    fn enabled_records_are_written_in_order(
        threshold in level(),
        records in proptest::collection::vec((level(), "[^\n]{0,40}"), 1..20),
    ) {
        let buffer = SharedBuf::default();
        let logger = TetherLogger::new("prop").with_level(threshold);
        logger.add_sink(Arc::new(ConsoleSink::from_writer(buffer.clone())));

        let mut expected = Vec::new();
        for (level, message) in &records {
            if logger.log(*level, message).is_some() {
                expected.push(message.clone());
            }
            prop_assert_eq!(logger.is_enabled_for(*level), *level >= threshold);
        }

        let written: Vec<String> = buffer
            .lines()
            .iter()
            .map(|line| {
                let value: Value = serde_json::from_str(line).expect("json line");
                value["msg"].as_str().unwrap_or_default().to_owned()
            })
            .collect();
        prop_assert_eq!(written, expected);
    }
}
