//! Assertions over the events a pipeline emitted.

use crate::core::StageName;
use crate::events::CollectingEventSink;

/// Returns `(stage, data_present)` for every event of `event_type`.
#[must_use]
pub fn stage_events(sink: &CollectingEventSink, event_type: &str) -> Vec<(String, bool)> {
    sink.events_of_type(event_type)
        .into_iter()
        .filter_map(|(_, data)| data)
        .map(|data| {
            (
                data["stage"].as_str().unwrap_or_default().to_string(),
                data["data_present"].as_bool().unwrap_or(false),
            )
        })
        .collect()
}

/// Asserts that exactly `expected` stages started, in that order.
pub fn assert_stage_sequence(sink: &CollectingEventSink, expected: &[StageName]) {
    let started: Vec<String> = stage_events(sink, "stage.started")
        .into_iter()
        .map(|(stage, _)| stage)
        .collect();
    let expected: Vec<&str> = expected.iter().map(StageName::as_str).collect();
    assert_eq!(started, expected, "Unexpected stage sequence");
}

/// Asserts that data was absent when extract started and present when every
/// later stage started.
pub fn assert_data_window(sink: &CollectingEventSink) {
    for (stage, data_present) in stage_events(sink, "stage.started") {
        let expected = stage != StageName::Extract.as_str();
        assert_eq!(
            data_present, expected,
            "Stage '{stage}' started with data_present={data_present}"
        );
    }
}
