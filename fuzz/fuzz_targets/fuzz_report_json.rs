#![no_main]

use libfuzzer_sys::fuzz_target;
use scan_diff::{DiffEngine, Report};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(report) = Report::from_json(text) {
        // Any loaded report must diff against itself without changes.
        if let Ok(outcome) = DiffEngine::new().diff_reports(&report, &report) {
            if let Some(delta) = outcome.into_compared() {
                assert!(!delta.has_changes());
            }
        }
        let _ = report.to_json();
    }
});
