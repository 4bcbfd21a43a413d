//! Custom test assertions for integration tests

use image_dl::{Event, SaveReport, SaveStatus, Size};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use walkdir::WalkDir;

/// Assert the report has exactly one outcome with the given status and size
pub fn assert_single(report: &SaveReport, status: SaveStatus, size: Size) {
    assert_eq!(
        report.outcomes.len(),
        1,
        "expected one outcome, got {:?}",
        report.outcomes
    );
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, status, "unexpected status for {outcome:?}");
    assert_eq!(outcome.size, size, "unexpected size for {outcome:?}");
}

/// Every regular file under `root`, sorted
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Assert that `root` contains exactly `expected` files
pub fn assert_files(root: &Path, expected: &[PathBuf]) {
    let mut expected = expected.to_vec();
    expected.sort();
    assert_eq!(files_under(root), expected);
}

/// Events currently buffered in `rx`
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Number of completion events in `events`
pub fn completion_count(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::Saved { .. }))
        .count()
}
