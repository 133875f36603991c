//! Joins response records against a page's resource timing entries.

use std::collections::HashMap;

use tracing::debug;

use crate::error::AnalysisError;
use crate::model::{PageTimingSnapshot, ResponseRecord, TimingEntry, VisibilityState};

/// Exact-name index over a snapshot. Only the first entry per name, in
/// snapshot order, is reachable; later duplicates are never matched.
#[derive(Debug)]
pub struct TimingIndex<'a> {
    by_name: HashMap<&'a str, &'a TimingEntry>,
}

impl<'a> TimingIndex<'a> {
    pub fn new(snapshot: &'a PageTimingSnapshot) -> Self {
        let mut by_name = HashMap::with_capacity(snapshot.resources.len());
        for entry in &snapshot.resources {
            by_name.entry(entry.name.as_str()).or_insert(entry);
        }
        Self { by_name }
    }

    pub fn lookup(&self, url: &str) -> Option<&'a TimingEntry> {
        self.by_name.get(url).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Outcome of matching one record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Correlation {
    pub state: VisibilityState,
    pub frame_depth: Option<u32>,
}

pub fn correlate(index: &TimingIndex<'_>, record: &ResponseRecord) -> Correlation {
    match index.lookup(&record.url) {
        None => Correlation {
            state: VisibilityState::Missing,
            frame_depth: None,
        },
        Some(entry) => Correlation {
            state: if entry.is_restricted() {
                VisibilityState::Restricted
            } else {
                VisibilityState::Visible
            },
            frame_depth: Some(entry.frame_depth),
        },
    }
}

/// Annotate every record in place. Fails without touching later records if
/// one of them already carries a visibility state.
pub fn annotate(
    records: &mut [ResponseRecord],
    snapshot: &PageTimingSnapshot,
) -> Result<(), AnalysisError> {
    if let Some(record) = records.iter().find(|r| r.visibility_state.is_some()) {
        return Err(AnalysisError::AlreadyCorrelated {
            url: record.url.clone(),
        });
    }

    let index = TimingIndex::new(snapshot);
    for record in records.iter_mut() {
        let correlation = correlate(&index, record);
        match correlation.state {
            VisibilityState::Missing => debug!(target: "correlator", url = %record.url, "missing"),
            VisibilityState::Restricted => debug!(target: "correlator", url = %record.url, "no TAO"),
            VisibilityState::Visible => {}
        }
        record.visibility_state = Some(correlation.state);
        if correlation.frame_depth.is_some() {
            record.frame_depth = correlation.frame_depth;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str) -> ResponseRecord {
        ResponseRecord {
            url: url.to_string(),
            content_length: 10,
            content_type: None,
            content_encoding: None,
            header_size: 0,
            transfer_size: 10,
            asset_type: None,
            host: "x".into(),
            frame_depth: None,
            visibility_state: None,
        }
    }

    fn entry(name: &str, no_tao: bool, response_start: f64, depth: u32) -> TimingEntry {
        TimingEntry {
            name: name.to_string(),
            initiator_type: "script".into(),
            no_tao,
            response_start,
            frame_depth: depth,
            ..TimingEntry::default()
        }
    }

    fn snapshot(entries: Vec<TimingEntry>) -> PageTimingSnapshot {
        PageTimingSnapshot {
            resources: entries,
            ..PageTimingSnapshot::default()
        }
    }

    #[test]
    fn unmatched_record_is_missing() {
        let snap = snapshot(vec![entry("https://x/other", false, 12.0, 0)]);
        let index = TimingIndex::new(&snap);
        let result = correlate(&index, &record("https://x/a"));
        assert_eq!(result.state, VisibilityState::Missing);
        assert_eq!(result.frame_depth, None);
    }

    #[test]
    fn match_is_exact_string_comparison() {
        let snap = snapshot(vec![entry("https://x/a/", false, 12.0, 0)]);
        let index = TimingIndex::new(&snap);
        assert_eq!(
            correlate(&index, &record("https://x/a")).state,
            VisibilityState::Missing
        );
    }

    #[test]
    fn zero_response_start_is_restricted() {
        let snap = snapshot(vec![entry("https://x/a", false, 0.0, 1)]);
        let index = TimingIndex::new(&snap);
        let result = correlate(&index, &record("https://x/a"));
        assert_eq!(result.state, VisibilityState::Restricted);
        assert_eq!(result.frame_depth, Some(1));
    }

    #[test]
    fn first_duplicate_wins() {
        let snap = snapshot(vec![
            entry("https://x/a", true, 0.0, 2),
            entry("https://x/a", false, 40.0, 0),
        ]);
        let index = TimingIndex::new(&snap);
        assert_eq!(index.len(), 1);
        let result = correlate(&index, &record("https://x/a"));
        assert_eq!(result.state, VisibilityState::Restricted);
        assert_eq!(result.frame_depth, Some(2));
    }

    #[test]
    fn annotate_sets_state_and_depth() {
        let snap = snapshot(vec![entry("https://x/a", false, 5.0, 3)]);
        let mut records = vec![record("https://x/a"), record("https://x/b")];
        annotate(&mut records, &snap).unwrap();
        assert_eq!(records[0].visibility_state, Some(VisibilityState::Visible));
        assert_eq!(records[0].frame_depth, Some(3));
        assert_eq!(records[1].visibility_state, Some(VisibilityState::Missing));
        assert_eq!(records[1].frame_depth, None);
    }

    #[test]
    fn annotate_refuses_a_second_pass() {
        let snap = snapshot(vec![]);
        let mut records = vec![record("https://x/a")];
        annotate(&mut records, &snap).unwrap();
        let err = annotate(&mut records, &snap).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::AlreadyCorrelated {
                url: "https://x/a".into()
            }
        );
    }
}
