use serde::Serialize;
use std::collections::BTreeMap;

/// Why an input fragment produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EmptyHref,
    UnresolvedReference,
    ReferenceCycle,
    CloneBudget,
    DegenerateGeometry,
    OrphanSegment,
    PathToken,
    MissingTextPathTarget,
    EmptyText,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::EmptyHref => "empty_href",
            SkipReason::UnresolvedReference => "unresolved_reference",
            SkipReason::ReferenceCycle => "reference_cycle",
            SkipReason::CloneBudget => "clone_budget",
            SkipReason::DegenerateGeometry => "degenerate_geometry",
            SkipReason::OrphanSegment => "orphan_segment",
            SkipReason::PathToken => "path_token",
            SkipReason::MissingTextPathTarget => "missing_text_path_target",
            SkipReason::EmptyText => "empty_text",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionReport {
    skipped: BTreeMap<SkipReason, usize>,
}

impl ConversionReport {
    pub fn record(&mut self, reason: SkipReason) {
        self.record_n(reason, 1);
    }

    pub fn record_n(&mut self, reason: SkipReason, count: usize) {
        if count == 0 {
            return;
        }
        let entry = self.skipped.entry(reason).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    pub fn merge(&mut self, other: &ConversionReport) {
        for (reason, count) in &other.skipped {
            self.record_n(*reason, *count);
        }
    }

    pub fn count(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn entries(&self) -> Vec<(SkipReason, usize)> {
        self.skipped.iter().map(|(r, c)| (*r, *c)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_merges() {
        let mut a = ConversionReport::default();
        a.record(SkipReason::PathToken);
        a.record_n(SkipReason::PathToken, 2);
        a.record_n(SkipReason::EmptyText, 0);
        let mut b = ConversionReport::default();
        b.record(SkipReason::UnresolvedReference);
        b.merge(&a);
        assert_eq!(b.count(SkipReason::PathToken), 3);
        assert_eq!(b.total(), 4);
        assert_eq!(b.entries().len(), 2);
        assert!(ConversionReport::default().is_empty());
    }

    #[test]
    fn serializes_reason_keys_as_snake_case() {
        let mut report = ConversionReport::default();
        report.record(SkipReason::DegenerateGeometry);
        let json = serde_json::to_value(&report).expect("report json");
        assert_eq!(json["skipped"]["degenerate_geometry"], 1);
    }
}
