//! Consistency audit of the issued-code ledger.
//!
//! A ledger is consistent when its code numbers are exactly `1..=max`, each
//! appearing once. The audit runs over the full ledger every time; callers
//! decide whether that happens on every issuance or on demand.

use crate::code::SequenceCode;
use crate::repository::QaStatus;
use serde::Serialize;
use std::collections::BTreeMap;

/// A code number that appears more than once in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DuplicateCode {
    pub code: SequenceCode,
    pub occurrences: usize,
}

/// An inclusive run of code numbers missing from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Gap {
    pub first: SequenceCode,
    pub last: SequenceCode,
}

impl Gap {
    /// Number of codes missing in this run.
    pub fn count(&self) -> u64 {
        self.last.value() - self.first.value() + 1
    }
}

/// Result of scanning the whole ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AuditReport {
    /// Number of ledger rows scanned.
    pub total: usize,
    /// Number of distinct code numbers.
    pub distinct: usize,
    /// Highest code number, `None` for an empty ledger.
    pub highest: Option<SequenceCode>,
    /// Code numbers issued more than once, in ascending order.
    pub duplicates: Vec<DuplicateCode>,
    /// Runs of `1..=highest` that were never issued, in ascending order.
    pub gaps: Vec<Gap>,
}

impl AuditReport {
    /// Audits a ledger given all of its code numbers in any order.
    pub fn from_codes<I>(codes: I) -> Self
    where
        I: IntoIterator<Item = SequenceCode>,
    {
        let mut occurrences: BTreeMap<SequenceCode, usize> = BTreeMap::new();
        let mut total = 0;
        for code in codes {
            *occurrences.entry(code).or_default() += 1;
            total += 1;
        }

        let duplicates = occurrences
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(code, count)| DuplicateCode {
                code: *code,
                occurrences: *count,
            })
            .collect();

        // Walk the sorted distinct values; anything skipped between two
        // neighbours is missing. Zero sits outside `1..=max` and is ignored.
        let mut gaps = Vec::new();
        let mut expected: u64 = 1;
        for code in occurrences.keys() {
            let value = code.value();
            if value == 0 {
                continue;
            }
            if value > expected {
                gaps.push(Gap {
                    first: SequenceCode::new(expected),
                    last: SequenceCode::new(value - 1),
                });
            }
            expected = value.saturating_add(1);
        }

        Self {
            total,
            distinct: occurrences.len(),
            highest: occurrences.keys().next_back().copied(),
            duplicates,
            gaps,
        }
    }

    pub fn has_duplicates(&self) -> bool {
        self.total != self.distinct
    }

    pub fn has_gaps(&self) -> bool {
        !self.gaps.is_empty()
    }

    /// Total number of codes missing from `1..=highest`.
    pub fn missing_count(&self) -> u64 {
        self.gaps.iter().map(Gap::count).sum()
    }

    pub fn is_consistent(&self) -> bool {
        !self.has_duplicates() && !self.has_gaps()
    }

    /// The status an audit pass stamps onto the triggering row.
    pub fn verdict(&self) -> QaStatus {
        if self.is_consistent() {
            QaStatus::Consistent
        } else {
            QaStatus::Inconsistent
        }
    }
}
