//! Test scenario / test case numbering.
//!
//! Test case ids look like `{task}-{build}-{project}-TS# 2-TC# 3-{timestamp}`.
//! Every distinct scenario of a task gets its own TS# and every distinct
//! expected result within a scenario gets its own TC#.

use crate::error::NumberingError;
use jiff::civil::DateTime;
use std::fmt::Display;

const TS_MARKER: &str = "-TS# ";
const TC_MARKER: &str = "-TC# ";
const TIMESTAMP_FORMAT: &str = "%d-%m-%y_%H-%M-%S";

/// The `TS#`/`TC#` pair of a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestCaseNumber {
    pub ts: u32,
    pub tc: u32,
}

impl TestCaseNumber {
    /// Extracts the first `-TS# n-TC# m` pair found in a test case id.
    pub fn parse(test_case_id: &str) -> Option<Self> {
        test_case_id
            .match_indices(TS_MARKER)
            .find_map(|(start, _)| Self::parse_at(&test_case_id[start + TS_MARKER.len()..]))
    }

    fn parse_at(rest: &str) -> Option<Self> {
        let (ts, rest) = leading_number(rest)?;
        let rest = rest.strip_prefix(TC_MARKER)?;
        let (tc, _) = leading_number(rest)?;
        Some(Self { ts, tc })
    }
}

impl Display for TestCaseNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TS# {}-TC# {}", self.ts, self.tc)
    }
}

fn leading_number(s: &str) -> Option<(u32, &str)> {
    let end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

/// A test case already recorded for a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingCase {
    pub test_case_id: String,
    pub scenario: String,
    pub expected_result: String,
}

/// Picks the number for a new test case of a task.
///
/// Cases whose id carries no `TS#`/`TC#` pair are skipped. A scenario seen
/// before keeps its TS# and gets the next free TC#; a new scenario opens the
/// next TS# at TC# 1. Repeating a scenario together with its expected result
/// is a duplicate.
pub fn next_number(
    existing: &[ExistingCase],
    scenario: &str,
    expected_result: &str,
) -> Result<TestCaseNumber, NumberingError> {
    if scenario.trim().is_empty() {
        return Err(NumberingError::EmptyField("test scenario"));
    }
    if expected_result.trim().is_empty() {
        return Err(NumberingError::EmptyField("expected result"));
    }

    let mut highest_ts = 0;
    let mut scenario_ts = None;
    let mut scenario_tc = 0;

    for case in existing {
        let Some(number) = TestCaseNumber::parse(&case.test_case_id) else {
            continue;
        };
        highest_ts = highest_ts.max(number.ts);

        if case.scenario != scenario {
            continue;
        }
        if case.expected_result == expected_result {
            return Err(NumberingError::Duplicate {
                ts: number.ts,
                tc: number.tc,
            });
        }
        scenario_ts.get_or_insert(number.ts);
        scenario_tc = scenario_tc.max(number.tc);
    }

    Ok(match scenario_ts {
        Some(ts) => TestCaseNumber {
            ts,
            tc: scenario_tc + 1,
        },
        None => TestCaseNumber {
            ts: highest_ts + 1,
            tc: 1,
        },
    })
}

/// Renders a test case id.
pub fn format_test_case_id(
    task: &str,
    build_version: &str,
    project: &str,
    number: TestCaseNumber,
    at: DateTime,
) -> String {
    format!(
        "{task}-{build_version}-{project}-{number}-{}",
        at.strftime(TIMESTAMP_FORMAT)
    )
}
