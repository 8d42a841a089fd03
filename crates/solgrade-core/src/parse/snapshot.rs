//! Gas-snapshot parser
//!
//! Input is the tool's snapshot file, one line per test:
//! `TestSuite:testName() (gas: 12345)`

use crate::{OverallReport, TestCaseReport, TestReport, TestStatus};
use regex::Regex;
use std::sync::LazyLock;

static SNAPSHOT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_]+):([A-Za-z0-9_]+)\(\)\s*\(gas:\s*(\d+)\)\s*$").unwrap()
});

/// Parse gas-snapshot output into a report of passing tests.
pub fn parse_gas_snapshot(input: &str) -> TestReport {
    let mut tests = Vec::new();

    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(caps) = SNAPSHOT_LINE.captures(line) else {
            continue;
        };

        let mut case = TestCaseReport::new(format!("{}.{}", &caps[1], &caps[2]));
        case.status = Some(TestStatus::Pass);
        case.gas_used = caps[3].parse().ok();
        tests.push(case);
    }

    if tests.is_empty() {
        return TestReport::default();
    }

    TestReport {
        overall: OverallReport {
            number_of_tests: Some(tests.len() as u64),
            ..Default::default()
        },
        tests,
    }
}
