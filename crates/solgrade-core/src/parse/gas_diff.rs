//! Gas-diff parser
//!
//! Scans snapshot-comparison output for per-test gas figures:
//! `TestSuite:testName() (gas: 28334 (Δ -120))`. The suite prefix is
//! optional; some tool versions print bare test names.

use crate::{OverallReport, TestCaseReport, TestReport, TestStatus};
use regex::Regex;
use std::sync::LazyLock;

static DIFF_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:([A-Za-z0-9_]+):)?([A-Za-z0-9_]+)\(\)\s*\(gas:\s*(\d+)\s*\(Δ\s*(-?\d+)\)\)\s*$",
    )
    .unwrap()
});

/// Parse gas-diff output; `gasDiffOverall` is the sum of signed diffs.
pub fn parse_gas_diff(input: &str) -> TestReport {
    let mut tests = Vec::new();
    let mut total: i64 = 0;

    for line in input.lines() {
        let line = line.trim();
        let Some(caps) = DIFF_LINE.captures(line) else {
            continue;
        };

        let name = match caps.get(1) {
            Some(suite) => format!("{}.{}", suite.as_str(), &caps[2]),
            None => caps[2].to_string(),
        };

        let Ok(diff) = caps[4].parse::<i64>() else {
            continue;
        };

        let mut case = TestCaseReport::new(name);
        case.status = Some(TestStatus::Pass);
        case.gas_used = caps[3].parse().ok();
        case.gas_diff = Some(diff);
        total += diff;
        tests.push(case);
    }

    if tests.is_empty() {
        return TestReport::default();
    }

    TestReport {
        overall: OverallReport {
            gas_diff_overall: Some(total),
            ..Default::default()
        },
        tests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_qualified_diff_lines() {
        let input = "\
CounterTest:testIncrement() (gas: 28334 (Δ -120))
CounterTest:testSetNumber() (gas: 25606 (Δ 48))
";
        let report = parse_gas_diff(input);
        assert_eq!(report.tests.len(), 2);
        assert_eq!(report.tests[0].test, "CounterTest.testIncrement");
        assert_eq!(report.tests[0].gas_used, Some(28334));
        assert_eq!(report.tests[0].gas_diff, Some(-120));
        assert_eq!(report.tests[1].gas_diff, Some(48));
        assert_eq!(report.overall.gas_diff_overall, Some(-72));
    }

    #[test]
    fn test_bare_test_name() {
        let report = parse_gas_diff("testIncrement() (gas: 28334 (Δ 0))\n");
        assert_eq!(report.tests[0].test, "testIncrement");
        assert_eq!(report.overall.gas_diff_overall, Some(0));
    }

    #[test]
    fn test_noise_skipped() {
        let input = "\
Compiling 12 files with 0.8.23
CounterTest:testIncrement() (gas: 28334 (Δ -120))
Overall gas change: -120 (-0.42%)
";
        let report = parse_gas_diff(input);
        assert_eq!(report.tests.len(), 1);
        assert_eq!(report.overall.gas_diff_overall, Some(-120));
    }

    #[test]
    fn test_plain_snapshot_lines_do_not_match() {
        // Lines without a delta belong to the snapshot parser.
        let report = parse_gas_diff("CounterTest:testIncrement() (gas: 28334)\n");
        assert!(report.is_empty());
    }

    #[test]
    fn test_empty_input_yields_empty_report() {
        assert!(parse_gas_diff("").is_empty());
    }
}
