//! Forge test-run parser
//!
//! Scans a test run's stdout for per-test result lines and the per-suite
//! summary lines:
//!
//! ```text
//! Running 2 tests for test/Counter.t.sol:CounterTest
//! [PASS] testIncrement() (gas: 28334)
//! [FAIL. Reason: nope] testSetNumber(uint256)
//! Test result: FAILED. 1 passed; 1 failed; finished in 1.24ms
//! ```
//!
//! Test names are qualified with the suite from the most recent `Running`
//! header so they line up with snapshot names (`Suite.testName`).

use crate::{OverallReport, TestCaseReport, TestReport, TestStatus};
use regex::Regex;
use std::sync::LazyLock;

static SUITE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Running \d+ tests? for \S+:([A-Za-z0-9_]+)\s*$").unwrap()
});

static PASS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[PASS\] ([A-Za-z0-9_]+)\([^)]*\)(?:\s*\(gas:\s*(\d+)\))?\s*$").unwrap()
});

static FAIL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[FAIL\. Reason: (.*?)\] ([A-Za-z0-9_]+)\([^)]*\)(?:\s*\(gas:\s*(\d+)\))?\s*$")
        .unwrap()
});

static SUMMARY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Test result: .*?(\d+) passed; (\d+) failed").unwrap());

/// Parse forge test output into per-test records plus overall counters.
pub fn parse_forge_test(input: &str) -> TestReport {
    let mut tests = Vec::new();
    let mut suite: Option<String> = None;
    let mut summary: Option<(u64, u64)> = None;

    for line in input.lines() {
        let line = line.trim();

        if let Some(caps) = SUITE_HEADER.captures(line) {
            suite = Some(caps[1].to_string());
            continue;
        }

        if let Some(caps) = PASS_LINE.captures(line) {
            let mut case = TestCaseReport::new(qualify(suite.as_deref(), &caps[1]));
            case.status = Some(TestStatus::Pass);
            case.gas_used = caps.get(2).and_then(|m| m.as_str().parse().ok());
            tests.push(case);
            continue;
        }

        if let Some(caps) = FAIL_LINE.captures(line) {
            let mut case = TestCaseReport::new(qualify(suite.as_deref(), &caps[2]));
            case.status = Some(TestStatus::Fail);
            case.reason = Some(caps[1].to_string());
            case.gas_used = caps.get(3).and_then(|m| m.as_str().parse().ok());
            tests.push(case);
            continue;
        }

        if let Some(caps) = SUMMARY_LINE.captures(line) {
            let passed: u64 = caps[1].parse().unwrap_or(0);
            let failed: u64 = caps[2].parse().unwrap_or(0);
            let (p, f) = summary.unwrap_or((0, 0));
            summary = Some((p + passed, f + failed));
        }
    }

    let overall = match summary {
        Some((passed, failed)) => OverallReport {
            number_of_tests: Some(passed + failed),
            number_of_passed: Some(passed),
            number_of_failed: Some(failed),
            passed: Some(failed == 0),
            ..Default::default()
        },
        None => OverallReport::default(),
    };

    TestReport { overall, tests }
}

fn qualify(suite: Option<&str>, test: &str) -> String {
    match suite {
        Some(suite) => format!("{suite}.{test}"),
        None => test.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_passing_run() {
        let input = "\
Running 1 test for test/A.t.sol:A
[PASS] testFoo() (gas: 28334)
Test result: ok. 1 passed; 0 failed; finished in 1.24ms
";
        let report = parse_forge_test(input);
        assert_eq!(report.overall.number_of_tests, Some(1));
        assert_eq!(report.overall.number_of_passed, Some(1));
        assert_eq!(report.overall.number_of_failed, Some(0));
        assert_eq!(report.overall.passed, Some(true));
        assert_eq!(report.tests.len(), 1);
        assert_eq!(report.tests[0].test, "A.testFoo");
        assert_eq!(report.tests[0].status, Some(TestStatus::Pass));
        assert_eq!(report.tests[0].gas_used, Some(28334));
    }

    #[test]
    fn test_failing_run_captures_reason() {
        let input = "\
Running 1 test for test/A.t.sol:A
[FAIL. Reason: nope] testFoo()
Test result: FAILED. 0 passed; 1 failed; finished in 980.13µs
";
        let report = parse_forge_test(input);
        assert_eq!(report.overall.number_of_tests, Some(1));
        assert_eq!(report.overall.number_of_passed, Some(0));
        assert_eq!(report.overall.number_of_failed, Some(1));
        assert_eq!(report.overall.passed, Some(false));
        assert_eq!(report.tests[0].test, "A.testFoo");
        assert_eq!(report.tests[0].status, Some(TestStatus::Fail));
        assert_eq!(report.tests[0].reason.as_deref(), Some("nope"));
        assert_eq!(report.tests[0].gas_used, None);
    }

    #[test]
    fn test_multiple_suites_accumulate() {
        let input = "\
Running 2 tests for test/Counter.t.sol:CounterTest
[PASS] testIncrement() (gas: 28334)
[FAIL. Reason: Arithmetic over/underflow] testDecrement() (gas: 10421)
Test result: FAILED. 1 passed; 1 failed; finished in 1.01ms

Running 1 test for test/Token.t.sol:TokenTest
[PASS] testTransfer() (gas: 51042)
Test result: ok. 1 passed; 0 failed; finished in 2.88ms
";
        let report = parse_forge_test(input);
        assert_eq!(report.overall.number_of_tests, Some(3));
        assert_eq!(report.overall.number_of_passed, Some(2));
        assert_eq!(report.overall.number_of_failed, Some(1));
        assert_eq!(report.overall.passed, Some(false));
        assert_eq!(
            report.test_names(),
            vec![
                "CounterTest.testIncrement",
                "CounterTest.testDecrement",
                "TokenTest.testTransfer"
            ]
        );
        assert_eq!(
            report.tests[1].reason.as_deref(),
            Some("Arithmetic over/underflow")
        );
    }

    #[test]
    fn test_parameterized_test_names() {
        let input = "\
Running 1 test for test/Fuzz.t.sol:FuzzTest
[PASS] testFuzzAdd(uint256,uint256) (gas: 11023)
Test result: ok. 1 passed; 0 failed; finished in 40.01ms
";
        let report = parse_forge_test(input);
        assert_eq!(report.tests[0].test, "FuzzTest.testFuzzAdd");
    }

    #[test]
    fn test_zero_tests_summary() {
        let input = "Test result: ok. 0 passed; 0 failed; finished in 0.02ms\n";
        let report = parse_forge_test(input);
        assert_eq!(report.overall.number_of_tests, Some(0));
        assert_eq!(report.overall.passed, Some(true));
        assert!(report.tests.is_empty());
    }

    #[test]
    fn test_unqualified_when_no_suite_header() {
        let input = "[PASS] testFoo() (gas: 1)\n";
        let report = parse_forge_test(input);
        assert_eq!(report.tests[0].test, "testFoo");
        assert!(report.overall.is_empty());
    }

    #[test]
    fn test_unrecognized_input_yields_empty_report() {
        assert!(parse_forge_test("").is_empty());
        assert!(parse_forge_test("compiler output\nwarnings\n").is_empty());
    }

    #[test]
    fn test_counts_are_consistent() {
        let input = "\
Running 2 tests for test/A.t.sol:A
[PASS] testFoo() (gas: 1)
[FAIL. Reason: revert] testBar()
Test result: FAILED. 1 passed; 1 failed; finished in 1ms
";
        let report = parse_forge_test(input);
        assert_eq!(
            report.overall.number_of_tests.unwrap(),
            report.tests.len() as u64
        );
        assert_eq!(
            report.overall.number_of_tests.unwrap(),
            report.overall.number_of_passed.unwrap() + report.overall.number_of_failed.unwrap()
        );
    }
}
