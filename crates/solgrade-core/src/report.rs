//! Structured test reports
//!
//! The sandbox tool emits plain text; the parsers condense it into a
//! `TestReport`, the closed-schema value every reply and history record
//! carries. Fields are optional: a parser only sets what it can derive
//! from its input, and reports from different parsers are merged with
//! [`TestReport::merge`].

use serde::{Deserialize, Serialize};

/// Aggregate figures across a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverallReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_tests: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_passed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_failed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_diff_overall: Option<i64>,
}

impl OverallReport {
    pub fn is_empty(&self) -> bool {
        self.number_of_tests.is_none()
            && self.number_of_passed.is_none()
            && self.number_of_failed.is_none()
            && self.passed.is_none()
            && self.gas_diff_overall.is_none()
    }

    /// Field-wise union, existing values win.
    fn fill_from(&mut self, other: &OverallReport) {
        self.number_of_tests = self.number_of_tests.or(other.number_of_tests);
        self.number_of_passed = self.number_of_passed.or(other.number_of_passed);
        self.number_of_failed = self.number_of_failed.or(other.number_of_failed);
        self.passed = self.passed.or(other.passed);
        self.gas_diff_overall = self.gas_diff_overall.or(other.gas_diff_overall);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Pass,
    Fail,
}

/// One test's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseReport {
    /// Qualified test name, `Suite.testName`.
    pub test: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TestStatus>,
    #[serde(rename = "gasUsed", skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    #[serde(rename = "gasDiff", skip_serializing_if = "Option::is_none")]
    pub gas_diff: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TestCaseReport {
    pub fn new(test: impl Into<String>) -> Self {
        Self {
            test: test.into(),
            status: None,
            gas_used: None,
            gas_diff: None,
            reason: None,
        }
    }
}

/// Parsed output of a sandbox run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestReport {
    pub overall: OverallReport,
    pub tests: Vec<TestCaseReport>,
}

impl TestReport {
    pub fn is_empty(&self) -> bool {
        self.overall.is_empty() && self.tests.is_empty()
    }

    /// Names of every test in source order.
    pub fn test_names(&self) -> Vec<String> {
        self.tests.iter().map(|t| t.test.clone()).collect()
    }

    /// Merge two reports: the overall block is a field-wise union
    /// preferring `primary`; tests are keyed by name, `primary` order
    /// first, with per-test fields filled from `secondary` where
    /// `primary` left them unset.
    pub fn merge(primary: TestReport, secondary: TestReport) -> TestReport {
        let mut overall = primary.overall.clone();
        overall.fill_from(&secondary.overall);

        let mut tests = primary.tests;
        for test in &mut tests {
            if let Some(other) = secondary.tests.iter().find(|t| t.test == test.test) {
                test.status = test.status.or(other.status);
                test.gas_used = test.gas_used.or(other.gas_used);
                test.gas_diff = test.gas_diff.or(other.gas_diff);
                if test.reason.is_none() {
                    test.reason = other.reason.clone();
                }
            }
        }
        for other in secondary.tests {
            if !tests.iter().any(|t| t.test == other.test) {
                tests.push(other);
            }
        }

        TestReport { overall, tests }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn case(name: &str) -> TestCaseReport {
        TestCaseReport::new(name)
    }

    #[test]
    fn test_empty_report_serializes_without_optionals() {
        let report = TestReport::default();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["overall"], serde_json::json!({}));
        assert_eq!(json["tests"], serde_json::json!([]));
    }

    #[test]
    fn test_wire_field_names() {
        let report = TestReport {
            overall: OverallReport {
                number_of_tests: Some(2),
                number_of_passed: Some(1),
                number_of_failed: Some(1),
                passed: Some(false),
                gas_diff_overall: Some(-5),
            },
            tests: vec![TestCaseReport {
                test: "A.testFoo".into(),
                status: Some(TestStatus::Fail),
                gas_used: Some(1234),
                gas_diff: Some(-5),
                reason: Some("nope".into()),
            }],
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["overall"]["numberOfTests"], 2);
        assert_eq!(json["overall"]["numberOfPassed"], 1);
        assert_eq!(json["overall"]["numberOfFailed"], 1);
        assert_eq!(json["overall"]["passed"], false);
        assert_eq!(json["overall"]["gasDiffOverall"], -5);
        assert_eq!(json["tests"][0]["test"], "A.testFoo");
        assert_eq!(json["tests"][0]["status"], "FAIL");
        assert_eq!(json["tests"][0]["gasUsed"], 1234);
        assert_eq!(json["tests"][0]["gasDiff"], -5);
        assert_eq!(json["tests"][0]["reason"], "nope");
    }

    #[test]
    fn test_merge_prefers_primary_overall() {
        let primary = TestReport {
            overall: OverallReport {
                number_of_tests: Some(3),
                passed: Some(true),
                ..Default::default()
            },
            tests: vec![],
        };
        let secondary = TestReport {
            overall: OverallReport {
                number_of_tests: Some(99),
                gas_diff_overall: Some(7),
                ..Default::default()
            },
            tests: vec![],
        };

        let merged = TestReport::merge(primary, secondary);
        assert_eq!(merged.overall.number_of_tests, Some(3));
        assert_eq!(merged.overall.passed, Some(true));
        assert_eq!(merged.overall.gas_diff_overall, Some(7));
    }

    #[test]
    fn test_merge_fills_test_fields_by_name() {
        let mut pass = case("A.testFoo");
        pass.status = Some(TestStatus::Pass);
        pass.gas_used = Some(100);

        let mut diff = case("A.testFoo");
        diff.gas_used = Some(999);
        diff.gas_diff = Some(-20);

        let merged = TestReport::merge(
            TestReport {
                overall: OverallReport::default(),
                tests: vec![pass],
            },
            TestReport {
                overall: OverallReport::default(),
                tests: vec![diff],
            },
        );

        assert_eq!(merged.tests.len(), 1);
        let t = &merged.tests[0];
        assert_eq!(t.status, Some(TestStatus::Pass));
        assert_eq!(t.gas_used, Some(100), "primary value wins");
        assert_eq!(t.gas_diff, Some(-20), "secondary fills the gap");
    }

    #[test]
    fn test_merge_keeps_tests_unique_to_either_side() {
        let merged = TestReport::merge(
            TestReport {
                overall: OverallReport::default(),
                tests: vec![case("A.testFoo"), case("A.testBar")],
            },
            TestReport {
                overall: OverallReport::default(),
                tests: vec![case("A.testBar"), case("B.testBaz")],
            },
        );

        assert_eq!(
            merged.test_names(),
            vec!["A.testFoo", "A.testBar", "B.testBaz"]
        );
    }

    #[test]
    fn test_merge_preserves_primary_order() {
        let merged = TestReport::merge(
            TestReport {
                overall: OverallReport::default(),
                tests: vec![case("C.c"), case("A.a"), case("B.b")],
            },
            TestReport {
                overall: OverallReport::default(),
                tests: vec![case("A.a"), case("C.c")],
            },
        );

        assert_eq!(merged.test_names(), vec!["C.c", "A.a", "B.b"]);
    }
}
