//! Execution-argument whitelist
//!
//! Callers may forward a closed set of tool flags with a submission.
//! Unknown keys are dropped with a warning rather than failing the run;
//! the submission still executes with whatever survived.

use serde_json::Value;
use std::collections::HashMap;

/// Accepted argument keys and the tool flag each maps to.
const WHITELIST: [(&str, &str); 8] = [
    ("matchContract", "--match-contract"),
    ("matchTest", "--match-test"),
    ("matchPath", "--match-path"),
    ("noMatchContract", "--no-match-contract"),
    ("noMatchTest", "--no-match-test"),
    ("noMatchPath", "--no-match-path"),
    ("fuzzRuns", "--fuzz-runs"),
    ("fuzzSeed", "--fuzz-seed"),
];

/// Translate whitelisted execution arguments into tool flags, in
/// whitelist order for deterministic commands.
pub fn build_tool_args(args: &HashMap<String, Value>) -> Vec<String> {
    for key in args.keys() {
        if !WHITELIST.iter().any(|(k, _)| k == key) {
            tracing::warn!(key = %key, "dropping unknown execution argument");
        }
    }

    let mut out = Vec::new();
    for (key, flag) in WHITELIST {
        let Some(value) = args.get(key) else {
            continue;
        };
        let Some(rendered) = render(value) else {
            tracing::warn!(key, ?value, "dropping execution argument with unsupported value");
            continue;
        };
        out.push(flag.to_string());
        out.push(rendered);
    }
    out
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_string_and_number_values() {
        let flags = build_tool_args(&args(&[
            ("matchContract", json!("CounterTest")),
            ("fuzzRuns", json!(256)),
        ]));
        assert_eq!(
            flags,
            vec!["--match-contract", "CounterTest", "--fuzz-runs", "256"]
        );
    }

    #[test]
    fn test_unknown_key_silently_dropped() {
        let flags = build_tool_args(&args(&[
            ("badArg", json!("x")),
            ("matchTest", json!("testFoo")),
        ]));
        assert_eq!(flags, vec!["--match-test", "testFoo"]);
    }

    #[test]
    fn test_deterministic_whitelist_order() {
        let flags = build_tool_args(&args(&[
            ("fuzzSeed", json!("0xdead")),
            ("matchPath", json!("test/Counter.t.sol")),
        ]));
        assert_eq!(
            flags,
            vec!["--match-path", "test/Counter.t.sol", "--fuzz-seed", "0xdead"]
        );
    }

    #[test]
    fn test_structured_value_dropped() {
        let flags = build_tool_args(&args(&[("matchContract", json!({"nested": true}))]));
        assert!(flags.is_empty());
    }

    #[test]
    fn test_empty_args() {
        assert!(build_tool_args(&HashMap::new()).is_empty());
    }
}
