//! The rule-evaluator seam.
//!
//! The rule engine runs out of process so policies can change without
//! rebuilding this core. The core posts `{"input": <facts>}` and expects
//! `{"result": {"violations": [Finding, ...]}}`; anything non-200 is an
//! evaluator error.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use accessgraph_core::{AccessGraphError, AgResult, CancelToken};

use crate::facts::PolicyFacts;

const DEFAULT_EVALUATOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Finding severity. LOW/MEDIUM are informational; HIGH is highlighted by
/// consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "HIGH")]
    High,
}

/// A policy violation reported by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    pub severity: Severity,
    #[serde(rename = "entityRef")]
    pub entity_ref: String,
    pub reason: String,
    pub remediation: String,
}

/// The single-method interface the external rule engine sits behind.
pub trait Evaluator {
    fn evaluate(&self, token: &CancelToken, facts: &PolicyFacts) -> AgResult<Vec<Finding>>;
}

#[derive(Debug, Deserialize)]
struct EvaluatorResponse {
    result: EvaluatorResult,
}

#[derive(Debug, Deserialize)]
struct EvaluatorResult {
    #[serde(default)]
    violations: Vec<Finding>,
}

/// JSON-over-HTTP evaluator client with a 10-second default deadline. A
/// tighter token deadline caps the request timeout further.
pub struct HttpEvaluator {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpEvaluator {
    pub fn new(url: impl Into<String>) -> AgResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DEFAULT_EVALUATOR_TIMEOUT)
            .build()
            .map_err(|e| AccessGraphError::Evaluator(format!("building client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl Evaluator for HttpEvaluator {
    fn evaluate(&self, token: &CancelToken, facts: &PolicyFacts) -> AgResult<Vec<Finding>> {
        token.check()?;

        let body = serde_json::json!({ "input": facts });
        let timeout = token
            .remaining()
            .map(|left| left.min(DEFAULT_EVALUATOR_TIMEOUT))
            .unwrap_or(DEFAULT_EVALUATOR_TIMEOUT);

        let response = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .json(&body)
            .send()
            .map_err(|e| {
                if token.is_canceled() || e.is_timeout() {
                    AccessGraphError::Canceled
                } else {
                    AccessGraphError::Evaluator(format!("calling evaluator: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AccessGraphError::Evaluator(format!(
                "evaluator returned status {status}: {body}"
            )));
        }

        let parsed: EvaluatorResponse = response
            .json()
            .map_err(|e| AccessGraphError::Evaluator(format!("decoding response: {e}")))?;

        debug!(violations = parsed.result.violations.len(), "evaluator responded");
        Ok(parsed.result.violations)
    }
}

/// Test fake: returns a fixed findings list.
#[derive(Debug, Clone, Default)]
pub struct FixedEvaluator {
    pub findings: Vec<Finding>,
}

impl FixedEvaluator {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self { findings }
    }
}

impl Evaluator for FixedEvaluator {
    fn evaluate(&self, token: &CancelToken, _facts: &PolicyFacts) -> AgResult<Vec<Finding>> {
        token.check()?;
        Ok(self.findings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(rule_id: &str, severity: Severity) -> Finding {
        Finding {
            rule_id: rule_id.into(),
            severity,
            entity_ref: "arn:aws:iam::111111111111:role/TestRole".into(),
            reason: "role trusts an external account".into(),
            remediation: "add an ExternalId condition".into(),
        }
    }

    #[test]
    fn test_fixed_evaluator_returns_canned_findings() {
        let evaluator = FixedEvaluator::new(vec![
            finding("cross-account-trust", Severity::High),
            finding("wildcard-policy", Severity::Medium),
        ]);
        let findings = evaluator
            .evaluate(&CancelToken::new(), &PolicyFacts::default())
            .unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn test_fixed_evaluator_honors_cancellation() {
        let evaluator = FixedEvaluator::default();
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            evaluator.evaluate(&token, &PolicyFacts::default()),
            Err(AccessGraphError::Canceled)
        ));
    }

    #[test]
    fn test_finding_wire_format() {
        let json = serde_json::to_value(finding("r1", Severity::Low)).unwrap();
        assert_eq!(json["ruleId"], "r1");
        assert_eq!(json["severity"], "LOW");
        assert_eq!(json["entityRef"], "arn:aws:iam::111111111111:role/TestRole");

        let parsed: Finding = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.severity, Severity::Low);
    }

    #[test]
    fn test_response_decoding() {
        let raw = r#"{
            "result": {
                "violations": [{
                    "ruleId": "wildcard-policy",
                    "severity": "HIGH",
                    "entityRef": "arn:aws:iam::111111111111:policy/Wide",
                    "reason": "policy grants s3:*",
                    "remediation": "narrow the action list"
                }]
            }
        }"#;
        let parsed: EvaluatorResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.result.violations.len(), 1);
        assert_eq!(parsed.result.violations[0].severity, Severity::High);

        // Missing violations key decodes as empty.
        let parsed: EvaluatorResponse = serde_json::from_str(r#"{"result": {}}"#).unwrap();
        assert!(parsed.result.violations.is_empty());
    }

    #[test]
    fn test_http_evaluator_rejects_unreachable_endpoint() {
        // Nothing listens on this port; the client must surface an evaluator
        // error rather than hang (connection refused is immediate).
        let evaluator = HttpEvaluator::new("http://127.0.0.1:1/v1/data/accessgraph").unwrap();
        let err = evaluator
            .evaluate(&CancelToken::new(), &PolicyFacts::default())
            .unwrap_err();
        assert!(matches!(err, AccessGraphError::Evaluator(_)));
    }
}
