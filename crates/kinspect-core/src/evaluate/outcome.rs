use crate::model::MetricValue;
use crate::rules::schema::{Severity, Threshold};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Verdict of one rule against one observed value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub rule_name: String,
    /// `true` when the rule did not fire.
    pub passed: bool,
    pub actual_value: MetricValue,
    /// The threshold resolved for the evaluation's environment.
    pub expected_value: Threshold,
    pub message: String,
    pub remediation: String,
    pub severity: Severity,
    pub evaluated_at: DateTime<Utc>,
}
