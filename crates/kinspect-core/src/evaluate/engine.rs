use crate::error::{EvalError, InspectError};
use crate::evaluate::outcome::RuleResult;
use crate::evaluate::validator::{resolved_threshold, unmet_labels, validator_for_value};
use crate::model::MetricValue;
use crate::rules::builtin;
use crate::rules::schema::{
    format_labels, Operator, Rule, RuleFilter, RulesConfig, Threshold, ValueKind,
};
use crate::rules::RuleLoader;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Evaluates single rules against single observed values.
///
/// The engine holds a loaded rule set and nothing else; the environment is
/// passed to every evaluation, so a shared `&Engine` is safe to use from
/// several threads.
#[derive(Debug, Clone)]
pub struct Engine {
    loader: RuleLoader,
}

impl Engine {
    /// Build an engine, loading the rules first. A load failure is fatal.
    pub fn new(mut loader: RuleLoader) -> Result<Self, InspectError> {
        loader.load()?;
        Ok(Engine { loader })
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, InspectError> {
        Engine::new(RuleLoader::new(path))
    }

    /// Engine over the bundled default rule set.
    pub fn builtin() -> Result<Self, InspectError> {
        Ok(Engine {
            loader: builtin::default_loader()?,
        })
    }

    /// Re-read the backing document if it changed. On failure the previous
    /// rules stay in effect.
    pub fn reload(&mut self) -> Result<bool, InspectError> {
        self.loader.load()
    }

    pub fn config(&self) -> Option<&RulesConfig> {
        self.loader.config()
    }

    pub fn rules(&self, filter: &RuleFilter) -> Vec<&Rule> {
        self.loader.rules(filter)
    }

    pub fn environment_for(&self, cluster_name: &str) -> &str {
        self.loader.environment_for(cluster_name)
    }

    /// Evaluate one rule against one observed value under `environment`.
    ///
    /// `passed` on the result is `true` when the rule did not fire. Scalar
    /// conditions fire when they hold; label-set conditions are requirements
    /// and fire when they do not.
    pub fn evaluate_rule(
        &self,
        rule: &Rule,
        actual: &MetricValue,
        environment: &str,
    ) -> Result<RuleResult, EvalError> {
        if !rule.enabled {
            return Err(EvalError::RuleDisabled {
                rule_id: rule.id.clone(),
            });
        }

        let condition = &rule.condition;
        let kind = condition.value_kind();
        let validator = validator_for_value(kind, condition.operator, actual);
        let threshold = resolved_threshold(&condition.metric, condition, environment)?;

        let holds = validator.compare(actual, condition.operator, threshold)?;
        let fired = if kind.is_requirement() { !holds } else { holds };

        let value = validator.format_value(actual);
        let message = if fired {
            format!(
                "{}: check failed, value {} {}",
                rule.name,
                value,
                expectation(kind, condition.operator, threshold, actual)
            )
        } else {
            format!("{}: check passed (value: {})", rule.name, value)
        };

        tracing::debug!(
            rule = %rule.id,
            environment,
            value = %value,
            threshold = %threshold,
            passed = !fired,
            "evaluated rule"
        );

        Ok(RuleResult {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            passed: !fired,
            actual_value: actual.clone(),
            expected_value: threshold.clone(),
            message,
            remediation: rule.remediation.clone(),
            severity: rule.severity,
            evaluated_at: Utc::now(),
        })
    }
}

/// The healthy side of a fired condition, in words.
fn expectation(
    kind: ValueKind,
    operator: Operator,
    threshold: &Threshold,
    actual: &MetricValue,
) -> String {
    if kind.is_requirement() {
        return requirement_expectation(operator, threshold, actual);
    }
    match operator {
        Operator::Ge => format!("should be less than {threshold}"),
        Operator::Gt => format!("should be less than or equal to {threshold}"),
        Operator::Lt => format!("should be greater than or equal to {threshold}"),
        Operator::Le => format!("should be greater than {threshold}"),
        Operator::Eq => format!("should not equal {threshold}"),
        Operator::Ne => format!("should equal {threshold}"),
        Operator::Contains => format!("should not contain {threshold}"),
        Operator::Matches => format!("should not match pattern {threshold}"),
        Operator::HasNonEmpty => format!("should not have non-empty {threshold}"),
    }
}

fn requirement_expectation(
    operator: Operator,
    threshold: &Threshold,
    actual: &MetricValue,
) -> String {
    let unmet = match (threshold, actual) {
        (Threshold::LabelSet(expected), MetricValue::Labels(have)) => {
            unmet_labels(have, operator, expected)
        }
        (Threshold::LabelSet(expected), _) => expected.clone(),
        _ => BTreeMap::new(),
    };

    if operator == Operator::HasNonEmpty {
        let keys: Vec<&str> = unmet.keys().map(String::as_str).collect();
        return match keys.as_slice() {
            [one] => format!("should have non-empty label '{one}'"),
            many => format!("should have non-empty labels [{}]", many.join(", ")),
        };
    }

    if unmet.len() == 1 {
        let (k, v) = unmet.iter().next().map(|(k, v)| (k.as_str(), v.as_str())).unwrap_or_default();
        format!("should have label '{k}={v}'")
    } else {
        format!("should have labels {}", format_labels(&unmet))
    }
}
