use crate::error::EvalError;
use crate::model::MetricValue;
use crate::rules::schema::{
    format_labels, Operator, RuleCondition, Scalar, Threshold, ValueKind,
};
use std::collections::BTreeMap;

/// Compares an observed value against a resolved threshold for one value kind.
///
/// `validate` answers "does the condition as written hold?". Whether that
/// means the rule fired is decided by the engine.
pub trait Validator: Send + Sync {
    fn kind(&self) -> ValueKind;

    /// Compare `actual` against an already resolved threshold.
    fn compare(
        &self,
        actual: &MetricValue,
        operator: Operator,
        threshold: &Threshold,
    ) -> Result<bool, EvalError>;

    /// Render a value the way this kind prints it in messages.
    fn format_value(&self, value: &MetricValue) -> String;

    /// Resolve the condition's threshold for `environment` and compare.
    fn validate(
        &self,
        metric: &str,
        actual: &MetricValue,
        condition: &RuleCondition,
        environment: &str,
    ) -> Result<bool, EvalError> {
        let threshold = resolved_threshold(metric, condition, environment)?;
        self.compare(actual, condition.operator, threshold)
    }
}

/// The condition's threshold for `environment`, or `NoThreshold`.
pub fn resolved_threshold<'c>(
    metric: &str,
    condition: &'c RuleCondition,
    environment: &str,
) -> Result<&'c Threshold, EvalError> {
    condition
        .resolve_threshold(environment)
        .ok_or_else(|| EvalError::NoThreshold {
            metric: metric.to_string(),
            environment: environment.to_string(),
        })
}

pub struct NumericValidator;
pub struct TextValidator;
pub struct FlagValidator;
pub struct LabelSetValidator;

static NUMERIC: NumericValidator = NumericValidator;
static TEXT: TextValidator = TextValidator;
static FLAG: FlagValidator = FlagValidator;
static LABEL_SET: LabelSetValidator = LabelSetValidator;

/// The validator for a value kind. The set is closed, so every kind has one.
pub fn validator_for(kind: ValueKind) -> &'static dyn Validator {
    match kind {
        ValueKind::Numeric => &NUMERIC,
        ValueKind::Text => &TEXT,
        ValueKind::Flag => &FLAG,
        ValueKind::LabelSet => &LABEL_SET,
    }
}

/// The validator for a condition applied to `actual`.
///
/// An observed flag under `==`/`!=` is always compared as a flag, so
/// thresholds such as `1` or `"1"` still match boolean metrics.
pub fn validator_for_value(
    kind: ValueKind,
    operator: Operator,
    actual: &MetricValue,
) -> &'static dyn Validator {
    let equality = matches!(operator, Operator::Eq | Operator::Ne);
    match actual {
        MetricValue::Flag(_) if equality && kind != ValueKind::LabelSet => &FLAG,
        _ => validator_for(kind),
    }
}

fn check_operator(kind: ValueKind, operator: Operator) -> Result<(), EvalError> {
    if kind.supports(operator) {
        Ok(())
    } else {
        Err(EvalError::UnsupportedOperator { kind, operator })
    }
}

fn coercion(what: &'static str, value: impl ToString, expected: ValueKind) -> EvalError {
    EvalError::Coercion {
        what,
        value: value.to_string(),
        expected,
    }
}

// ---------------------------------------------------------------------------
// Numeric
// ---------------------------------------------------------------------------

fn actual_as_f64(value: &MetricValue) -> Result<f64, EvalError> {
    match value {
        MetricValue::Int(i) => Ok(*i as f64),
        MetricValue::UInt(u) => Ok(*u as f64),
        MetricValue::Float(f) => Ok(*f),
        MetricValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| coercion("value", s, ValueKind::Numeric)),
        other => Err(coercion("value", other, ValueKind::Numeric)),
    }
}

fn threshold_as_f64(threshold: &Threshold) -> Result<f64, EvalError> {
    match threshold {
        Threshold::Scalar(Scalar::Number(n)) => Ok(*n),
        Threshold::Scalar(Scalar::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| coercion("threshold", s, ValueKind::Numeric)),
        other => Err(coercion("threshold", other, ValueKind::Numeric)),
    }
}

/// Integral values print without decimals, anything else with two.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{:.2}", n)
    }
}

impl Validator for NumericValidator {
    fn kind(&self) -> ValueKind {
        ValueKind::Numeric
    }

    fn compare(
        &self,
        actual: &MetricValue,
        operator: Operator,
        threshold: &Threshold,
    ) -> Result<bool, EvalError> {
        check_operator(self.kind(), operator)?;
        let a = actual_as_f64(actual)?;
        let t = threshold_as_f64(threshold)?;
        Ok(match operator {
            Operator::Gt => a > t,
            Operator::Ge => a >= t,
            Operator::Lt => a < t,
            Operator::Le => a <= t,
            Operator::Eq => a == t,
            Operator::Ne => a != t,
            _ => return Err(EvalError::UnsupportedOperator { kind: self.kind(), operator }),
        })
    }

    fn format_value(&self, value: &MetricValue) -> String {
        match actual_as_f64(value) {
            Ok(n) => format_number(n),
            Err(_) => value.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

fn actual_as_text(value: &MetricValue) -> Result<String, EvalError> {
    match value {
        MetricValue::Labels(_) => Err(coercion("value", value, ValueKind::Text)),
        other => Ok(other.to_string()),
    }
}

fn threshold_as_text(threshold: &Threshold) -> Result<String, EvalError> {
    match threshold {
        Threshold::Scalar(s) => Ok(s.to_string()),
        Threshold::LabelSet(_) => Err(coercion("threshold", threshold, ValueKind::Text)),
    }
}

impl Validator for TextValidator {
    fn kind(&self) -> ValueKind {
        ValueKind::Text
    }

    fn compare(
        &self,
        actual: &MetricValue,
        operator: Operator,
        threshold: &Threshold,
    ) -> Result<bool, EvalError> {
        check_operator(self.kind(), operator)?;
        let a = actual_as_text(actual)?;
        let t = threshold_as_text(threshold)?;
        match operator {
            Operator::Eq => Ok(a == t),
            Operator::Ne => Ok(a != t),
            Operator::Contains => Ok(a.contains(&t)),
            Operator::Matches => {
                let re = regex::Regex::new(&t).map_err(|e| EvalError::InvalidPattern {
                    pattern: t.clone(),
                    reason: e.to_string(),
                })?;
                Ok(re.is_match(&a))
            }
            _ => Err(EvalError::UnsupportedOperator { kind: self.kind(), operator }),
        }
    }

    fn format_value(&self, value: &MetricValue) -> String {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Flag
// ---------------------------------------------------------------------------

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn actual_as_flag(value: &MetricValue) -> Result<bool, EvalError> {
    match value {
        MetricValue::Flag(b) => Ok(*b),
        MetricValue::Int(i) => Ok(*i != 0),
        MetricValue::UInt(u) => Ok(*u != 0),
        MetricValue::Text(s) => parse_flag(s).ok_or_else(|| coercion("value", s, ValueKind::Flag)),
        other => Err(coercion("value", other, ValueKind::Flag)),
    }
}

fn threshold_as_flag(threshold: &Threshold) -> Result<bool, EvalError> {
    match threshold {
        Threshold::Scalar(Scalar::Flag(b)) => Ok(*b),
        Threshold::Scalar(Scalar::Number(n)) => Ok(*n != 0.0),
        Threshold::Scalar(Scalar::Text(s)) => {
            parse_flag(s).ok_or_else(|| coercion("threshold", s, ValueKind::Flag))
        }
        other => Err(coercion("threshold", other, ValueKind::Flag)),
    }
}

impl Validator for FlagValidator {
    fn kind(&self) -> ValueKind {
        ValueKind::Flag
    }

    fn compare(
        &self,
        actual: &MetricValue,
        operator: Operator,
        threshold: &Threshold,
    ) -> Result<bool, EvalError> {
        check_operator(self.kind(), operator)?;
        let a = actual_as_flag(actual)?;
        let t = threshold_as_flag(threshold)?;
        Ok(match operator {
            Operator::Eq => a == t,
            Operator::Ne => a != t,
            _ => return Err(EvalError::UnsupportedOperator { kind: self.kind(), operator }),
        })
    }

    fn format_value(&self, value: &MetricValue) -> String {
        match actual_as_flag(value) {
            Ok(b) => b.to_string(),
            Err(_) => value.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Label set
// ---------------------------------------------------------------------------

fn actual_as_labels(value: &MetricValue) -> Result<&BTreeMap<String, String>, EvalError> {
    match value {
        MetricValue::Labels(labels) => Ok(labels),
        other => Err(coercion("value", other, ValueKind::LabelSet)),
    }
}

fn threshold_as_labels(threshold: &Threshold) -> Result<&BTreeMap<String, String>, EvalError> {
    match threshold {
        Threshold::LabelSet(labels) => Ok(labels),
        other => Err(coercion("threshold", other, ValueKind::LabelSet)),
    }
}

/// Threshold keys the actual labels do not satisfy.
///
/// For `has_non_empty` a key is unsatisfied when it is absent or blank after
/// trimming; for `==` and `contains` when it is absent or its value differs.
pub fn unmet_labels(
    actual: &BTreeMap<String, String>,
    operator: Operator,
    expected: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    expected
        .iter()
        .filter(|(key, want)| match (operator, actual.get(*key)) {
            (_, None) => true,
            (Operator::HasNonEmpty, Some(have)) => have.trim().is_empty(),
            (_, Some(have)) => have != *want,
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl Validator for LabelSetValidator {
    fn kind(&self) -> ValueKind {
        ValueKind::LabelSet
    }

    fn compare(
        &self,
        actual: &MetricValue,
        operator: Operator,
        threshold: &Threshold,
    ) -> Result<bool, EvalError> {
        check_operator(self.kind(), operator)?;
        let a = actual_as_labels(actual)?;
        let t = threshold_as_labels(threshold)?;
        Ok(unmet_labels(a, operator, t).is_empty())
    }

    fn format_value(&self, value: &MetricValue) -> String {
        match value {
            MetricValue::Labels(labels) => format_labels(labels),
            other => other.to_string(),
        }
    }
}
