use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Only accepted value of the document's `kind` field.
pub const RULES_CONFIG_KIND: &str = "RulesConfig";

/// Reserved key used both in `clusterEnvironments` and in per-environment
/// threshold maps.
pub const DEFAULT_ENVIRONMENT_KEY: &str = "default";

/// Environment used when neither the cluster map nor the global config names one.
pub const FALLBACK_ENVIRONMENT: &str = "prod";

// ---------------------------------------------------------------------------
// Document shape, as authored
// ---------------------------------------------------------------------------

/// A rules document exactly as deserialized, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesConfigDef {
    #[serde(default, rename = "apiVersion")]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub config: GlobalConfig,
    #[serde(default, rename = "clusterEnvironments")]
    pub cluster_environments: BTreeMap<String, String>,
    #[serde(default)]
    pub rules: Vec<RuleDef>,
}

/// A single rule as authored. Every field is optional at this stage so
/// validation can report exactly which one is missing.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleDef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub condition: ConditionDef,
    #[serde(default)]
    pub remediation: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConditionDef {
    #[serde(default)]
    pub metric: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub threshold: Option<serde_yaml::Value>,
    #[serde(default)]
    pub thresholds: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub duration: Option<String>,
}

/// Global `config` block. `auto_reload` and `reload_interval` are carried
/// through but drive no background process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    #[serde(default)]
    pub auto_reload: bool,
    #[serde(default)]
    pub reload_interval: String,
    #[serde(default)]
    pub environment: String,
}

// ---------------------------------------------------------------------------
// Validated, strongly-typed rule set
// ---------------------------------------------------------------------------

/// A validated rules document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RulesConfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub config: GlobalConfig,
    #[serde(rename = "clusterEnvironments")]
    pub cluster_environments: BTreeMap<String, String>,
    pub rules: Vec<Rule>,
}

/// A named, categorized check with one condition and a remediation hint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Free-form grouping tag, usually the resource kind (`node`, `pod`, ...).
    pub category: String,
    pub severity: Severity,
    pub condition: RuleCondition,
    pub remediation: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Metric, operator and threshold(s) a rule tests against.
///
/// Build one with [`RuleCondition::new`]; the value kind is inferred from the
/// threshold shape there and cannot drift afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleCondition {
    pub metric: String,
    pub operator: Operator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<Threshold>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub thresholds: BTreeMap<String, Threshold>,
    /// Accepted for time-windowed conditions; not evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip)]
    kind: ValueKind,
}

impl RuleCondition {
    /// Create a condition, inferring its value kind.
    ///
    /// Fails when no threshold is given, when the thresholds disagree on
    /// their kind, when the operator is not legal for that kind, or when a
    /// `matches` pattern does not compile.
    pub fn new(
        metric: impl Into<String>,
        operator: Operator,
        threshold: Option<Threshold>,
        thresholds: BTreeMap<String, Threshold>,
    ) -> Result<Self, String> {
        let mut kinds = threshold
            .iter()
            .chain(thresholds.values())
            .map(|t| t.kind_for(operator));

        let kind = kinds
            .next()
            .ok_or_else(|| "missing threshold (set 'threshold' or 'thresholds')".to_string())?;
        if let Some(other) = kinds.find(|k| *k != kind) {
            return Err(format!(
                "thresholds mix {} and {} values",
                kind, other
            ));
        }

        if !kind.supports(operator) {
            return Err(format!(
                "operator '{}' is not supported for {} thresholds (expected one of: {})",
                operator,
                kind,
                kind.operators()
                    .iter()
                    .map(|op| op.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        if operator == Operator::Matches {
            for t in threshold.iter().chain(thresholds.values()) {
                if let Threshold::Scalar(Scalar::Text(pattern)) = t {
                    regex::Regex::new(pattern)
                        .map_err(|e| format!("invalid pattern '{}': {}", pattern, e))?;
                }
            }
        }

        Ok(RuleCondition {
            metric: metric.into(),
            operator,
            threshold,
            thresholds,
            duration: None,
            kind,
        })
    }

    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    /// The value kind inferred from the threshold shape at construction.
    pub fn value_kind(&self) -> ValueKind {
        self.kind
    }

    /// Pick the threshold for an environment: the exact environment entry,
    /// then the `default` entry, then the single `threshold` field.
    pub fn resolve_threshold(&self, environment: &str) -> Option<&Threshold> {
        self.thresholds
            .get(environment)
            .or_else(|| self.thresholds.get(DEFAULT_ENVIRONMENT_KEY))
            .or(self.threshold.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Critical, Severity::Warning, Severity::Info];

    /// Health-score deduction for one failing item of this severity.
    pub fn penalty(self) -> u32 {
        match self {
            Severity::Critical => 20,
            Severity::Warning => 10,
            Severity::Info => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            _ => Err(format!(
                "unknown severity '{}' (expected critical, warning or info)",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "matches")]
    Matches,
    #[serde(rename = "has_non_empty")]
    HasNonEmpty,
}

impl Operator {
    pub const ALL: [Operator; 9] = [
        Operator::Gt,
        Operator::Ge,
        Operator::Lt,
        Operator::Le,
        Operator::Eq,
        Operator::Ne,
        Operator::Contains,
        Operator::Matches,
        Operator::HasNonEmpty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Contains => "contains",
            Operator::Matches => "matches",
            Operator::HasNonEmpty => "has_non_empty",
        }
    }

    /// `> >= < <=`
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s.trim())
            .ok_or_else(|| format!("unsupported operator '{}'", s))
    }
}

/// The closed set of value kinds, one validator each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    Numeric,
    Text,
    Flag,
    LabelSet,
}

impl ValueKind {
    pub fn operators(self) -> &'static [Operator] {
        match self {
            ValueKind::Numeric => &[
                Operator::Gt,
                Operator::Ge,
                Operator::Lt,
                Operator::Le,
                Operator::Eq,
                Operator::Ne,
            ],
            ValueKind::Text => &[
                Operator::Eq,
                Operator::Ne,
                Operator::Contains,
                Operator::Matches,
            ],
            ValueKind::Flag => &[Operator::Eq, Operator::Ne],
            ValueKind::LabelSet => &[Operator::Eq, Operator::Contains, Operator::HasNonEmpty],
        }
    }

    pub fn supports(self, operator: Operator) -> bool {
        self.operators().contains(&operator)
    }

    /// Label-set conditions state a requirement and fire when it is not met.
    /// Every other kind states the alerting condition itself.
    pub fn is_requirement(self) -> bool {
        self == ValueKind::LabelSet
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Numeric => write!(f, "numeric"),
            ValueKind::Text => write!(f, "text"),
            ValueKind::Flag => write!(f, "flag"),
            ValueKind::LabelSet => write!(f, "label-set"),
        }
    }
}

/// A threshold, parsed once at load time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Threshold {
    Scalar(Scalar),
    LabelSet(BTreeMap<String, String>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl Threshold {
    pub fn number(value: f64) -> Self {
        Threshold::Scalar(Scalar::Number(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Threshold::Scalar(Scalar::Text(value.into()))
    }

    pub fn flag(value: bool) -> Self {
        Threshold::Scalar(Scalar::Flag(value))
    }

    pub fn labels<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Threshold::LabelSet(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Convert a YAML node into a threshold. Label values of any scalar type
    /// are coerced to their display strings; `null` label values become "".
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Self, String> {
        use serde_yaml::Value;
        match value {
            Value::Bool(b) => Ok(Threshold::flag(*b)),
            Value::Number(n) => n
                .as_f64()
                .map(Threshold::number)
                .ok_or_else(|| format!("threshold {} is not representable as a number", n)),
            Value::String(s) => Ok(Threshold::text(s.clone())),
            Value::Mapping(map) => {
                let mut labels = BTreeMap::new();
                for (k, v) in map {
                    labels.insert(yaml_scalar_display(k)?, yaml_scalar_display(v)?);
                }
                Ok(Threshold::LabelSet(labels))
            }
            Value::Null => Err("threshold must not be null".into()),
            Value::Sequence(_) => Err("list thresholds are not supported".into()),
            Value::Tagged(tagged) => Threshold::from_yaml(&tagged.value),
        }
    }

    /// Value kind this threshold selects for the given operator.
    pub fn kind_for(&self, operator: Operator) -> ValueKind {
        match self {
            Threshold::LabelSet(_) => ValueKind::LabelSet,
            Threshold::Scalar(Scalar::Flag(_)) => ValueKind::Flag,
            Threshold::Scalar(Scalar::Number(_)) => ValueKind::Numeric,
            Threshold::Scalar(Scalar::Text(s)) => {
                let equality = matches!(operator, Operator::Eq | Operator::Ne);
                if equality && is_flag_word(s) {
                    ValueKind::Flag
                } else if ValueKind::Numeric.supports(operator) && s.trim().parse::<f64>().is_ok() {
                    ValueKind::Numeric
                } else {
                    ValueKind::Text
                }
            }
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Scalar(s) => write!(f, "{s}"),
            Threshold::LabelSet(labels) => f.write_str(&format_labels(labels)),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Flag(b) => write!(f, "{b}"),
        }
    }
}

/// `true/false/yes/no` in any case. `1`/`0` are left to the numeric kind.
fn is_flag_word(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "true" | "false" | "yes" | "no"
    )
}

/// `{app=web, owner=team-a}`
pub fn format_labels(labels: &BTreeMap<String, String>) -> String {
    let parts: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{{{}}}", parts.join(", "))
}

fn yaml_scalar_display(value: &serde_yaml::Value) -> Result<String, String> {
    use serde_yaml::Value;
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Tagged(tagged) => yaml_scalar_display(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => {
            Err("label thresholds must map keys to scalar values".into())
        }
    }
}

/// Rule selection: AND across dimensions, OR within a dimension.
/// An empty filter selects every rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFilter {
    pub categories: Vec<String>,
    pub severities: Vec<Severity>,
    pub enabled: Option<bool>,
}

impl RuleFilter {
    pub fn category(category: impl Into<String>) -> Self {
        RuleFilter {
            categories: vec![category.into()],
            ..Default::default()
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severities.push(severity);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn matches(&self, rule: &Rule) -> bool {
        if !self.categories.is_empty() && !self.categories.iter().any(|c| *c == rule.category) {
            return false;
        }
        if !self.severities.is_empty() && !self.severities.contains(&rule.severity) {
            return false;
        }
        match self.enabled {
            Some(enabled) => rule.enabled == enabled,
            None => true,
        }
    }
}
