pub mod deployment;
pub mod node;
pub mod outcome;
pub mod pod;
pub mod service;

pub use outcome::{AnalysisItem, AnalysisResult, ResourceDetails, ResourceIdentity};

use crate::error::InspectError;
use crate::evaluate::{validator_for_value, Engine, RuleResult};
use crate::model::{MetricValue, ResourceKind};
use crate::rules::schema::{Rule, RuleFilter};
use chrono::{DateTime, Utc};

/// A named value derived from a resource snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: &'static str,
    pub value: MetricValue,
    pub subject: Option<String>,
}

impl Metric {
    pub fn new(name: &'static str, value: impl Into<MetricValue>) -> Self {
        Metric {
            name,
            value: value.into(),
            subject: None,
        }
    }

    pub fn about(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// A resource snapshot the analyzer can derive metrics from.
pub trait Inspect {
    const KIND: ResourceKind;

    fn name(&self) -> &str;

    fn namespace(&self) -> Option<&str> {
        None
    }

    /// Every metric this resource exposes, as of `now`.
    fn metrics(&self, now: DateTime<Utc>) -> Vec<Metric>;

    fn details(&self) -> ResourceDetails;
}

/// Applies the enabled rules of a resource's category to its metrics.
#[derive(Debug, Clone)]
pub struct Analyzer<'a> {
    engine: &'a Engine,
    environment: String,
}

impl<'a> Analyzer<'a> {
    pub fn new(engine: &'a Engine, environment: impl Into<String>) -> Self {
        Analyzer {
            engine,
            environment: environment.into(),
        }
    }

    /// Analyzer using the environment the rule set maps `cluster_name` to.
    pub fn for_cluster(engine: &'a Engine, cluster_name: &str) -> Self {
        Analyzer::new(engine, engine.environment_for(cluster_name))
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Analyze one resource.
    ///
    /// Rules that fail to evaluate are logged and left out. A snapshot
    /// without a name is rejected.
    pub fn analyze<R: Inspect>(&self, resource: &R) -> Result<AnalysisResult, InspectError> {
        if resource.name().trim().is_empty() {
            tracing::warn!(kind = %R::KIND, "rejecting snapshot without a name");
            return Err(InspectError::InvalidSnapshot(format!(
                "{} snapshot has no name",
                R::KIND
            )));
        }

        let now = Utc::now();
        let filter = RuleFilter::category(R::KIND.category()).with_enabled(true);
        let rules = self.engine.rules(&filter);

        let mut items = Vec::new();
        for metric in resource.metrics(now) {
            for rule in rules.iter().filter(|r| r.condition.metric == metric.name) {
                match self
                    .engine
                    .evaluate_rule(rule, &metric.value, &self.environment)
                {
                    Ok(result) => items.push(to_item(rule, &metric, result)),
                    Err(e) => tracing::warn!(
                        resource = resource.name(),
                        rule = %rule.id,
                        metric = metric.name,
                        error = %e,
                        "skipping rule"
                    ),
                }
            }
        }

        let health_score = health_score(&items);
        tracing::debug!(
            kind = %R::KIND,
            resource = resource.name(),
            items = items.len(),
            health_score,
            "analyzed resource"
        );

        Ok(AnalysisResult {
            resource: ResourceIdentity {
                kind: R::KIND,
                name: resource.name().to_string(),
                namespace: resource.namespace().map(str::to_string),
            },
            items,
            health_score,
            analyzed_at: now,
            details: resource.details(),
        })
    }
}

fn to_item(rule: &Rule, metric: &Metric, result: RuleResult) -> AnalysisItem {
    let condition = &rule.condition;
    let validator =
        validator_for_value(condition.value_kind(), condition.operator, &result.actual_value);
    AnalysisItem {
        rule_id: result.rule_id,
        name: result.rule_name,
        category: rule.category.clone(),
        severity: result.severity,
        metric: metric.name.to_string(),
        subject: metric.subject.clone(),
        value: validator.format_value(&result.actual_value),
        threshold: result.expected_value.to_string(),
        passed: result.passed,
        message: result.message,
        description: rule.description.clone(),
        remediation: result.remediation,
    }
}

/// 100 minus a severity penalty per failing item, floored at 0.
pub fn health_score(items: &[AnalysisItem]) -> u8 {
    let deduction: u32 = items
        .iter()
        .filter(|i| !i.passed)
        .map(|i| i.severity.penalty())
        .sum();
    100u32.saturating_sub(deduction) as u8
}
