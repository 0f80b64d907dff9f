use crate::analyze::AnalysisResult;
use crate::model::ResourceKind;
use crate::rules::schema::Severity;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One failing check on one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub resource_kind: ResourceKind,
    pub resource_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub rule_id: String,
    pub severity: Severity,
    pub metric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub value: String,
    pub threshold: String,
    pub message: String,
    pub remediation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total_resources: usize,
    pub resources_with_issues: usize,
    pub total_findings: usize,
    /// Finding counts keyed by severity; every severity is present.
    pub findings_by_severity: BTreeMap<Severity, usize>,
    pub average_health_score: f64,
}

/// Everything one inspection run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub cluster: String,
    pub environment: String,
    pub generated_at: DateTime<Utc>,
    pub summary: Summary,
    pub findings: Vec<Finding>,
    pub results: Vec<AnalysisResult>,
}

impl Report {
    pub fn build(
        cluster: impl Into<String>,
        environment: impl Into<String>,
        results: Vec<AnalysisResult>,
    ) -> Self {
        let mut findings = Vec::new();
        for result in &results {
            for item in result.failed_items() {
                findings.push(Finding {
                    resource_kind: result.resource.kind,
                    resource_name: result.resource.name.clone(),
                    namespace: result.resource.namespace.clone(),
                    rule_id: item.rule_id.clone(),
                    severity: item.severity,
                    metric: item.metric.clone(),
                    subject: item.subject.clone(),
                    value: item.value.clone(),
                    threshold: item.threshold.clone(),
                    message: item.message.clone(),
                    remediation: item.remediation.clone(),
                });
            }
        }
        // Most severe first; stable within a severity.
        findings.sort_by_key(|f| f.severity);

        let mut by_severity: BTreeMap<Severity, usize> =
            Severity::ALL.iter().map(|s| (*s, 0)).collect();
        for f in &findings {
            *by_severity.entry(f.severity).or_default() += 1;
        }

        let average_health_score = if results.is_empty() {
            100.0
        } else {
            let total: f64 = results.iter().map(|r| r.health_score as f64).sum();
            total / results.len() as f64
        };

        let summary = Summary {
            total_resources: results.len(),
            resources_with_issues: results.iter().filter(|r| r.has_issues()).count(),
            total_findings: findings.len(),
            findings_by_severity: by_severity,
            average_health_score,
        };

        Report {
            cluster: cluster.into(),
            environment: environment.into(),
            generated_at: Utc::now(),
            summary,
            findings,
            results,
        }
    }

    /// Same report without the resources that have no failing items.
    pub fn only_issues(mut self) -> Self {
        self.results.retain(|r| r.has_issues());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::outcome::{NodeDetails, ResourceDetails, ResourceIdentity};
    use crate::analyze::AnalysisItem;

    fn result(name: &str, failing: &[Severity]) -> AnalysisResult {
        let items: Vec<AnalysisItem> = failing
            .iter()
            .map(|s| AnalysisItem {
                rule_id: format!("{name}-{s}"),
                name: name.into(),
                category: "node".into(),
                severity: *s,
                metric: "m".into(),
                subject: None,
                value: "1".into(),
                threshold: "0".into(),
                passed: false,
                message: String::new(),
                description: String::new(),
                remediation: String::new(),
            })
            .collect();
        AnalysisResult {
            resource: ResourceIdentity {
                kind: ResourceKind::Node,
                name: name.into(),
                namespace: None,
            },
            health_score: crate::analyze::health_score(&items),
            items,
            analyzed_at: Utc::now(),
            details: ResourceDetails::Node(NodeDetails {
                roles: vec![],
                ready: true,
                schedulable: true,
                kubelet_version: String::new(),
                os_image: String::new(),
                cpu_utilization: 0.0,
                memory_utilization: 0.0,
                running_pods: 0,
            }),
        }
    }

    #[test]
    fn test_summary_counts() {
        let report = Report::build(
            "prod-eu",
            "prod",
            vec![
                result("a", &[Severity::Info, Severity::Critical]),
                result("b", &[]),
            ],
        );
        let s = &report.summary;
        assert_eq!(s.total_resources, 2);
        assert_eq!(s.resources_with_issues, 1);
        assert_eq!(s.total_findings, 2);
        assert_eq!(s.findings_by_severity[&Severity::Critical], 1);
        assert_eq!(s.findings_by_severity[&Severity::Warning], 0);
        assert_eq!(s.average_health_score, 87.5);
        assert_eq!(report.findings[0].severity, Severity::Critical);
    }

    #[test]
    fn test_only_issues_keeps_summary() {
        let report = Report::build("c", "prod", vec![result("a", &[Severity::Warning]), result("b", &[])])
            .only_issues();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.summary.total_resources, 2);
    }

    #[test]
    fn test_empty_report() {
        let report = Report::build("c", "prod", vec![]);
        assert_eq!(report.summary.average_health_score, 100.0);
        assert!(report.findings.is_empty());
    }
}
