use crate::model::{PodPhase, ResourceKind};
use crate::rules::schema::Severity;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One rule applied to one metric of one resource, in health terms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisItem {
    pub rule_id: String,
    pub name: String,
    pub category: String,
    pub severity: Severity,
    pub metric: String,
    /// Part of the resource the metric was read from, e.g. a container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub value: String,
    pub threshold: String,
    /// `true` when the resource is healthy with respect to this rule.
    pub passed: bool,
    pub message: String,
    pub description: String,
    pub remediation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceIdentity {
    pub kind: ResourceKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl std::fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Analysis of one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub resource: ResourceIdentity,
    pub items: Vec<AnalysisItem>,
    pub health_score: u8,
    pub analyzed_at: DateTime<Utc>,
    pub details: ResourceDetails,
}

impl AnalysisResult {
    pub fn failed_items(&self) -> impl Iterator<Item = &AnalysisItem> {
        self.items.iter().filter(|i| !i.passed)
    }

    pub fn has_issues(&self) -> bool {
        self.items.iter().any(|i| !i.passed)
    }
}

/// Descriptive fields copied from the snapshot for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourceDetails {
    Node(NodeDetails),
    Pod(PodDetails),
    Deployment(DeploymentDetails),
    Service(ServiceDetails),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDetails {
    pub roles: Vec<String>,
    pub ready: bool,
    pub schedulable: bool,
    pub kubelet_version: String,
    pub os_image: String,
    pub cpu_utilization: f64,
    pub memory_utilization: f64,
    pub running_pods: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodDetails {
    pub phase: PodPhase,
    pub node_name: String,
    pub qos_class: String,
    pub containers: usize,
    pub restarts: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentDetails {
    pub replicas: i32,
    pub available_replicas: i32,
    pub strategy: String,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDetails {
    pub service_type: String,
    pub ports: Vec<String>,
    pub ready_endpoints: u32,
    pub matching_pods: usize,
}
