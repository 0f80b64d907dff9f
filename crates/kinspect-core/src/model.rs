use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::rules::schema::format_labels;

/// An observed metric value handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Flag(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Labels(BTreeMap<String, String>),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Flag(b) => write!(f, "{b}"),
            MetricValue::Int(i) => write!(f, "{i}"),
            MetricValue::UInt(u) => write!(f, "{u}"),
            MetricValue::Float(v) => write!(f, "{v}"),
            MetricValue::Text(s) => f.write_str(s),
            MetricValue::Labels(labels) => f.write_str(&format_labels(labels)),
        }
    }
}

macro_rules! metric_from {
    ($variant:ident as $target:ty: $($t:ty),+) => {
        $(
            impl From<$t> for MetricValue {
                fn from(v: $t) -> Self {
                    MetricValue::$variant(v as $target)
                }
            }
        )+
    };
}

metric_from!(Int as i64: i8, i16, i32, i64, isize);
metric_from!(UInt as u64: u8, u16, u32, u64, usize);
metric_from!(Float as f64: f32, f64);

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        MetricValue::Flag(v)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl From<BTreeMap<String, String>> for MetricValue {
    fn from(v: BTreeMap<String, String>) -> Self {
        MetricValue::Labels(v)
    }
}

impl From<HashMap<String, String>> for MetricValue {
    fn from(v: HashMap<String, String>) -> Self {
        MetricValue::Labels(v.into_iter().collect())
    }
}

/// Resource kinds the analyzers understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Node,
    Pod,
    Deployment,
    Service,
}

impl ResourceKind {
    /// Rule category analyzed for this kind.
    pub fn category(self) -> &'static str {
        match self {
            ResourceKind::Node => "node",
            ResourceKind::Pod => "pod",
            ResourceKind::Deployment => "deployment",
            ResourceKind::Service => "service",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Node => write!(f, "Node"),
            ResourceKind::Pod => write!(f, "Pod"),
            ResourceKind::Deployment => write!(f, "Deployment"),
            ResourceKind::Service => write!(f, "Service"),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots, as produced by collectors
// ---------------------------------------------------------------------------

/// Usage of one resource on a node. Percentages are 0-100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    #[serde(default)]
    pub capacity: String,
    #[serde(default)]
    pub allocatable: String,
    #[serde(default)]
    pub allocated: String,
    #[serde(default)]
    pub used: String,
    /// used / allocated
    #[serde(default)]
    pub utilization: f64,
    /// allocated / allocatable
    #[serde(default)]
    pub allocation_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureStatus {
    #[serde(default)]
    pub cpu: bool,
    #[serde(default)]
    pub memory: bool,
    #[serde(default)]
    pub disk: bool,
    #[serde(default)]
    pub pid: bool,
    #[serde(default)]
    pub network: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSystemInfo {
    #[serde(default)]
    pub kernel_version: String,
    #[serde(default)]
    pub os_image: String,
    #[serde(default)]
    pub container_runtime_version: String,
    #[serde(default)]
    pub kubelet_version: String,
    #[serde(default)]
    pub architecture: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub schedulable: bool,
    #[serde(default)]
    pub pressure: PressureStatus,
    #[serde(default)]
    pub cpu: ResourceUsage,
    #[serde(default)]
    pub memory: ResourceUsage,
    #[serde(default)]
    pub ephemeral_storage: ResourceUsage,
    #[serde(default)]
    pub pods: ResourceUsage,
    #[serde(default)]
    pub running_pods: u32,
    #[serde(default)]
    pub total_pods: u32,
    #[serde(default)]
    pub system_info: NodeSystemInfo,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// CPU/memory quantities as strings (`500m`, `512Mi`), absent when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuantities {
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
}

impl ResourceQuantities {
    pub fn is_empty(&self) -> bool {
        is_unset(&self.cpu) && is_unset(&self.memory)
    }
}

fn is_unset(q: &Option<String>) -> bool {
    match q.as_deref().map(str::trim) {
        None | Some("") | Some("0") => true,
        Some(_) => false,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub image_pull_policy: String,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub restart_count: u32,
    /// Percent of the CPU limit in use; `None` when metrics are unavailable.
    #[serde(default)]
    pub cpu_utilization: Option<f64>,
    #[serde(default)]
    pub memory_utilization: Option<f64>,
    #[serde(default)]
    pub limits: ResourceQuantities,
    #[serde(default)]
    pub requests: ResourceQuantities,
    #[serde(default)]
    pub has_liveness_probe: bool,
    #[serde(default)]
    pub has_readiness_probe: bool,
    #[serde(default)]
    pub has_startup_probe: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodSnapshot {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub phase: PodPhase,
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub qos_class: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub containers: Vec<ContainerSnapshot>,
}

impl PodSnapshot {
    pub fn total_restarts(&self) -> u64 {
        self.containers.iter().map(|c| c.restart_count as u64).sum()
    }

    pub fn has_liveness_probe(&self) -> bool {
        self.containers.iter().any(|c| c.has_liveness_probe)
    }

    pub fn has_readiness_probe(&self) -> bool {
        self.containers.iter().any(|c| c.has_readiness_probe)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSnapshot {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub available_replicas: i32,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub containers: Vec<ContainerSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub protocol: String,
    pub port: i32,
    #[serde(default)]
    pub target_port: String,
    #[serde(default)]
    pub node_port: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePod {
    pub name: String,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub phase: PodPhase,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    /// `ClusterIP`, `NodePort`, `LoadBalancer` or `ExternalName`.
    #[serde(default, rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
    #[serde(default)]
    pub ready_endpoints: u32,
    #[serde(default)]
    pub matching_pods: Vec<ServicePod>,
}

/// Everything a collector captured from one cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeSnapshot>,
    #[serde(default)]
    pub pods: Vec<PodSnapshot>,
    #[serde(default)]
    pub deployments: Vec<DeploymentSnapshot>,
    #[serde(default)]
    pub services: Vec<ServiceSnapshot>,
}
