use super::outcome::{ResourceDetails, ServiceDetails};
use super::{Inspect, Metric};
use crate::model::{PodPhase, ResourceKind, ServiceSnapshot};
use chrono::{DateTime, Utc};

const SENSITIVE_MARKERS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "token",
    "auth",
    "authorization",
    "secret",
    "key",
    "credential",
    "cert",
    "certificate",
    "private",
    "api-key",
    "apikey",
    "access-key",
];

/// Exposure risk of a service type.
pub fn type_risk(service_type: &str) -> &'static str {
    match service_type {
        "LoadBalancer" => "high_risk",
        "NodePort" | "ExternalName" => "medium_risk",
        _ => "low_risk",
    }
}

/// Lowest declared port, 0 when the service declares none.
pub fn min_port(service: &ServiceSnapshot) -> i32 {
    service.ports.iter().map(|p| p.port).min().unwrap_or(0)
}

/// True when any annotation key or value mentions a credential-like word.
pub fn has_sensitive_annotations(service: &ServiceSnapshot) -> bool {
    service.annotations.iter().any(|(k, v)| {
        let k = k.to_lowercase();
        let v = v.to_lowercase();
        SENSITIVE_MARKERS
            .iter()
            .any(|m| k.contains(m) || v.contains(m))
    })
}

fn has_matching_pods(service: &ServiceSnapshot) -> bool {
    service
        .matching_pods
        .iter()
        .any(|p| p.ready && p.phase == PodPhase::Running)
}

impl Inspect for ServiceSnapshot {
    const KIND: ResourceKind = ResourceKind::Service;

    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        Some(self.namespace.as_str()).filter(|ns| !ns.is_empty())
    }

    fn metrics(&self, _now: DateTime<Utc>) -> Vec<Metric> {
        vec![
            Metric::new("is_loadbalancer_type", self.service_type == "LoadBalancer"),
            Metric::new("is_nodeport_type", self.service_type == "NodePort"),
            Metric::new("service_type_risk", type_risk(&self.service_type)),
            Metric::new("min_port", min_port(self)),
            Metric::new("has_sensitive_annotations", has_sensitive_annotations(self)),
            Metric::new("has_ready_endpoints", self.ready_endpoints > 0),
            Metric::new("has_matching_pods", has_matching_pods(self)),
            Metric::new("has_selector", !self.selector.is_empty()),
            Metric::new(
                "has_named_ports",
                self.ports.iter().all(|p| !p.name.trim().is_empty()),
            ),
            Metric::new("has_labels", self.labels.clone()),
        ]
    }

    fn details(&self) -> ResourceDetails {
        ResourceDetails::Service(ServiceDetails {
            service_type: self.service_type.clone(),
            ports: self
                .ports
                .iter()
                .map(|p| match (p.protocol.as_str(), p.node_port) {
                    ("", None) => p.port.to_string(),
                    ("", Some(np)) => format!("{}:{}", p.port, np),
                    (proto, None) => format!("{}/{}", p.port, proto),
                    (proto, Some(np)) => format!("{}:{}/{}", p.port, np, proto),
                })
                .collect(),
            ready_endpoints: self.ready_endpoints,
            matching_pods: self.matching_pods.len(),
        })
    }
}
