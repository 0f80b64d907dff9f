use super::outcome::{PodDetails, ResourceDetails};
use super::{Inspect, Metric};
use crate::model::{PodPhase, PodSnapshot, ResourceKind};
use chrono::{DateTime, Utc};

/// Minutes spent outside the Running phase, counted from creation.
fn not_running_minutes(pod: &PodSnapshot, now: DateTime<Utc>) -> f64 {
    if pod.phase == PodPhase::Running {
        return 0.0;
    }
    match pod.created_at {
        Some(created) => ((now - created).num_seconds().max(0) as f64) / 60.0,
        None => 0.0,
    }
}

impl Inspect for PodSnapshot {
    const KIND: ResourceKind = ResourceKind::Pod;

    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace).filter(|ns| !ns.is_empty()).map(String::as_str)
    }

    fn metrics(&self, now: DateTime<Utc>) -> Vec<Metric> {
        let mut metrics = vec![Metric::new(
            "pod_not_running_duration",
            not_running_minutes(self, now),
        )];

        for c in &self.containers {
            // Utilization is only known when a metrics source reported it.
            if let Some(cpu) = c.cpu_utilization.filter(|v| *v > 0.0) {
                metrics.push(Metric::new("pod_cpu_utilization", cpu).about(&c.name));
            }
            if let Some(mem) = c.memory_utilization.filter(|v| *v > 0.0) {
                metrics.push(Metric::new("pod_memory_utilization", mem).about(&c.name));
            }
            metrics.push(
                Metric::new("pod_missing_resource_limits", c.limits.is_empty()).about(&c.name),
            );
        }

        metrics.push(Metric::new("pod_restart_count", self.total_restarts()));
        metrics.push(Metric::new(
            "pod_missing_probes",
            !self.has_liveness_probe() && !self.has_readiness_probe(),
        ));
        metrics.push(Metric::new("has_labels", self.labels.clone()));
        metrics
    }

    fn details(&self) -> ResourceDetails {
        ResourceDetails::Pod(PodDetails {
            phase: self.phase,
            node_name: self.node_name.clone(),
            qos_class: self.qos_class.clone(),
            containers: self.containers.len(),
            restarts: self.total_restarts(),
        })
    }
}
