use super::outcome::{NodeDetails, ResourceDetails};
use super::{Inspect, Metric};
use crate::model::{NodeSnapshot, ResourceKind};
use chrono::{DateTime, Utc};

impl Inspect for NodeSnapshot {
    const KIND: ResourceKind = ResourceKind::Node;

    fn name(&self) -> &str {
        &self.name
    }

    fn metrics(&self, _now: DateTime<Utc>) -> Vec<Metric> {
        let p = &self.pressure;
        vec![
            Metric::new("cpu_utilization", self.cpu.utilization),
            Metric::new("cpu_allocation_rate", self.cpu.allocation_rate),
            Metric::new("memory_utilization", self.memory.utilization),
            Metric::new("memory_allocation_rate", self.memory.allocation_rate),
            Metric::new(
                "ephemeral_storage_utilization",
                self.ephemeral_storage.utilization,
            ),
            Metric::new(
                "ephemeral_storage_allocation_rate",
                self.ephemeral_storage.allocation_rate,
            ),
            Metric::new("pods_utilization", self.pods.utilization),
            Metric::new("pods_allocation_rate", self.pods.allocation_rate),
            Metric::new("memory_pressure", p.memory),
            Metric::new("cpu_pressure", p.cpu),
            Metric::new("disk_pressure", p.disk),
            Metric::new("pid_pressure", p.pid),
            Metric::new("network_pressure", p.network),
            Metric::new("ready", self.ready),
        ]
    }

    fn details(&self) -> ResourceDetails {
        ResourceDetails::Node(NodeDetails {
            roles: self.roles.clone(),
            ready: self.ready,
            schedulable: self.schedulable,
            kubelet_version: self.system_info.kubelet_version.clone(),
            os_image: self.system_info.os_image.clone(),
            cpu_utilization: self.cpu.utilization,
            memory_utilization: self.memory.utilization,
            running_pods: self.running_pods,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::analyze::Analyzer;
    use crate::evaluate::Engine;
    use crate::model::{NodeSnapshot, ResourceUsage};

    fn healthy_node() -> NodeSnapshot {
        NodeSnapshot {
            name: "worker-1".into(),
            ready: true,
            schedulable: true,
            cpu: ResourceUsage {
                utilization: 40.0,
                allocation_rate: 50.0,
                ..Default::default()
            },
            memory: ResourceUsage {
                utilization: 55.0,
                allocation_rate: 60.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_healthy_node_scores_100() {
        let engine = Engine::builtin().unwrap();
        let result = Analyzer::new(&engine, "prod").analyze(&healthy_node()).unwrap();
        assert_eq!(result.health_score, 100);
        assert!(!result.items.is_empty());
        assert!(result.items.iter().all(|i| i.passed));
    }

    #[test]
    fn test_hot_node_fails_cpu_rules() {
        let engine = Engine::builtin().unwrap();
        let mut node = healthy_node();
        node.cpu.utilization = 95.0;
        let result = Analyzer::new(&engine, "prod").analyze(&node).unwrap();

        let failed: Vec<_> = result.failed_items().map(|i| i.rule_id.as_str()).collect();
        assert_eq!(
            failed,
            ["node-cpu-utilization-high", "node-cpu-utilization-elevated"]
        );
        // critical + warning
        assert_eq!(result.health_score, 70);
    }

    #[test]
    fn test_dev_thresholds_apply() {
        let engine = Engine::builtin().unwrap();
        let mut node = healthy_node();
        node.cpu.utilization = 92.0;
        let result = Analyzer::new(&engine, "dev").analyze(&node).unwrap();
        let high = result
            .items
            .iter()
            .find(|i| i.rule_id == "node-cpu-utilization-high")
            .unwrap();
        assert!(high.passed);
        assert_eq!(high.threshold, "95");
    }

    #[test]
    fn test_not_ready_node() {
        let engine = Engine::builtin().unwrap();
        let mut node = healthy_node();
        node.ready = false;
        node.pressure.memory = true;
        let result = Analyzer::new(&engine, "prod").analyze(&node).unwrap();
        let failed: Vec<_> = result.failed_items().map(|i| i.metric.as_str()).collect();
        assert_eq!(failed, ["memory_pressure", "ready"]);
        assert_eq!(result.health_score, 60);
    }

    #[test]
    fn test_unnamed_node_rejected() {
        let engine = Engine::builtin().unwrap();
        let node = NodeSnapshot::default();
        assert!(Analyzer::new(&engine, "prod").analyze(&node).is_err());
    }
}
