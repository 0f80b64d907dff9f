use super::outcome::{DeploymentDetails, ResourceDetails};
use super::{Inspect, Metric};
use crate::model::{DeploymentSnapshot, ResourceKind};
use chrono::{DateTime, Utc};

/// Pull policy shared by every container, `Mixed` when they differ.
/// `None` when there are no containers.
pub fn uniform_pull_policy(deployment: &DeploymentSnapshot) -> Option<String> {
    let mut policies = deployment.containers.iter().map(|c| c.image_pull_policy.as_str());
    let first = policies.next()?;
    if policies.all(|p| p == first) {
        Some(first.to_string())
    } else {
        Some("Mixed".to_string())
    }
}

fn all_containers_limited(deployment: &DeploymentSnapshot) -> bool {
    deployment
        .containers
        .iter()
        .all(|c| !c.limits.is_empty() && !c.requests.is_empty())
}

impl Inspect for DeploymentSnapshot {
    const KIND: ResourceKind = ResourceKind::Deployment;

    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        Some(self.namespace.as_str()).filter(|ns| !ns.is_empty())
    }

    fn metrics(&self, _now: DateTime<Utc>) -> Vec<Metric> {
        let mut metrics = vec![
            Metric::new("replicas", self.replicas),
            Metric::new("available_replicas", self.available_replicas),
            Metric::new("has_resource_limits", all_containers_limited(self)),
        ];
        if let Some(policy) = uniform_pull_policy(self) {
            metrics.push(Metric::new("image_pull_policy", policy));
        }
        metrics.push(Metric::new("has_labels", self.labels.clone()));
        metrics
    }

    fn details(&self) -> ResourceDetails {
        ResourceDetails::Deployment(DeploymentDetails {
            replicas: self.replicas,
            available_replicas: self.available_replicas,
            strategy: self.strategy.clone(),
            images: self.containers.iter().map(|c| c.image.clone()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::Analyzer;
    use crate::evaluate::Engine;
    use crate::model::{ContainerSnapshot, ResourceQuantities};
    use std::collections::BTreeMap;

    fn limited(name: &str, policy: &str) -> ContainerSnapshot {
        let q = ResourceQuantities {
            cpu: Some("250m".into()),
            memory: Some("128Mi".into()),
        };
        ContainerSnapshot {
            name: name.into(),
            image: format!("registry.local/{name}:1.0"),
            image_pull_policy: policy.into(),
            limits: q.clone(),
            requests: q,
            ..Default::default()
        }
    }

    fn deployment() -> DeploymentSnapshot {
        DeploymentSnapshot {
            name: "checkout".into(),
            namespace: "shop".into(),
            labels: BTreeMap::from([("owner".to_string(), "payments".to_string())]),
            replicas: 3,
            available_replicas: 3,
            strategy: "RollingUpdate".into(),
            containers: vec![limited("api", "IfNotPresent")],
            ..Default::default()
        }
    }

    #[test]
    fn test_uniform_pull_policy() {
        let mut d = deployment();
        assert_eq!(uniform_pull_policy(&d).as_deref(), Some("IfNotPresent"));
        d.containers.push(limited("sidecar", "Always"));
        assert_eq!(uniform_pull_policy(&d).as_deref(), Some("Mixed"));
        d.containers.clear();
        assert_eq!(uniform_pull_policy(&d), None);
    }

    #[test]
    fn test_deployment_without_containers_skips_pull_policy() {
        let engine = Engine::builtin().unwrap();
        let mut d = deployment();
        d.containers.clear();
        let result = Analyzer::new(&engine, "prod").analyze(&d).unwrap();
        assert!(!result.items.iter().any(|i| i.metric == "image_pull_policy"));
        assert!(!result.failed_items().any(|i| i.rule_id == "deployment-image-pull-policy"));
        assert_eq!(result.health_score, 100, "{:?}", result.items);
    }

    #[test]
    fn test_well_configured_deployment() {
        let engine = Engine::builtin().unwrap();
        let result = Analyzer::new(&engine, "prod").analyze(&deployment()).unwrap();
        assert_eq!(result.health_score, 100, "{:?}", result.items);
    }

    #[test]
    fn test_missing_owner_label_fails() {
        let engine = Engine::builtin().unwrap();
        let mut d = deployment();
        d.labels.insert("owner".into(), "  ".into());
        let result = Analyzer::new(&engine, "prod").analyze(&d).unwrap();
        let owner = result
            .items
            .iter()
            .find(|i| i.rule_id == "deployment-owner-label")
            .unwrap();
        assert!(!owner.passed);
        assert!(owner.message.contains("should have non-empty label 'owner'"));
        assert_eq!(result.health_score, 90);
    }

    #[test]
    fn test_single_replica_is_fine_in_dev_only() {
        let engine = Engine::builtin().unwrap();
        let mut d = deployment();
        d.replicas = 1;
        let prod = Analyzer::new(&engine, "prod").analyze(&d).unwrap();
        assert!(prod.failed_items().any(|i| i.rule_id == "deployment-min-replicas"));
        let dev = Analyzer::new(&engine, "dev").analyze(&d).unwrap();
        assert!(!dev.failed_items().any(|i| i.rule_id == "deployment-min-replicas"));
    }

    #[test]
    fn test_unlimited_containers_and_mixed_policy() {
        let engine = Engine::builtin().unwrap();
        let mut d = deployment();
        let mut sidecar = limited("sidecar", "Always");
        sidecar.requests = ResourceQuantities::default();
        d.containers.push(sidecar);
        let result = Analyzer::new(&engine, "prod").analyze(&d).unwrap();
        let failed: Vec<_> = result.failed_items().map(|i| i.rule_id.as_str()).collect();
        assert_eq!(
            failed,
            ["deployment-resource-limits", "deployment-image-pull-policy"]
        );
    }
}
