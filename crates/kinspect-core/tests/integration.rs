//! Integration tests for rule loading, evaluation and cluster inspection.
//!
//! Rule documents are written to temp files or built inline; snapshots are
//! plain JSON, so nothing here talks to a cluster.

use kinspect_core::analyze::Analyzer;
use kinspect_core::error::{EvalError, InspectError};
use kinspect_core::evaluate::Engine;
use kinspect_core::model::{DeploymentSnapshot, MetricValue, NodeSnapshot, ResourceUsage};
use kinspect_core::rules::schema::{Operator, RuleFilter, Severity, Threshold};
use kinspect_core::rules::{parse_rules, RuleLoader};
use kinspect_core::{inspect_cluster, parse_snapshot};
use std::collections::BTreeMap;

const RULES: &str = r#"
apiVersion: kinspect/v1
kind: RulesConfig
config:
  autoReload: true
  reloadInterval: 30s
  environment: staging
clusterEnvironments:
  lab: dev
rules:
  - id: node-cpu-critical
    name: Node CPU critical
    category: node
    severity: critical
    condition:
      metric: cpu_utilization
      operator: ">="
      threshold: 90
    remediation: Add capacity.
    enabled: true

  - id: node-memory-warning
    name: Node memory warning
    category: node
    severity: warning
    condition:
      metric: memory_utilization
      operator: ">="
      threshold: 80
    enabled: true

  - id: pod-restarts
    name: Pod restarts
    category: pod
    severity: warning
    condition:
      metric: pod_restart_count
      operator: ">"
      threshold: 20
      thresholds:
        dev: 5
        default: 9
    enabled: true

  - id: node-ready
    name: Node ready
    category: node
    severity: info
    condition:
      metric: ready
      operator: "=="
      threshold: false
    enabled: false

  - id: deployment-owner
    name: Deployment owner
    category: deployment
    severity: warning
    condition:
      metric: has_labels
      operator: has_non_empty
      threshold:
        owner: ""
    enabled: true
"#;

fn engine() -> Engine {
    Engine::new(RuleLoader::from_yaml("test", RULES)).unwrap()
}

fn node(cpu: f64, memory: f64) -> NodeSnapshot {
    NodeSnapshot {
        name: "node-a".into(),
        ready: true,
        cpu: ResourceUsage {
            utilization: cpu,
            ..Default::default()
        },
        memory: ResourceUsage {
            utilization: memory,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn rule<'a>(engine: &'a Engine, id: &str) -> &'a kinspect_core::rules::schema::Rule {
    engine
        .rules(&RuleFilter::default())
        .into_iter()
        .find(|r| r.id == id)
        .unwrap()
}

// ---------------------------------------------------------------------------
// Threshold precedence
// ---------------------------------------------------------------------------
#[test]
fn environment_threshold_precedence() {
    let engine = engine();
    let r = rule(&engine, "pod-restarts");
    let resolved = |env: &str| {
        engine
            .evaluate_rule(r, &MetricValue::from(0), env)
            .unwrap()
            .expected_value
    };
    assert_eq!(resolved("dev"), Threshold::number(5.0));
    assert_eq!(resolved("staging"), Threshold::number(9.0));

    let no_map = RULES.replace(
        "      thresholds:\n        dev: 5\n        default: 9\n",
        "",
    );
    let engine = Engine::new(RuleLoader::from_yaml("test", no_map)).unwrap();
    let r = rule(&engine, "pod-restarts");
    let result = engine.evaluate_rule(r, &MetricValue::from(0), "dev").unwrap();
    assert_eq!(result.expected_value, Threshold::number(20.0));
}

#[test]
fn numeric_boundary() {
    let engine = engine();
    let r = rule(&engine, "node-cpu-critical");
    let cfg = RULES.replace("threshold: 90", "threshold: 10");
    let engine10 = Engine::new(RuleLoader::from_yaml("test", cfg)).unwrap();
    let r10 = rule(&engine10, "node-cpu-critical");

    // ">= 10" holds for 10 and not for 9.99, so the alert fires only for 10.
    assert!(!engine10.evaluate_rule(r10, &MetricValue::from(10), "prod").unwrap().passed);
    assert!(engine10.evaluate_rule(r10, &MetricValue::from(9.99), "prod").unwrap().passed);
    assert!(engine.evaluate_rule(r, &MetricValue::from(89u16), "prod").unwrap().passed);
}

#[test]
fn has_non_empty_label_requirement() {
    let engine = engine();
    let r = rule(&engine, "deployment-owner");
    let check = |pairs: &[(&str, &str)]| {
        let labels: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        engine
            .evaluate_rule(r, &MetricValue::from(labels), "prod")
            .unwrap()
            .passed
    };
    assert!(!check(&[("owner", "")]));
    assert!(!check(&[("owner", "   ")]));
    assert!(check(&[("owner", " a ")]));
    assert!(!check(&[("team", "a")]));
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------
#[test]
fn rule_filters() {
    let engine = engine();
    let node_rules = engine.rules(&RuleFilter::category("node"));
    assert_eq!(node_rules.len(), 3);
    assert!(node_rules.iter().all(|r| r.category == "node"));

    let disabled = engine.rules(&RuleFilter::default().with_enabled(false));
    assert_eq!(disabled.len(), 1);
    assert_eq!(disabled[0].id, "node-ready");

    let filter = RuleFilter {
        categories: vec!["node".into(), "pod".into()],
        severities: vec![Severity::Warning, Severity::Critical],
        enabled: None,
    };
    let ids: Vec<_> = engine.rules(&filter).iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["node-cpu-critical", "node-memory-warning", "pod-restarts"]);

    assert_eq!(engine.rules(&RuleFilter::default()).len(), 5);
}

// ---------------------------------------------------------------------------
// Scoring and the alert/health contract
// ---------------------------------------------------------------------------
#[test]
fn health_score_steps() {
    let engine = engine();
    let analyzer = Analyzer::new(&engine, "prod");
    assert_eq!(analyzer.analyze(&node(10.0, 10.0)).unwrap().health_score, 100);
    assert_eq!(analyzer.analyze(&node(95.0, 10.0)).unwrap().health_score, 80);
    assert_eq!(analyzer.analyze(&node(95.0, 85.0)).unwrap().health_score, 70);
}

#[test]
fn score_never_negative() {
    let mut yaml = String::from("apiVersion: v1\nkind: RulesConfig\nrules:\n");
    for i in 0..10 {
        yaml.push_str(&format!(
            "  - id: cpu-{i}\n    name: cpu {i}\n    category: node\n    severity: critical\n    condition:\n      metric: cpu_utilization\n      operator: \">=\"\n      threshold: {}\n",
            50 + i
        ));
    }
    let engine = Engine::new(RuleLoader::from_yaml("ten", yaml)).unwrap();
    let result = Analyzer::new(&engine, "prod").analyze(&node(99.0, 0.0)).unwrap();
    assert_eq!(result.failed_items().count(), 10);
    assert_eq!(result.health_score, 0);
}

#[test]
fn fired_alert_is_unhealthy_item() {
    let engine = engine();
    let r = rule(&engine, "node-cpu-critical");
    let verdict = engine.evaluate_rule(r, &MetricValue::from(95), "prod").unwrap();
    assert!(!verdict.passed);

    let result = Analyzer::new(&engine, "prod").analyze(&node(95.0, 0.0)).unwrap();
    let item = result
        .items
        .iter()
        .find(|i| i.rule_id == "node-cpu-critical")
        .unwrap();
    assert!(!item.passed);
    assert_eq!(item.value, "95");
    assert_eq!(item.threshold, "90");
    assert_eq!(item.severity, Severity::Critical);
    assert_eq!(result.health_score, 80);
}

#[test]
fn disabled_rules_not_applied_by_analyzer() {
    let engine = engine();
    let mut n = node(0.0, 0.0);
    n.ready = false;
    let result = Analyzer::new(&engine, "prod").analyze(&n).unwrap();
    assert!(result.items.iter().all(|i| i.rule_id != "node-ready"));

    let err = engine
        .evaluate_rule(rule(&engine, "node-ready"), &MetricValue::from(false), "prod")
        .unwrap_err();
    assert!(matches!(err, EvalError::RuleDisabled { .. }));
}

#[test]
fn evaluation_errors_are_skipped() {
    let yaml = RULES.replace("metric: memory_utilization", "metric: ready");
    let engine = Engine::new(RuleLoader::from_yaml("test", yaml)).unwrap();
    // "ready" is a flag; the numeric rule on it cannot coerce and is skipped.
    let result = Analyzer::new(&engine, "prod").analyze(&node(95.0, 0.0)).unwrap();
    assert!(result.items.iter().all(|i| i.rule_id != "node-memory-warning"));
    assert!(result.items.iter().any(|i| i.rule_id == "node-cpu-critical"));
}

fn single_rule_engine(category: &str, metric: &str, operator: &str, threshold: &str) -> Engine {
    let yaml = format!(
        r#"
apiVersion: kinspect/v1
kind: RulesConfig
rules:
  - id: only
    name: Only rule
    category: {category}
    severity: critical
    condition:
      metric: {metric}
      operator: "{operator}"
      threshold: {threshold}
    enabled: true
"#
    );
    Engine::new(RuleLoader::from_yaml("test", yaml)).unwrap()
}

#[test]
fn flag_threshold_spellings_match_boolean_metric() {
    let mut n = node(0.0, 0.0);
    n.pressure.memory = true;
    for threshold in ["true", "\"yes\"", "\"1\"", "\"True\"", "1"] {
        let engine = single_rule_engine("node", "memory_pressure", "==", threshold);
        let result = Analyzer::new(&engine, "prod").analyze(&n).unwrap();
        let item = result.items.iter().find(|i| i.rule_id == "only");
        let item = item.unwrap_or_else(|| panic!("rule skipped for threshold {threshold}"));
        assert!(!item.passed, "threshold {threshold}");
        assert_eq!(item.value, "true");
        assert_eq!(result.health_score, 80, "threshold {threshold}");
    }

    n.pressure.memory = false;
    for threshold in ["true", "\"yes\"", "1"] {
        let engine = single_rule_engine("node", "memory_pressure", "==", threshold);
        let result = Analyzer::new(&engine, "prod").analyze(&n).unwrap();
        assert_eq!(result.health_score, 100, "threshold {threshold}");
    }
}

#[test]
fn numeric_string_threshold_with_equality() {
    let deployment = DeploymentSnapshot {
        name: "web".into(),
        namespace: "shop".into(),
        replicas: 1,
        ..Default::default()
    };
    let engine = single_rule_engine("deployment", "replicas", "==", "\"1.0\"");
    let verdict = engine
        .evaluate_rule(rule(&engine, "only"), &MetricValue::from(1), "prod")
        .unwrap();
    assert!(!verdict.passed);

    let result = Analyzer::new(&engine, "prod").analyze(&deployment).unwrap();
    assert!(result.failed_items().any(|i| i.rule_id == "only"));

    let engine = single_rule_engine("deployment", "replicas", "!=", "\"1.0\"");
    let verdict = engine
        .evaluate_rule(rule(&engine, "only"), &MetricValue::from(1), "prod")
        .unwrap();
    assert!(verdict.passed);
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------
#[test]
fn round_trip_preserves_fields() {
    let cfg = parse_rules(RULES, "test").unwrap();
    let mut loader = RuleLoader::from_yaml("test", RULES);
    loader.load().unwrap();
    let rules = loader.rules(&RuleFilter::default());
    assert_eq!(rules.len(), cfg.rules.len());

    let ids: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(
        ids,
        ["node-cpu-critical", "node-memory-warning", "pod-restarts", "node-ready", "deployment-owner"]
    );

    let restarts = rules[2];
    assert_eq!(restarts.condition.operator, Operator::Gt);
    assert_eq!(restarts.condition.threshold, Some(Threshold::number(20.0)));
    let keys: Vec<_> = restarts.condition.thresholds.keys().map(String::as_str).collect();
    assert_eq!(keys, ["default", "dev"]);

    let owner = rules[4];
    assert_eq!(owner.condition.operator, Operator::HasNonEmpty);
    assert_eq!(owner.condition.threshold, Some(Threshold::labels([("owner", "")])));

    let config = loader.config().unwrap();
    assert!(config.config.auto_reload);
    assert_eq!(config.config.reload_interval, "30s");
}

#[test]
fn engine_construction_fails_on_bad_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.yaml");
    std::fs::write(&path, RULES.replace("operator: \">=\"", "operator: \"gte\"")).unwrap();
    let err = Engine::from_path(&path).unwrap_err();
    assert!(matches!(err, InspectError::RulesInvalid(_)));
    assert!(err.to_string().contains("unsupported operator 'gte'"));

    let missing = dir.path().join("nope.yaml");
    assert!(matches!(
        Engine::from_path(&missing).unwrap_err(),
        InspectError::RulesNotFound { .. }
    ));
}

#[test]
fn reload_picks_up_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.yaml");
    std::fs::write(&path, RULES).unwrap();
    let mut engine = Engine::from_path(&path).unwrap();
    assert!(!engine.reload().unwrap());

    let changed = RULES.replace("threshold: 90", "threshold: 70");
    std::fs::write(&path, changed).unwrap();
    // Some filesystems keep whole-second mtimes; push it forward explicitly.
    let file = std::fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(5))
        .unwrap();
    drop(file);

    assert!(engine.reload().unwrap());
    let r = rule(&engine, "node-cpu-critical");
    assert_eq!(r.condition.threshold, Some(Threshold::number(70.0)));
}

// ---------------------------------------------------------------------------
// Whole-cluster inspection
// ---------------------------------------------------------------------------
#[test]
fn inspect_cluster_snapshot() {
    let snapshot = parse_snapshot(
        r#"{
            "nodes": [
                { "name": "node-a", "ready": true, "cpu": { "utilization": 97.5 } },
                { "name": "node-b", "ready": true },
                { "name": "" }
            ],
            "pods": [
                { "name": "api-1", "namespace": "shop", "phase": "Running",
                  "containers": [{ "name": "api", "restart_count": 7 }] }
            ],
            "deployments": [
                { "name": "api", "namespace": "shop", "labels": { "owner": "" } }
            ]
        }"#,
    )
    .unwrap();

    let engine = engine();
    let report = inspect_cluster(&snapshot, &engine, "lab", None).unwrap();
    assert_eq!(report.environment, "dev");
    assert_eq!(report.summary.total_resources, 4, "unnamed node skipped");
    // node-a cpu, api-1 restarts (7 > dev 5), api owner label
    assert_eq!(report.summary.total_findings, 3);
    assert_eq!(report.summary.resources_with_issues, 3);
    assert_eq!(report.findings[0].rule_id, "node-cpu-critical");

    let report = inspect_cluster(&snapshot, &engine, "lab", Some("prod")).unwrap();
    assert_eq!(report.environment, "prod");
    // 7 is not above the `default` threshold of 9
    assert_eq!(report.summary.total_findings, 2);

    let report = inspect_cluster(&snapshot, &engine, "elsewhere", None).unwrap();
    assert_eq!(report.environment, "staging");
}

#[test]
fn builtin_rules_inspect_cleanly() {
    let engine = Engine::builtin().unwrap();
    let snapshot = parse_snapshot(r#"{ "nodes": [{ "name": "n", "ready": true }] }"#).unwrap();
    let report = inspect_cluster(&snapshot, &engine, "minikube", None).unwrap();
    assert_eq!(report.environment, "dev");
    assert_eq!(report.summary.average_health_score, 100.0);
}

#[test]
fn malformed_snapshot_is_an_error() {
    assert!(matches!(
        parse_snapshot("{ nodes: ").unwrap_err(),
        InspectError::Json(_)
    ));
}
