pub mod analyze;
pub mod error;
pub mod evaluate;
pub mod model;
pub mod report;
pub mod rules;

use analyze::{AnalysisResult, Analyzer, Inspect};
use error::InspectError;
use evaluate::Engine;
use model::ClusterSnapshot;
use report::Report;

/// Main API entry point: analyze every resource in a cluster snapshot.
///
/// The environment is `env_override` when given, otherwise whatever the rule
/// set maps `cluster` to. Resources whose snapshot is rejected are logged and
/// left out of the report.
pub fn inspect_cluster(
    snapshot: &ClusterSnapshot,
    engine: &Engine,
    cluster: &str,
    env_override: Option<&str>,
) -> Result<Report, InspectError> {
    let analyzer = match env_override {
        Some(env) => Analyzer::new(engine, env),
        None => Analyzer::for_cluster(engine, cluster),
    };
    tracing::info!(cluster, environment = analyzer.environment(), "inspecting cluster");

    let mut results = Vec::new();
    analyze_all(&analyzer, &snapshot.nodes, &mut results);
    analyze_all(&analyzer, &snapshot.pods, &mut results);
    analyze_all(&analyzer, &snapshot.deployments, &mut results);
    analyze_all(&analyzer, &snapshot.services, &mut results);

    Ok(Report::build(cluster, analyzer.environment(), results))
}

/// Read a cluster snapshot from JSON.
pub fn parse_snapshot(json: &str) -> Result<ClusterSnapshot, InspectError> {
    Ok(serde_json::from_str(json)?)
}

fn analyze_all<R: Inspect>(analyzer: &Analyzer<'_>, resources: &[R], out: &mut Vec<AnalysisResult>) {
    for resource in resources {
        match analyzer.analyze(resource) {
            Ok(result) => out.push(result),
            Err(e) => tracing::warn!(kind = %R::KIND, error = %e, "skipping resource"),
        }
    }
}
