use kinspect_core::error::InspectError;
use std::path::PathBuf;

use crate::output;
use crate::OutputFormat;

pub fn run(
    snapshot_file: PathBuf,
    rules: Option<PathBuf>,
    cluster: Option<String>,
    env: Option<String>,
    output_format: OutputFormat,
    only_issues: bool,
) -> Result<(), InspectError> {
    let engine = super::load_engine(rules)?;

    let json = std::fs::read_to_string(&snapshot_file)?;
    let snapshot = kinspect_core::parse_snapshot(&json)?;

    // Explicit flag, then the name recorded in the snapshot.
    let cluster = cluster
        .or_else(|| snapshot.cluster_name.clone())
        .unwrap_or_else(|| "default".to_string());

    let mut report =
        kinspect_core::inspect_cluster(&snapshot, &engine, &cluster, env.as_deref())?;
    if only_issues {
        report = report.only_issues();
    }

    match output_format {
        OutputFormat::Json => output::json::print(&report)?,
        OutputFormat::Table => output::table::print(&report),
    }
    Ok(())
}
