use kinspect_core::error::InspectError;
use kinspect_core::rules::schema::{RuleFilter, Severity};
use std::path::{Path, PathBuf};

pub fn list(
    rules: Option<PathBuf>,
    categories: Vec<String>,
    severities: &[String],
    disabled: bool,
) -> Result<(), InspectError> {
    let engine = super::load_engine(rules)?;

    let severities = severities
        .iter()
        .map(|s| s.parse::<Severity>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(InspectError::RulesInvalid)?;
    let filter = RuleFilter {
        categories,
        severities,
        enabled: disabled.then_some(false),
    };

    if let Some(config) = engine.config() {
        let environment = match config.config.environment.as_str() {
            "" => "-",
            env => env,
        };
        println!("{} ({}), default environment: {}\n", config.kind, config.api_version, environment);
    }

    let rules = engine.rules(&filter);
    if rules.is_empty() {
        println!("No rules match.");
        return Ok(());
    }

    let id_width = rules.iter().map(|r| r.id.len()).max().unwrap_or(10);
    for rule in &rules {
        let c = &rule.condition;
        let threshold = c
            .threshold
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<width$}  {:<10} {:<8} {} {} {}{}",
            rule.id,
            rule.category,
            rule.severity,
            c.metric,
            c.operator,
            threshold,
            if rule.enabled { "" } else { "  (disabled)" },
            width = id_width
        );
        for (env, t) in &c.thresholds {
            println!("  {:<width$}  {:>19} {}: {}", "", "", env, t, width = id_width);
        }
    }
    println!("\n{} rule(s)", rules.len());
    Ok(())
}

pub fn validate(file: &Path) -> Result<(), InspectError> {
    let config = kinspect_core::rules::load_rules(file)?;

    println!("Rules file '{}' is valid.", file.display());
    println!("  apiVersion: {}", config.api_version);
    println!("  Rules: {}", config.rules.len());

    let disabled = config.rules.iter().filter(|r| !r.enabled).count();
    if disabled > 0 {
        println!("  Disabled: {}", disabled);
    }

    // Environments named in thresholds but not reachable from any cluster.
    let mapped: Vec<&str> = config
        .cluster_environments
        .values()
        .map(String::as_str)
        .chain(std::iter::once(config.config.environment.as_str()))
        .collect();
    let mut warnings = Vec::new();
    for rule in &config.rules {
        for env in rule.condition.thresholds.keys() {
            if env != "default" && !mapped.contains(&env.as_str()) {
                warnings.push(format!(
                    "rule '{}' has a threshold for environment '{}' that no cluster maps to",
                    rule.id, env
                ));
            }
        }
    }

    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in &warnings {
            println!("  - {}", w);
        }
    }

    Ok(())
}

pub fn env(cluster: &str, rules: Option<PathBuf>) -> Result<(), InspectError> {
    let engine = super::load_engine(rules)?;
    println!("{}", engine.environment_for(cluster));
    Ok(())
}
