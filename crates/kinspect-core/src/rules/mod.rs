pub mod builtin;
pub mod schema;

use crate::error::InspectError;
use schema::{
    Operator, Rule, RuleCondition, RuleDef, RuleFilter, RulesConfig, RulesConfigDef, Severity,
    Threshold, DEFAULT_ENVIRONMENT_KEY, FALLBACK_ENVIRONMENT, RULES_CONFIG_KIND,
};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone)]
enum RuleSource {
    File(PathBuf),
    Inline { origin: String, yaml: String },
}

/// Reads a rules document and keeps the last successfully validated copy.
///
/// A load either replaces the whole rule set or leaves the previous one in
/// place; there is no partial load. Reloading is explicit: call
/// [`RuleLoader::load`] again and the file is re-read only if its
/// modification time changed.
#[derive(Debug, Clone)]
pub struct RuleLoader {
    source: RuleSource,
    last_modified: Option<SystemTime>,
    config: Option<RulesConfig>,
}

impl RuleLoader {
    /// Loader backed by a YAML file on disk. Nothing is read until `load`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RuleLoader {
            source: RuleSource::File(path.into()),
            last_modified: None,
            config: None,
        }
    }

    /// Loader backed by an in-memory YAML document.
    pub fn from_yaml(origin: impl Into<String>, yaml: impl Into<String>) -> Self {
        RuleLoader {
            source: RuleSource::Inline {
                origin: origin.into(),
                yaml: yaml.into(),
            },
            last_modified: None,
            config: None,
        }
    }

    /// Load (or reload) the document.
    ///
    /// Returns `Ok(false)` when the backing file is unchanged since the last
    /// successful load and the cached rule set was kept.
    pub fn load(&mut self) -> Result<bool, InspectError> {
        match &self.source {
            RuleSource::File(path) => {
                let modified = file_modified(path)?;
                if self.config.is_some() && modified.is_some() && modified == self.last_modified {
                    tracing::debug!(path = %path.display(), "rules file unchanged, keeping loaded rules");
                    return Ok(false);
                }

                let content =
                    std::fs::read_to_string(path).map_err(|e| InspectError::RulesRead {
                        path: path.clone(),
                        source: e,
                    })?;
                let config = parse_rules(&content, &path.display().to_string())?;
                tracing::info!(
                    path = %path.display(),
                    rules = config.rules.len(),
                    "loaded rules"
                );
                self.config = Some(config);
                self.last_modified = modified;
                Ok(true)
            }
            RuleSource::Inline { origin, yaml } => {
                if self.config.is_some() {
                    return Ok(false);
                }
                let config = parse_rules(yaml, origin)?;
                tracing::info!(origin = %origin, rules = config.rules.len(), "loaded rules");
                self.config = Some(config);
                Ok(true)
            }
        }
    }

    /// The loaded document, if `load` has succeeded at least once.
    pub fn config(&self) -> Option<&RulesConfig> {
        self.config.as_ref()
    }

    /// Rules matching the filter, in document order.
    pub fn rules(&self, filter: &RuleFilter) -> Vec<&Rule> {
        self.config
            .iter()
            .flat_map(|c| c.rules.iter())
            .filter(|r| filter.matches(r))
            .collect()
    }

    /// Environment for a cluster: the cluster's own mapping, then the
    /// `default` mapping, then `config.environment`, then `prod`.
    pub fn environment_for(&self, cluster_name: &str) -> &str {
        let Some(config) = &self.config else {
            return FALLBACK_ENVIRONMENT;
        };
        if let Some(env) = config.cluster_environments.get(cluster_name) {
            return env;
        }
        if let Some(env) = config.cluster_environments.get(DEFAULT_ENVIRONMENT_KEY) {
            return env;
        }
        if !config.config.environment.is_empty() {
            return &config.config.environment;
        }
        FALLBACK_ENVIRONMENT
    }
}

fn file_modified(path: &Path) -> Result<Option<SystemTime>, InspectError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.modified().ok()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(InspectError::RulesNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(InspectError::RulesRead {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Parse and validate a rules document from a YAML string.
pub fn parse_rules(yaml: &str, origin: &str) -> Result<RulesConfig, InspectError> {
    let def: RulesConfigDef = serde_yaml::from_str(yaml).map_err(|e| InspectError::RulesParse {
        origin: origin.to_string(),
        reason: e.to_string(),
    })?;
    validate_rules(def)
}

/// Load a rules document from a file without keeping a loader around.
pub fn load_rules(path: &Path) -> Result<RulesConfig, InspectError> {
    let mut loader = RuleLoader::new(path);
    loader.load()?;
    loader
        .config
        .ok_or_else(|| InspectError::RulesInvalid("rules document did not load".into()))
}

/// Validate a deserialized document and convert it into its typed form.
pub fn validate_rules(def: RulesConfigDef) -> Result<RulesConfig, InspectError> {
    if def.api_version.is_empty() {
        return Err(InspectError::RulesInvalid("missing apiVersion".into()));
    }
    if def.kind.is_empty() {
        return Err(InspectError::RulesInvalid("missing kind".into()));
    }
    if def.kind != RULES_CONFIG_KIND {
        return Err(InspectError::RulesInvalid(format!(
            "unsupported kind '{}' (expected '{}')",
            def.kind, RULES_CONFIG_KIND
        )));
    }

    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(def.rules.len());
    for (i, rule) in def.rules.into_iter().enumerate() {
        let rule = validate_rule(i, rule)?;
        if !seen.insert(rule.id.clone()) {
            return Err(InspectError::RulesInvalid(format!(
                "duplicate rule id '{}'",
                rule.id
            )));
        }
        rules.push(rule);
    }

    Ok(RulesConfig {
        api_version: def.api_version,
        kind: def.kind,
        config: def.config,
        cluster_environments: def.cluster_environments,
        rules,
    })
}

fn validate_rule(index: usize, def: RuleDef) -> Result<Rule, InspectError> {
    if def.id.is_empty() {
        return Err(InspectError::RulesInvalid(format!(
            "rule #{} is missing an id",
            index + 1
        )));
    }
    let invalid = |what: String| InspectError::RulesInvalid(format!("rule '{}': {}", def.id, what));

    if def.name.is_empty() {
        return Err(invalid("missing name".into()));
    }
    if def.category.is_empty() {
        return Err(invalid("missing category".into()));
    }
    if def.severity.is_empty() {
        return Err(invalid("missing severity".into()));
    }
    let severity: Severity = def.severity.parse().map_err(invalid)?;

    let cond = &def.condition;
    if cond.metric.is_empty() {
        return Err(invalid("missing condition.metric".into()));
    }
    if cond.operator.is_empty() {
        return Err(invalid("missing condition.operator".into()));
    }
    let operator: Operator = cond.operator.parse().map_err(invalid)?;

    let threshold = match &cond.threshold {
        Some(value) if !value.is_null() => Some(Threshold::from_yaml(value).map_err(invalid)?),
        _ => None,
    };
    let mut thresholds = BTreeMap::new();
    for (env, value) in &cond.thresholds {
        let t = Threshold::from_yaml(value)
            .map_err(|e| invalid(format!("thresholds.{}: {}", env, e)))?;
        thresholds.insert(env.clone(), t);
    }

    let mut condition =
        RuleCondition::new(cond.metric.clone(), operator, threshold, thresholds).map_err(invalid)?;
    if let Some(duration) = &cond.duration {
        condition = condition.with_duration(duration.clone());
    }

    Ok(Rule {
        id: def.id,
        name: def.name,
        description: def.description,
        category: def.category,
        severity,
        condition,
        remediation: def.remediation,
        enabled: def.enabled,
        created_at: def.created_at,
        updated_at: def.updated_at,
    })
}
