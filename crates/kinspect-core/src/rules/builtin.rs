use crate::error::InspectError;
use crate::rules::RuleLoader;

const DEFAULT_RULES_YAML: &str = include_str!("../../../../rules/default.yaml");

/// Origin label used in logs and errors for the bundled document.
pub const DEFAULT_RULES_ORIGIN: &str = "builtin:default";

/// A loader for the bundled rule set, already loaded.
pub fn default_loader() -> Result<RuleLoader, InspectError> {
    let mut loader = RuleLoader::from_yaml(DEFAULT_RULES_ORIGIN, DEFAULT_RULES_YAML);
    loader.load()?;
    Ok(loader)
}
