pub mod inspect;
pub mod rules;

use kinspect_core::error::InspectError;
use kinspect_core::evaluate::Engine;
use std::path::PathBuf;

/// Engine over the given rules file, or over the bundled rules.
pub fn load_engine(rules: Option<PathBuf>) -> Result<Engine, InspectError> {
    match rules {
        Some(path) => Engine::from_path(path),
        None => Engine::builtin(),
    }
}
