pub mod engine;
pub mod outcome;
pub mod validator;

pub use engine::Engine;
pub use outcome::RuleResult;
pub use validator::{validator_for, validator_for_value, Validator};
