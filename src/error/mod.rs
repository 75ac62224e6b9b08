mod app;
mod config;
mod engine;
mod http;
mod output;
mod validation;

#[cfg(test)]
mod test_support;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use engine::{EngineError, RunFault, ScenarioError, TargetError};
pub use http::HttpError;
pub use output::OutputError;
pub use validation::ValidationError;
