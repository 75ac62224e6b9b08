//! Optional TOML/JSON config file merged under the CLI arguments.
mod apply;
mod loader;
pub mod types;

#[cfg(test)]
mod tests;

pub use apply::apply_config;
pub use loader::{default_config_path, load_config};
pub(crate) use loader::load_config_file;
pub use types::ConfigFile;
