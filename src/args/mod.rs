//! CLI argument types and parsing helpers.
mod cli;
mod defaults;
pub(crate) mod parsers;
mod types;

#[cfg(test)]
mod tests;

pub use cli::LoadArgs;
pub use types::{HttpMethod, PositiveU64, PositiveUsize};

pub(crate) use defaults::{DEFAULT_CONFIG_FILES, DEFAULT_ROUND_INTERVAL, DEFAULT_USER_AGENT};
pub(crate) use parsers::{parse_duration_arg, parse_duration_value, parse_header};
