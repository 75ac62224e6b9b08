//! reqwest-backed target client for the URL-list scenario.
mod client;
mod preflight;
mod target;


pub use client::{HttpClientSettings, build_client};
pub use preflight::preflight;
pub use target::HttpTarget;
