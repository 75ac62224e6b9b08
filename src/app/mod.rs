mod runner;
mod snapshots;
pub(crate) mod summary;

pub(crate) use runner::{LocalRun, run_local};
