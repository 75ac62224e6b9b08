mod app;
mod args;
mod config;
mod engine;
mod entry;
mod error;
mod http;
mod logger;
mod scenario;
mod shutdown_handlers;

use error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
