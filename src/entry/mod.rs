mod plan;

use std::ffi::OsString;

use clap::{CommandFactory, FromArgMatches};

use crate::args::LoadArgs;
use crate::config::default_config_path;
use crate::error::AppResult;
use plan::{build_plan, execute_plan};

pub(crate) fn run() -> AppResult<()> {
    let argv: Vec<OsString> = std::env::args_os().collect();
    if nothing_to_run(&argv) {
        LoadArgs::command().print_help()?;
        println!();
        return Ok(());
    }

    let matches = LoadArgs::command().get_matches_from(argv);
    let args = LoadArgs::from_arg_matches(&matches)?;
    crate::logger::init_logging(args.verbose, args.no_color);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let plan = build_plan(args, &matches)?;
        execute_plan(plan).await
    })
}

/// Without flags the only possible settings source is a config file in the
/// working directory; lacking one, usage is more useful than a validation
/// error.
fn nothing_to_run(argv: &[OsString]) -> bool {
    let flags = argv.get(1..).unwrap_or_default();
    let flagless = match flags {
        [] => true,
        [only] => only == "--",
        _ => false,
    };
    flagless && default_config_path().is_none()
}
