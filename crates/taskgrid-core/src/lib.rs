pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod render;
pub mod store;
pub mod task;
pub mod views;

use std::ffi::OsString;
use std::io::{
  self,
  IsTerminal
};

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskgrid"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg
    .apply_overrides(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
    .context("invalid --rc override")?;
  debug!(
    timezone = %cfg.timezone(),
    view = cfg.default_view().as_key(),
    "configuration resolved"
  );

  let stdout = io::stdout();
  let renderer = render::Renderer::new(
    &cfg,
    stdout.is_terminal()
  );
  let mut session =
    commands::Session::new(
      &cfg, renderer, cli.seed
    );
  let mut out = stdout.lock();

  if cli.commands.is_empty() {
    let stdin = io::stdin();
    let prompt = stdin.is_terminal();
    session.run_lines(
      stdin.lock(),
      &mut out,
      prompt
    )?;
  } else {
    session.run_commands(
      &cli.commands,
      &mut out
    )?;
  }

  info!(
    tasks = session.store().len(),
    "done"
  );
  Ok(())
}
