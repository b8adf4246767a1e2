pub mod envelope;
pub mod server;

use std::{io, sync::Arc};

use clap::Parser;
use color_eyre::{Result, eyre};
use rmcp::ServiceExt;
use tracing_subscriber::EnvFilter;

use toolz_cli::CommonArgs;
use toolz_config::Config;
use toolz_service::ToolzService;
use toolz_storage::db::Db;

use crate::server::ToolzMcp;

#[derive(Debug, Parser)]
#[command(
	version = toolz_cli::VERSION,
	rename_all = "kebab",
	styles = toolz_cli::styles(),
)]
pub struct Args {
	#[command(flatten)]
	pub common: CommonArgs,
}

pub async fn run(args: Args) -> Result<()> {
	let config = load_config(&args)?;

	init_tracing(&config);

	let db = Db::connect(&config.storage.sqlite).await?;

	db.ensure_schema().await?;

	tracing::info!(
		path = %config.storage.sqlite.path.display(),
		providers = config.providers.len(),
		"Context store ready."
	);

	let service = ToolzService::new(config, db);
	let running = ToolzMcp::new(Arc::new(service))
		.serve(rmcp::transport::stdio())
		.await
		.map_err(|err| eyre::eyre!("Failed to start the MCP server: {err}"))?;
	let reason = running.waiting().await?;

	tracing::info!(?reason, "MCP server stopped.");

	Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
	let mut config = match &args.common.config {
		Some(path) => toolz_config::load(path)?,
		None => toolz_config::from_env()?,
	};

	if let Some(project) = &args.common.project {
		config.session.project_path = Some(project.clone());
	}

	Ok(config)
}

// Stdout carries the protocol, so logs go to stderr.
fn init_tracing(config: &Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}
