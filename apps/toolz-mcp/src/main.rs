use clap::Parser;

use toolz_mcp::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	toolz_mcp::run(args).await
}
