use clap::Parser;

use aiera_mcp::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	aiera_mcp::run(args).await
}
