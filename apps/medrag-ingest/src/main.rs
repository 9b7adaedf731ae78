use clap::Parser;

use medrag_ingest::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	medrag_ingest::run(args).await
}
