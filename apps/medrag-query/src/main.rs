use clap::Parser;

use medrag_query::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	medrag_query::run(args).await
}
