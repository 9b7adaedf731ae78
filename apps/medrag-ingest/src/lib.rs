use std::{
	fs::{self, File},
	io::{BufReader, BufWriter},
	path::{Path, PathBuf},
	sync::Arc,
};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{self, WrapErr};
use tracing_subscriber::EnvFilter;

use medrag_chunking::{Chunker, ChunkingConfig, TerminalApproval};
use medrag_config::Config;
use medrag_storage::{QdrantStore, qdrant::UPSERT_BATCH_SIZE};

#[derive(Debug, Parser)]
#[command(
	version = medrag_cli::VERSION,
	rename_all = "kebab",
	styles = medrag_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Split parsed paragraphs into chunk records.
	Chunk {
		/// Paragraph JSON Lines input. Defaults to `paths.parsed_docs`.
		#[arg(long, short = 'i', value_name = "FILE")]
		input: Option<PathBuf>,
		/// Chunk JSON Lines output. Defaults to `paths.chunks`.
		#[arg(long, short = 'o', value_name = "FILE")]
		output: Option<PathBuf>,
	},
	/// Embed chunk records and upsert them into the Qdrant collection.
	Index {
		/// Chunk JSON Lines input. Defaults to `paths.chunks`.
		#[arg(long, short = 'i', value_name = "FILE")]
		input: Option<PathBuf>,
		/// Drop and recreate the collection first.
		#[arg(long)]
		recreate: bool,
	},
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = medrag_config::load(&args.config)?;

	init_tracing(&config);

	match args.command {
		Command::Chunk { input, output } => {
			let input = input.unwrap_or_else(|| config.paths.parsed_docs.clone());
			let output = output.unwrap_or_else(|| config.paths.chunks.clone());

			chunk(&config, &input, &output)
		},
		Command::Index { input, recreate } => {
			let input = input.unwrap_or_else(|| config.paths.chunks.clone());

			index(&config, &input, recreate).await
		},
	}
}

fn chunk(config: &Config, input: &Path, output: &Path) -> color_eyre::Result<()> {
	let tokens = medrag_chunking::load_token_counter(&config.tokenizer, &TerminalApproval)?;

	if tokens.is_approximate() {
		tracing::warn!("Chunk sizes use approximate whitespace token counts.");
	}

	let chunker = Chunker::new(ChunkingConfig::from(&config.chunking), Arc::new(tokens))?;
	let reader = File::open(input)
		.wrap_err_with(|| format!("Failed to open paragraphs at {}.", input.display()))?;

	if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
		fs::create_dir_all(parent)?;
	}

	let writer = File::create(output)
		.wrap_err_with(|| format!("Failed to create chunk file at {}.", output.display()))?;
	let paragraphs = medrag_chunking::read_paragraphs(BufReader::new(reader));
	let written = medrag_chunking::write_chunks(
		chunker.chunk_records(paragraphs),
		BufWriter::new(writer),
	)?;

	tracing::info!(written, output = %output.display(), "Wrote chunk records.");

	Ok(())
}

async fn index(config: &Config, input: &Path, recreate: bool) -> color_eyre::Result<()> {
	let reader = File::open(input)
		.wrap_err_with(|| format!("Failed to open chunks at {}.", input.display()))?;
	let chunks =
		medrag_chunking::read_chunks(BufReader::new(reader)).collect::<Result<Vec<_>, _>>()?;

	if chunks.is_empty() {
		return Err(eyre::eyre!("No chunk records found in {}.", input.display()));
	}

	let store = QdrantStore::new(&config.storage.qdrant)?;

	store.ensure_collection(recreate).await?;

	let mut indexed = 0;

	for batch in chunks.chunks(UPSERT_BATCH_SIZE) {
		let texts = batch.iter().map(|chunk| chunk.text.clone()).collect::<Vec<_>>();
		let vectors =
			medrag_providers::embedding::embed(&config.providers.embedding, &texts).await?;

		indexed += store.upsert_chunks(batch, &vectors).await?;

		tracing::debug!(indexed, total = chunks.len(), "Indexed chunk batch.");
	}

	tracing::info!(indexed, collection = %store.collection, "Indexed chunks.");

	Ok(())
}

fn init_tracing(config: &Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}
