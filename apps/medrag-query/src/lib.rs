use std::{
	io::{self, Write},
	path::PathBuf,
	sync::Arc,
};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use medrag_chunking::TerminalApproval;
use medrag_config::Config;
use medrag_service::{EvidenceResponse, MedragService, RetrieveRequest, SearchBackends};
use medrag_storage::QdrantStore;

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
	/// Print the evidence blocks for a question without generating an answer.
	Retrieve {
		question: String,
		#[arg(long, value_name = "N")]
		top_k_sparse: Option<u32>,
		#[arg(long, value_name = "N")]
		top_k_dense: Option<u32>,
		#[arg(long, value_name = "N")]
		top_k_final: Option<u32>,
	},
	/// Answer a question from guideline evidence.
	Ask { question: String },
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = medrag_config::load(&args.config)?;

	init_tracing(&config);

	let service = build_service(config).await?;

	match args.command {
		Command::Retrieve { question, top_k_sparse, top_k_dense, top_k_final } => {
			let mut req = RetrieveRequest::new(question, &service.cfg.retrieval);

			if let Some(value) = top_k_sparse {
				req.top_k_sparse = value;
			}
			if let Some(value) = top_k_dense {
				req.top_k_dense = value;
			}
			if let Some(value) = top_k_final {
				req.top_k_final = value;
			}

			let candidates = service.retrieve(&req).await?;
			let reranked = service
				.rerank(&req.question, candidates, service.cfg.retrieval.rerank_top_k as usize)
				.await;
			let evidences = service.assemble(&reranked, (&service.cfg.evidence).into())?;

			print_json(&EvidenceResponse { question: req.question.trim().to_string(), evidences })
		},
		Command::Ask { question } => print_json(&service.ask(&question).await?),
	}
}

async fn build_service(config: Config) -> color_eyre::Result<MedragService> {
	let tokens = medrag_chunking::load_token_counter(&config.tokenizer, &TerminalApproval)?;
	let store = QdrantStore::new(&config.storage.qdrant)?;

	store.ensure_ready().await?;

	Ok(MedragService::new(config, SearchBackends::qdrant(Arc::new(store)), Arc::new(tokens)))
}

fn print_json<T>(value: &T) -> color_eyre::Result<()>
where
	T: Serialize,
{
	let mut stdout = io::stdout().lock();

	serde_json::to_writer_pretty(&mut stdout, value)?;

	writeln!(stdout)?;

	Ok(())
}

fn init_tracing(config: &Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}
