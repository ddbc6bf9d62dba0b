use std::{
	collections::BTreeSet,
	fs,
	path::{Path, PathBuf},
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use docent_service::DocentService;
use docent_storage::{db::Db, qdrant::QdrantStore};

#[derive(Debug, Parser)]
#[command(
	version = docent_cli::VERSION,
	rename_all = "kebab",
	styles = docent_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	/// Overrides the dataset's `top_k`, which in turn overrides `search.default_top_k`.
	#[arg(long, value_name = "N")]
	pub top_k: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EvalDataset {
	name: Option<String>,
	top_k: Option<u32>,
	queries: Vec<EvalQuery>,
}

#[derive(Debug, Deserialize)]
struct EvalQuery {
	id: Option<String>,
	query: String,
	relevant_chunks: Vec<i32>,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	dataset: String,
	top_k: u32,
	summary: EvalSummary,
	queries: Vec<QueryReport>,
}

#[derive(Debug, PartialEq, Serialize)]
struct EvalSummary {
	avg_precision: f64,
	avg_recall: f64,
	avg_f1: f64,
	avg_latency_ms: f64,
	latency_ms_p50: f64,
	latency_ms_p95: f64,
}

#[derive(Debug, Serialize)]
struct QueryReport {
	id: String,
	query: String,
	precision: f64,
	recall: f64,
	f1: f64,
	latency_ms: f64,
	relevant_chunks: Vec<i32>,
	retrieved_chunks: Vec<i32>,
}

#[derive(Debug, PartialEq)]
struct Metrics {
	precision: f64,
	recall: f64,
	f1: f64,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = docent_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let dataset = load_dataset(&args.dataset)?;
	let top_k = args.top_k.or(dataset.top_k).unwrap_or(config.search.default_top_k);

	if top_k == 0 || top_k > config.search.max_top_k {
		return Err(eyre::eyre!("top_k must be between 1 and {}.", config.search.max_top_k));
	}

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let qdrant = QdrantStore::new(&config.storage.qdrant)?;
	let service = DocentService::new(config, db, qdrant);
	let mut reports = Vec::with_capacity(dataset.queries.len());

	for (index, query) in dataset.queries.iter().enumerate() {
		let started = Instant::now();
		let hits = service.fuse(&query.query, top_k).await?;
		let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;
		// Unresolved hits carry no sequence and cannot match the ground truth.
		let retrieved: BTreeSet<i32> = hits.iter().filter_map(|hit| hit.chunk_sequence).collect();
		let relevant: BTreeSet<i32> = query.relevant_chunks.iter().copied().collect();
		let metrics = compute_metrics(&retrieved, &relevant);

		tracing::debug!(index, latency_ms, hit_count = hits.len(), "Evaluated query.");

		reports.push(QueryReport {
			id: query.id.clone().unwrap_or_else(|| format!("q{}", index + 1)),
			query: query.query.clone(),
			precision: metrics.precision,
			recall: metrics.recall,
			f1: metrics.f1,
			latency_ms,
			relevant_chunks: relevant.into_iter().collect(),
			retrieved_chunks: retrieved.into_iter().collect(),
		});
	}

	let output = EvalOutput {
		dataset: dataset.name.unwrap_or_else(|| "eval".to_string()),
		top_k,
		summary: summarize(&reports),
		queries: reports,
	};

	println!("{}", serde_json::to_string_pretty(&output)?);

	Ok(())
}

fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}
	if dataset.top_k == Some(0) {
		return Err(eyre::eyre!("Dataset top_k must be greater than zero."));
	}

	Ok(dataset)
}

/// Set-based precision, recall and F1 over chunk sequences.
fn compute_metrics(retrieved: &BTreeSet<i32>, relevant: &BTreeSet<i32>) -> Metrics {
	let true_positives = retrieved.intersection(relevant).count() as f64;
	let precision =
		if retrieved.is_empty() { 0.0 } else { true_positives / retrieved.len() as f64 };
	let recall = if relevant.is_empty() { 0.0 } else { true_positives / relevant.len() as f64 };
	let f1 = if precision + recall > 0.0 {
		2.0 * precision * recall / (precision + recall)
	} else {
		0.0
	};

	Metrics { precision, recall, f1 }
}

fn summarize(reports: &[QueryReport]) -> EvalSummary {
	let count = reports.len().max(1) as f64;
	let mut latencies: Vec<f64> = reports.iter().map(|report| report.latency_ms).collect();

	latencies.sort_by(|a, b| a.total_cmp(b));

	EvalSummary {
		avg_precision: reports.iter().map(|report| report.precision).sum::<f64>() / count,
		avg_recall: reports.iter().map(|report| report.recall).sum::<f64>() / count,
		avg_f1: reports.iter().map(|report| report.f1).sum::<f64>() / count,
		avg_latency_ms: latencies.iter().sum::<f64>() / count,
		latency_ms_p50: percentile(&latencies, 0.50),
		latency_ms_p95: percentile(&latencies, 0.95),
	}
}

/// Linear interpolation between closest ranks. `sorted` must be ascending.
fn percentile(sorted: &[f64], percentile: f64) -> f64 {
	if sorted.is_empty() {
		return 0.0;
	}

	let pos = percentile.clamp(0.0, 1.0) * (sorted.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		return sorted[lower];
	}

	let weight = pos - lower as f64;

	sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}
