// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cpe_dictionary::api::{CpeApi, FuzzySearchRequest};
use cpe_dictionary::config::{Config, FetchConfig, StoreConfig};
use cpe_dictionary::db::{open_store, CpeStore, StoreKind, DEFAULT_BATCH_SIZE};
use cpe_dictionary::error::StoreError;
use cpe_dictionary::fetcher::{Fetcher, JvnFetcher, NvdFetcher, VulsFetcher};
use cpe_dictionary::models::FetchType;
use cpe_dictionary::normalize::normalize;
use cpe_dictionary::refresh::{refresh, write_records};
use cpe_dictionary::utils;

#[derive(Debug, Parser)]
#[command(name = "cpe-dictionary", version, about = "Fetch and query CPE dictionaries")]
struct Cli {
	/// Storage backend
	#[arg(long, global = true, env = "CPE_DICTIONARY_DBTYPE", default_value = "sqlite3")]
	dbtype: StoreKind,

	/// Database file; defaults to the platform data directory
	#[arg(long, global = true, env = "CPE_DICTIONARY_DBPATH")]
	dbpath: Option<PathBuf>,

	/// Concurrent feed downloads
	#[arg(long, global = true, env = "CPE_DICTIONARY_THREADS")]
	threads: Option<usize>,

	/// Seconds to wait between feed downloads
	#[arg(long, global = true, env = "CPE_DICTIONARY_WAIT", default_value_t = 0)]
	wait: u64,

	/// Records per write batch
	#[arg(long, global = true, env = "CPE_DICTIONARY_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
	batch_size: usize,

	#[arg(long, global = true, env = "HTTP_PROXY")]
	http_proxy: Option<String>,

	#[arg(long, global = true, env = "CPE_DICTIONARY_DEBUG")]
	debug: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Download a source and replace its records in the store
	Fetch {
		/// nvd, jvn or vuls
		source: FetchType,

		/// Print normalized records instead of storing them
		#[arg(long)]
		stdout: bool,
	},
	/// List active and deprecated vendor/product pairs
	Products,
	/// List CPE URIs for one vendor/product pair
	Cpes { vendor: String, product: String },
	/// Fuzzy search over titles
	Search {
		query: String,

		#[arg(short, long, default_value_t = 10)]
		n: usize,

		#[arg(long, default_value = "")]
		algorithm: String,

		/// Rank "vendor product" keys instead of titles
		#[arg(long)]
		by_product: bool,
	},
}

impl Cli {
	fn config(&self) -> Config {
		let defaults = FetchConfig::default();
		Config {
			store: StoreConfig::new(self.dbtype, self.dbpath.clone()),
			fetch: FetchConfig {
				threads: self.threads.unwrap_or(defaults.threads),
				wait: Duration::from_secs(self.wait),
				batch_size: self.batch_size,
				http_proxy: self.http_proxy.clone(),
				..defaults
			},
		}
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	utils::logger::init(cli.debug);

	let config = cli.config();
	config.fetch.validate().context("Invalid configuration")?;

	match cli.command {
		Command::Fetch { source, stdout } => fetch(&config, source, stdout).await,
		Command::Products => {
			let api = CpeApi::new(open(&config)?);
			print_json(&api.vendor_products().await.context("Failed to list vendor products")?)
		}
		Command::Cpes { vendor, product } => {
			let api = CpeApi::new(open(&config)?);
			let response = api
				.cpes_by_vendor_product(&vendor, &product)
				.await
				.context("Failed to list CPEs")?;
			print_json(&response)
		}
		Command::Search {
			query,
			n,
			algorithm,
			by_product,
		} => {
			let api = CpeApi::new(open(&config)?);
			let request = FuzzySearchRequest { query, n, algorithm };
			let found = if by_product {
				api.similar_by_product(request).await
			} else {
				api.similar_by_title(request).await
			}
			.context("Fuzzy search failed")?;
			print_json(&found)
		}
	}
}

fn open(config: &Config) -> Result<Arc<dyn CpeStore>> {
	let path = &config.store.path;
	info!("Opening {} store at {}", config.store.kind, path.display());
	open_store(config.store.kind, path).map_err(|err| {
		let hint = matches!(err, StoreError::Locked);
		anyhow::Error::new(err).context(if hint {
			format!("{} is in use by another process", path.display())
		} else {
			format!("Failed to open {}", path.display())
		})
	})
}

async fn fetch(config: &Config, source: FetchType, stdout: bool) -> Result<()> {
	let client = config.fetch.http_client().context("Failed to create HTTP client")?;
	let sources = &config.fetch.sources;
	match source {
		FetchType::Nvd => {
			let fetcher = NvdFetcher::new(
				client,
				config.fetch.harness_options(),
				&sources.nvd_dictionary,
				&sources.nvd_match,
			);
			run_fetch(config, &fetcher, stdout).await
		}
		FetchType::Jvn => {
			let fetcher = JvnFetcher::new(client, config.fetch.harness_options(), &sources.jvn_feed_base);
			run_fetch(config, &fetcher, stdout).await
		}
		FetchType::Vuls => {
			let fetcher = VulsFetcher::new(client, &sources.vuls_annotation);
			run_fetch(config, &fetcher, stdout).await
		}
	}
}

async fn run_fetch<F: Fetcher>(config: &Config, fetcher: &F, stdout: bool) -> Result<()> {
	let fetch_type = fetcher.fetch_type();

	if stdout {
		let fetched = fetcher
			.fetch()
			.await
			.with_context(|| format!("Failed to fetch {fetch_type} CPEs"))?;
		let records = normalize(fetch_type, &fetched);
		let mut out = io::stdout().lock();
		write_records(&mut out, &records).context("Failed to write records")?;
		out.flush().context("Failed to flush stdout")?;
		return Ok(());
	}

	let store = open(config)?;
	let report = refresh(store, fetcher, config.fetch.ingest_options())
		.await
		.with_context(|| format!("Failed to refresh {fetch_type} CPEs"))?;
	info!(
		"Finished {}: {} active and {} deprecated entries, {} records stored",
		report.fetch_type, report.active_entries, report.deprecated_entries, report.inserted
	);
	Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
	let json = serde_json::to_string_pretty(value).context("Failed to serialize response")?;
	println!("{json}");
	Ok(())
}
