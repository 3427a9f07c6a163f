//! scholarleads - academic lead generation from Google Scholar
//!
//! Finds highly cited researchers through a Scholar-scoped Custom Search
//! engine, resolves their Wikipedia page, homepage and contact email, and
//! appends them to three deduplicated CSV files.
//!
//! ## Usage
//!
//! ```bash
//! export GOOGLE_API_KEY=... GOOGLE_SCHOLAR_CSE_ID=... GOOGLE_GENERAL_CSE_ID=...
//! scholarleads search --pages 3 --min-citations 20000
//! scholarleads dedup
//! scholarleads wiki "Avi Loeb"
//! scholarleads email https://lab.example.edu/people/jdoe --person "Jane Doe"
//! scholarleads enrich leads.csv --output enriched --max-entries 50
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use scholarleads::assembler::{dedup_file, output_paths, LeadSink, Partition};
use scholarleads::batch::{enrich_csv, BatchOptions};
use scholarleads::config::{Credentials, LlmConfig, PipelineConfig, DEFAULT_SEARCH_TERM};
use scholarleads::cookies::CookieManager;
use scholarleads::cse::{CseClient, SearchItem};
use scholarleads::email::EmailResolver;
use scholarleads::homepage::{HomepageResolver, ProfileFetch};
use scholarleads::matcher::{MatchVocabulary, NameMatcher};
use scholarleads::metrics::QualificationPolicy;
use scholarleads::resolver::{CandidateOutcome, CandidateResolver};
use scholarleads::review::{ArticleReviewer, USAGE_LOG_FILE};
use scholarleads::wikipedia::WikipediaResolver;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Academic lead pipeline over Google Scholar, Wikipedia and faculty homepages
#[derive(Parser)]
#[command(name = "scholarleads")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search Scholar profiles and write qualified leads
    Search(SearchArgs),

    /// Remove duplicate rows from lead CSVs in place
    Dedup {
        /// Files to deduplicate (default: the three output files)
        files: Vec<PathBuf>,

        /// Directory holding the default output files
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Resolve the Wikipedia page of one person
    Wiki {
        /// Person name
        name: String,

        /// JSON file overriding the alias and keyword vocabulary
        #[arg(long)]
        vocabulary: Option<PathBuf>,

        /// Affiliation tokens used in augmented queries
        #[arg(long = "affiliation", default_value = "harvard")]
        affiliations: Vec<String>,
    },

    /// Find the contact email behind a homepage
    Email {
        /// Homepage URL
        url: String,

        /// Name of the person the email should belong to
        #[arg(long)]
        person: String,

        /// Maximum pages fetched by the crawl
        #[arg(long, default_value = "20")]
        max_crawl_pages: usize,

        /// Google API key (enables search fallbacks together with --general-cx)
        #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Whole-web Custom Search engine id
        #[arg(long, env = "GOOGLE_GENERAL_CSE_ID")]
        general_cx: Option<String>,
    },

    /// Add Wikipedia pages and summaries to an existing lead CSV
    Enrich(EnrichArgs),

    /// Manage cookies used for direct profile fetches
    Cookies {
        #[command(subcommand)]
        action: CookieAction,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Search term sent to the Scholar engine
    #[arg(default_value = DEFAULT_SEARCH_TERM)]
    term: String,

    /// Result pages to walk (10 results each)
    #[arg(long, default_value = "1")]
    pages: u32,

    /// Minimum citation count
    #[arg(long, default_value = "10000")]
    min_citations: u64,

    /// Minimum h-index when one is known
    #[arg(long, default_value = "40")]
    min_h_index: u64,

    /// Reject candidates whose h-index cannot be found
    #[arg(long)]
    require_h_index: bool,

    /// Affiliation token preferred in homepage hosts and used in Wikipedia queries
    #[arg(long = "affiliation", default_value = "harvard")]
    affiliations: Vec<String>,

    /// Maximum pages fetched per homepage crawl
    #[arg(long, default_value = "20")]
    max_crawl_pages: usize,

    /// Profile page fetch strategy: direct, mirror, both or disabled
    #[arg(long, default_value = "both")]
    profile_fetch: ProfileFetch,

    /// JSON file overriding the alias and keyword vocabulary
    #[arg(long)]
    vocabulary: Option<PathBuf>,

    /// Output directory for the lead CSVs
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Delay between Custom Search queries (ms)
    #[arg(long, default_value = "500")]
    cse_delay_ms: u64,

    /// Delay before each Wikipedia API call (ms)
    #[arg(long, default_value = "200")]
    wiki_delay_ms: u64,

    /// HTTP request timeout (seconds)
    #[arg(long, default_value = "20")]
    timeout: u64,

    #[command(flatten)]
    llm: LlmArgs,

    /// Google API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Custom Search engine id scoped to scholar.google.com
    #[arg(long, env = "GOOGLE_SCHOLAR_CSE_ID")]
    scholar_cx: Option<String>,

    /// Whole-web Custom Search engine id (homepage and email fallbacks)
    #[arg(long, env = "GOOGLE_GENERAL_CSE_ID")]
    general_cx: Option<String>,
}

#[derive(Args)]
struct EnrichArgs {
    /// Lead CSV with at least a Name column
    input: PathBuf,

    /// Output directory for the partitioned lead CSVs
    #[arg(short, long, default_value = "enriched")]
    output: PathBuf,

    /// Enrich at most this many unprocessed rows
    #[arg(long)]
    max_entries: Option<usize>,

    /// Process every row again, even those already in the output
    #[arg(long)]
    force: bool,

    /// JSON file overriding the alias and keyword vocabulary
    #[arg(long)]
    vocabulary: Option<PathBuf>,

    /// Affiliation tokens used in augmented Wikipedia queries
    #[arg(long = "affiliation", default_value = "harvard")]
    affiliations: Vec<String>,

    /// Delay before each Wikipedia API call (ms)
    #[arg(long, default_value = "200")]
    wiki_delay_ms: u64,

    /// HTTP request timeout (seconds)
    #[arg(long, default_value = "20")]
    timeout: u64,

    #[command(flatten)]
    llm: LlmArgs,
}

#[derive(Args)]
struct LlmArgs {
    /// LLM API base URL (enables article reviews, e.g., https://api.openai.com/v1)
    #[arg(long, env = "LLM_BASE_URL")]
    llm_base_url: Option<String>,

    /// LLM API key
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    llm_key: Option<String>,

    /// LLM model name
    #[arg(long, default_value = "gpt-4o-mini")]
    llm_model: String,
}

impl LlmArgs {
    fn into_config(self) -> Option<LlmConfig> {
        match (self.llm_base_url, self.llm_key) {
            (Some(base_url), Some(api_key)) => Some(LlmConfig {
                base_url,
                api_key,
                model: self.llm_model,
            }),
            (Some(_), None) => {
                warn!("LLM base URL given without an API key, article reviews disabled");
                None
            }
            _ => None,
        }
    }
}

#[derive(Subcommand)]
enum CookieAction {
    /// Clear stored cookies
    Clear,
    /// Show cookie file path
    Path,
    /// Import a browser cookie export (JSON array)
    Import {
        /// Exported cookie file
        file: PathBuf,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Search(args) => run_search(args).await,
        Commands::Dedup { files, output } => run_dedup(files, &output),
        Commands::Wiki {
            name,
            vocabulary,
            affiliations,
        } => run_wiki(&name, vocabulary.as_deref(), affiliations).await,
        Commands::Email {
            url,
            person,
            max_crawl_pages,
            api_key,
            general_cx,
        } => run_email(&url, &person, max_crawl_pages, api_key, general_cx).await,
        Commands::Enrich(args) => run_enrich(args).await,
        Commands::Cookies { action } => handle_cookies(action),
    }
}

fn load_vocabulary(path: Option<&Path>) -> Result<MatchVocabulary> {
    match path {
        Some(path) => MatchVocabulary::from_json_file(path)
            .with_context(|| format!("Failed to load vocabulary from {}", path.display())),
        None => Ok(MatchVocabulary::default()),
    }
}

// ============================================================================
// Search Pipeline
// ============================================================================

/// Counters printed at the end of a run
#[derive(Debug, Default)]
struct RunStats {
    results: usize,
    qualified: usize,
    rejected: usize,
    duplicates: usize,
    write_errors: usize,
    with_wiki: usize,
    without_wiki: usize,
    without_email: usize,
}

impl RunStats {
    fn record(&mut self, partition: Partition) {
        match partition {
            Partition::WithWikipedia => self.with_wiki += 1,
            Partition::WithoutWikipedia => self.without_wiki += 1,
            Partition::WithoutEmail => self.without_email += 1,
        }
    }

    fn print(&self) {
        println!("\n=== Summary ===");
        println!("Results analyzed:      {}", self.results);
        println!("Qualified:             {}", self.qualified);
        println!("Rejected:              {}", self.rejected);
        println!("Duplicates skipped:    {}", self.duplicates);
        println!("With Wikipedia:        {}", self.with_wiki);
        println!("Without Wikipedia:     {}", self.without_wiki);
        println!("Without email:         {}", self.without_email);
        if self.write_errors > 0 {
            println!("Write errors:          {}", self.write_errors);
        }
    }
}

async fn run_search(args: SearchArgs) -> Result<()> {
    let credentials = Credentials::new(args.api_key, args.scholar_cx, args.general_cx)
        .context("Google Custom Search credentials are incomplete")?;
    let vocabulary = load_vocabulary(args.vocabulary.as_deref())?;

    let llm = args.llm.into_config();

    let config = PipelineConfig {
        policy: QualificationPolicy {
            min_citations: args.min_citations,
            min_h_index: args.min_h_index,
            require_h_index: args.require_h_index,
        },
        affiliations: args.affiliations,
        max_crawl_pages: args.max_crawl_pages,
        profile_fetch: args.profile_fetch,
        max_search_pages: args.pages,
        cse_delay_ms: args.cse_delay_ms,
        wiki_delay_ms: args.wiki_delay_ms,
        request_timeout_secs: args.timeout,
        output_dir: args.output,
        llm,
        ..Default::default()
    };

    if credentials.general_cx.is_none() {
        println!("GOOGLE_GENERAL_CSE_ID not set: homepage re-derivation and email search fallbacks are off.");
    }

    let cookie_header = CookieManager::new()
        .map(|m| m.cookie_header())
        .unwrap_or_default();
    let resolver = CandidateResolver::from_config(&config, &credentials, vocabulary, cookie_header)
        .context("Failed to set up resolvers")?;
    let mut sink = LeadSink::open(&config.output_dir).context("Failed to open output files")?;
    println!(
        "Output directory: {} ({} leads already recorded)",
        config.output_dir.display(),
        sink.index().len()
    );

    let cse = CseClient::new(&credentials.api_key, config.request_timeout_secs, config.cse_delay_ms)?;
    println!("\n--- Searching Google Scholar ---");
    println!("Query: {}", args.term);
    let items = cse
        .search_pages(&credentials.scholar_cx, &args.term, config.max_search_pages)
        .await;

    if items.is_empty() {
        println!("No results from Google Scholar.");
        return Ok(());
    }
    println!("Collected {} results.", items.len());

    let mut stats = RunStats::default();
    tokio::select! {
        _ = process_items(&resolver, &mut sink, &items, &mut stats) => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\nInterrupted. Rows written so far are kept.");
        }
    }
    stats.print();

    report_llm_usage(&resolver, &config.output_dir);
    Ok(())
}

fn report_llm_usage(resolver: &CandidateResolver, output_dir: &Path) {
    if let Some(reviewer) = resolver.reviewer() {
        let usage = reviewer.usage();
        println!(
            "LLM tokens: {} prompt, {} completion, {} total",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        );
        if let Err(e) = reviewer.append_usage_log(&output_dir.join(USAGE_LOG_FILE)) {
            warn!(error = %e, "Failed to write token usage log");
        }
    }
}

async fn process_items(
    resolver: &CandidateResolver,
    sink: &mut LeadSink,
    items: &[SearchItem],
    stats: &mut RunStats,
) {
    for (i, item) in items.iter().enumerate() {
        stats.results += 1;
        println!("\n--- Result {}/{} ---", i + 1, items.len());
        println!("Title: {}", item.title);

        match resolver.resolve(item).await {
            CandidateOutcome::Rejected(reason) => {
                stats.rejected += 1;
                println!("Skipped: {}", reason);
            }
            CandidateOutcome::Qualified { profile, verdict } => {
                stats.qualified += 1;
                println!("Qualifies ({:?}): {}", verdict, profile.name);
                println!("  Wikipedia: {}", profile.wikipedia_url.url_cell());
                println!("  Homepage:  {}", profile.homepage_url.url_cell());
                println!("  Email:     {}", profile.email.email_cell());

                match sink.append(&profile) {
                    Ok(Some(partition)) => {
                        stats.record(partition);
                        println!("  Written ({})", partition);
                    }
                    Ok(None) => {
                        stats.duplicates += 1;
                        println!("  Already recorded, skipped");
                    }
                    Err(e) => {
                        stats.write_errors += 1;
                        warn!(name = %profile.name, error = %e, "Failed to write lead");
                    }
                }
            }
        }
    }
    info!(results = stats.results, qualified = stats.qualified, "Search pipeline finished");
}

// ============================================================================
// Batch Enrichment
// ============================================================================

async fn run_enrich(args: EnrichArgs) -> Result<()> {
    let config = PipelineConfig {
        affiliations: args.affiliations,
        wiki_delay_ms: args.wiki_delay_ms,
        request_timeout_secs: args.timeout,
        output_dir: args.output,
        llm: args.llm.into_config(),
        ..Default::default()
    };
    let matcher = NameMatcher::new(load_vocabulary(args.vocabulary.as_deref())?);
    let timeout = config.request_timeout_secs;

    let wikipedia = WikipediaResolver::new(matcher.clone(), timeout)?
        .with_delay_ms(config.wiki_delay_ms)
        .with_affiliations(config.affiliations.clone())
        .with_limits(config.validate_top, config.max_augmented_queries);
    let reviewer = config
        .llm
        .clone()
        .map(|llm| ArticleReviewer::new(llm, timeout))
        .transpose()?;
    let resolver = CandidateResolver::new(
        config.policy,
        HomepageResolver::new(ProfileFetch::Disabled, String::new(), Vec::new(), timeout)?,
        wikipedia,
        EmailResolver::new(matcher, config.max_crawl_pages, timeout)?,
        reviewer,
    );

    let mut sink = if args.force {
        LeadSink::open_unindexed(&config.output_dir)
    } else {
        LeadSink::open(&config.output_dir)
    }
    .context("Failed to open output files")?;

    let options = BatchOptions {
        max_entries: args.max_entries,
        force: args.force,
    };
    println!("Enriching {} into {}", args.input.display(), config.output_dir.display());

    let stats = tokio::select! {
        stats = enrich_csv(&resolver, &args.input, &mut sink, options) => {
            Some(stats.with_context(|| format!("Failed to enrich {}", args.input.display()))?)
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nInterrupted. Rows written so far are kept.");
            None
        }
    };

    if let Some(stats) = stats {
        println!("\n=== Summary ===");
        println!("Rows read:             {}", stats.read);
        println!("Already processed:     {}", stats.already_processed);
        println!("Repeated in input:     {}", stats.repeated);
        println!("Without a name:        {}", stats.unknown);
        println!("Enriched:              {}", stats.enriched);
        println!("Written:               {}", stats.written);
        println!("Duplicates skipped:    {}", stats.duplicates);
        if stats.write_errors > 0 {
            println!("Write errors:          {}", stats.write_errors);
        }
    }

    report_llm_usage(&resolver, &config.output_dir);
    Ok(())
}

// ============================================================================
// Single-purpose commands
// ============================================================================

fn run_dedup(files: Vec<PathBuf>, output: &Path) -> Result<()> {
    let files = if files.is_empty() { output_paths(output) } else { files };

    let mut total = 0;
    for path in &files {
        if !path.exists() {
            println!("{} does not exist, skipping", path.display());
            continue;
        }
        let removed = dedup_file(path).with_context(|| format!("Failed to deduplicate {}", path.display()))?;
        println!("{}: removed {} duplicates", path.display(), removed);
        total += removed;
    }
    println!("Total duplicates removed: {}", total);
    Ok(())
}

async fn run_wiki(name: &str, vocabulary: Option<&Path>, affiliations: Vec<String>) -> Result<()> {
    let matcher = NameMatcher::new(load_vocabulary(vocabulary)?);
    let defaults = PipelineConfig::default();
    let resolver = WikipediaResolver::new(matcher, defaults.request_timeout_secs)?
        .with_delay_ms(defaults.wiki_delay_ms)
        .with_affiliations(affiliations)
        .with_limits(defaults.validate_top, defaults.max_augmented_queries);

    let resolution = resolver.resolve(name).await;
    let Some(url) = resolution.found() else {
        println!("No Wikipedia page found for {}", name);
        return Ok(());
    };
    println!("Wikipedia: {}", url);

    match resolver.fetch_digest(url).await {
        Ok(digest) => {
            if !digest.extract.is_empty() {
                println!("\n{}", digest.extract);
            }
            if !digest.warnings.is_empty() {
                println!("\nMaintenance templates: {}", digest.warnings.join(", "));
            }
        }
        Err(e) => warn!(url = url, error = %e, "Failed to fetch article"),
    }
    Ok(())
}

async fn run_email(
    url: &str,
    person: &str,
    max_crawl_pages: usize,
    api_key: Option<String>,
    general_cx: Option<String>,
) -> Result<()> {
    let defaults = PipelineConfig::default();
    let mut resolver = EmailResolver::new(NameMatcher::default(), max_crawl_pages, defaults.request_timeout_secs)?
        .with_affiliations(defaults.affiliations);

    if let (Some(key), Some(cx)) = (api_key.filter(|k| !k.is_empty()), general_cx.filter(|c| !c.is_empty())) {
        let cse = CseClient::new(&key, defaults.request_timeout_secs, defaults.cse_delay_ms)?;
        resolver = resolver.with_general_search(cse, &cx);
    }

    let resolution = resolver.resolve(person, Some(url)).await;
    println!("Email: {}", resolution.email_cell());
    Ok(())
}

fn handle_cookies(action: CookieAction) -> Result<()> {
    let manager = CookieManager::new()?;

    match action {
        CookieAction::Clear => {
            manager.clear()?;
            println!("Cookies cleared.");
        }
        CookieAction::Path => {
            println!("Cookie file: {}", manager.path().display());
        }
        CookieAction::Import { file } => {
            let count = manager
                .import(&file)
                .with_context(|| format!("Failed to import cookies from {}", file.display()))?;
            println!("Imported {} Google cookies into {}", count, manager.path().display());
        }
    }

    Ok(())
}
