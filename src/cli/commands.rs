//! CLI command definitions for anchorlab.
//!
//! This module provides the command-line interface for running pollution
//! experiments, inspecting results, and exporting them.

use std::path::Path;

use clap::Parser;
use uuid::Uuid;

use crate::classifier::Classifier;
use crate::experiment::{
    ExperimentOrchestrator, ExperimentPlan, RunSummary, RunnerSettings, DEFAULT_DATABASE_URL,
    DEFAULT_MASTER_SEED,
};
use crate::export::export_experiment;
use crate::generator::{GeneratedPrompt, PromptGenerator};
use crate::runner::{ConversationRunner, HttpChatClient, RunOptions, Transcript};
use crate::scenario::{AdversarialVariant, ContextPlacement, Difficulty, Scenario, ToolSetKind};
use crate::storage::{Database, MigrationRunner};
use crate::tools::ToolRegistry;

/// Default model to run against.
const DEFAULT_MODEL: &str = "qwen2.5:7b";

const DEFAULT_POLLUTION_LEVELS: &str = "0,20,40,60,80,100";
const DEFAULT_DIFFICULTIES: &str = "neutral,counterfactual,adversarial";
const DEFAULT_TOOL_SETS: &str = "base,expanded";
const DEFAULT_PLACEMENTS: &str = "user,system";
const DEFAULT_VARIANTS: &str = "with_timestamp,without_timestamp";

/// Tool-calling degradation harness for LLMs under context pollution.
#[derive(Parser)]
#[command(name = "anchorlab")]
#[command(about = "Measure how context pollution degrades LLM tool calling")]
#[command(version)]
#[command(
    long_about = "anchorlab injects growing amounts of stale financial context into a \
stock-price question, runs it against an OpenAI-compatible endpoint with mock tools, and \
classifies every answer as STC, FNC, FWT, or FH.\n\nExample usage:\n  anchorlab run \
--models qwen2.5:7b --iterations 10 --name pollution-sweep"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the full dimension product as one experiment.
    #[command(alias = "r")]
    Run(RunArgs),

    /// Run one scenario cell once and print the transcript and verdict.
    ///
    /// Nothing is persisted; this is the quick smoke-test path for checking
    /// that the endpoint, tools, and classifier behave before a full sweep.
    #[command(alias = "s")]
    Single(SingleArgs),

    /// List recent experiments, or per-cell metrics for one experiment.
    #[command(alias = "ls")]
    Results(ResultsArgs),

    /// Export one experiment's executions and evaluations to CSV.
    Export(ExportArgs),

    /// Apply the database schema and seed the tool catalog.
    Migrate(MigrateArgs),

    /// Print the effective runner configuration.
    #[command(alias = "cfg")]
    Config(ConfigArgs),
}

/// Arguments for `anchorlab run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Experiment name.
    #[arg(short = 'n', long, default_value = "pollution-sweep")]
    pub name: String,

    /// Models to test (comma-separated).
    #[arg(short = 'm', long, default_value = DEFAULT_MODEL)]
    pub models: String,

    /// Pollution levels to cross (comma-separated percentages).
    #[arg(long, default_value = DEFAULT_POLLUTION_LEVELS)]
    pub pollution_levels: String,

    /// Difficulties to cross (comma-separated).
    #[arg(long, default_value = DEFAULT_DIFFICULTIES)]
    pub difficulties: String,

    /// Tool sets to cross (comma-separated).
    #[arg(long, default_value = DEFAULT_TOOL_SETS)]
    pub tool_sets: String,

    /// Context placements to cross (comma-separated).
    #[arg(long, default_value = DEFAULT_PLACEMENTS)]
    pub placements: String,

    /// Adversarial variants to cross (comma-separated; adversarial cells only).
    #[arg(long, default_value = DEFAULT_VARIANTS)]
    pub variants: String,

    /// Iterations per cell.
    #[arg(short = 'i', long, default_value = "10")]
    pub iterations: u32,

    /// Master seed; every execution's sub-seed derives from it.
    #[arg(long, default_value_t = DEFAULT_MASTER_SEED)]
    pub seed: u64,

    /// Hypothesis code recorded with the experiment.
    #[arg(long)]
    pub hypothesis: Option<String>,

    /// Free-form experiment description.
    #[arg(long)]
    pub description: Option<String>,

    /// Count executions without calling the model.
    #[arg(long)]
    pub dry_run: bool,

    /// Run without writing anything to the database.
    #[arg(long)]
    pub no_db: bool,

    /// Maximum in-flight model calls.
    #[arg(long, default_value = "1")]
    pub concurrency: usize,

    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Chat-completions endpoint base URL.
    #[arg(long, env = "ANCHORLAB_API_BASE")]
    pub api_base: Option<String>,

    /// Bearer token for the endpoint.
    #[arg(long, env = "ANCHORLAB_API_KEY")]
    pub api_key: Option<String>,
}

/// Arguments for `anchorlab single`.
#[derive(Parser, Debug)]
pub struct SingleArgs {
    /// Model to run against.
    #[arg(short = 'm', long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Pollution level (0, 20, 40, 60, 80, 100).
    #[arg(short = 'p', long, default_value = "80")]
    pub pollution: u8,

    /// Difficulty (neutral, counterfactual, adversarial).
    #[arg(short = 'd', long, default_value = "adversarial")]
    pub difficulty: String,

    /// Tool set (base, expanded).
    #[arg(long, default_value = "base")]
    pub tool_set: String,

    /// Context placement (user, system).
    #[arg(long, default_value = "user")]
    pub placement: String,

    /// Adversarial variant (with_timestamp, without_timestamp).
    /// Defaults to with_timestamp when the difficulty is adversarial.
    #[arg(long)]
    pub variant: Option<String>,

    /// Generation seed.
    #[arg(long, default_value_t = DEFAULT_MASTER_SEED)]
    pub seed: u64,

    /// Chat-completions endpoint base URL.
    #[arg(long, env = "ANCHORLAB_API_BASE")]
    pub api_base: Option<String>,

    /// Bearer token for the endpoint.
    #[arg(long, env = "ANCHORLAB_API_KEY")]
    pub api_key: Option<String>,
}

/// Arguments for `anchorlab results`.
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    /// Experiment id; when set, shows per-cell metrics instead of the list.
    #[arg(short = 'e', long)]
    pub experiment: Option<String>,

    /// Maximum experiments to list.
    #[arg(long, default_value = "20")]
    pub limit: i64,

    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,
}

/// Arguments for `anchorlab export`.
#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Experiment id to export.
    #[arg(short = 'e', long)]
    pub experiment: String,

    /// Output CSV path.
    #[arg(short = 'o', long, default_value = "./results.csv")]
    pub output: String,

    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,
}

/// Arguments for `anchorlab migrate`.
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Drop all tables and views before migrating. Destroys all data.
    #[arg(long)]
    pub reset: bool,
}

/// Arguments for `anchorlab config`.
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before
/// running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_run_command(args).await,
        Commands::Single(args) => run_single_command(args).await,
        Commands::Results(args) => run_results_command(args).await,
        Commands::Export(args) => run_export_command(args).await,
        Commands::Migrate(args) => run_migrate_command(args).await,
        Commands::Config(args) => run_config_command(args),
    }
}

// ============================================================================
// Run Command
// ============================================================================

async fn run_run_command(args: RunArgs) -> anyhow::Result<()> {
    let mut plan = ExperimentPlan::from_env(&args.name)?
        .with_models(parse_list(&args.models))
        .with_pollution_levels(parse_pollution_levels(&args.pollution_levels)?)
        .with_difficulties(parse_dimension(&args.difficulties, Difficulty::parse)?)
        .with_tool_sets(parse_dimension(&args.tool_sets, ToolSetKind::parse)?)
        .with_placements(parse_dimension(&args.placements, ContextPlacement::parse)?)
        .with_variants(parse_dimension(&args.variants, AdversarialVariant::parse)?)
        .with_iterations(args.iterations)
        .with_master_seed(args.seed)
        .with_concurrency(args.concurrency)
        .with_database_url(args.database_url);

    if let Some(hypothesis) = args.hypothesis {
        plan = plan.with_hypothesis(hypothesis);
    }
    if let Some(description) = args.description {
        plan = plan.with_description(description);
    }
    if let Some(api_base) = args.api_base {
        plan.runner.api_base = api_base;
    }
    if let Some(api_key) = args.api_key {
        plan.runner.api_key = Some(api_key);
    }
    if args.dry_run {
        plan = plan.as_dry_run();
    }
    if args.no_db {
        plan = plan.without_persistence();
    }

    let orchestrator = ExperimentOrchestrator::new(plan).await?;
    let summary = orchestrator.run_all().await?;

    if summary.dry_run {
        println!(
            "Dry run: {} cells × {} models × {} iterations = {} executions",
            summary.cell_count,
            orchestrator.plan().models.len(),
            orchestrator.plan().iterations_per_cell,
            summary.total_executions
        );
        return Ok(());
    }

    print_run_summary(&summary);
    Ok(())
}

fn print_run_summary(summary: &RunSummary) {
    println!();
    println!("=== Run Summary ===");
    if let Some(id) = summary.experiment_id {
        println!("Experiment: {id}");
    }
    println!(
        "Cells: {}    Executions: {}",
        summary.cell_count, summary.total_executions
    );
    println!();
    println!(
        "{:<24} {:<16} {:>4} {:>5} {:>5} {:>5} {:>5} {:>5} {:>8} {:>9}",
        "model", "difficulty", "poll", "STC", "FNC", "FWT", "FH", "fail", "success", "avg ms"
    );
    for ((model, difficulty, pollution), stats) in summary.stats.rows() {
        println!(
            "{:<24} {:<16} {:>4} {:>5} {:>5} {:>5} {:>5} {:>5} {:>7.1}% {:>9.0}",
            model,
            difficulty,
            pollution,
            stats.stc,
            stats.fnc,
            stats.fwt,
            stats.fh,
            stats.failed,
            stats.success_rate() * 100.0,
            stats.avg_latency_ms()
        );
    }
    let totals = summary.stats.totals();
    println!();
    println!(
        "Overall: {}/{} STC ({:.1}% of completed), {} failed",
        totals.stc,
        totals.completed(),
        totals.success_rate() * 100.0,
        totals.failed
    );
}

// ============================================================================
// Single Command
// ============================================================================

async fn run_single_command(args: SingleArgs) -> anyhow::Result<()> {
    let difficulty = Difficulty::parse(&args.difficulty)?;
    let tool_set = ToolSetKind::parse(&args.tool_set)?;
    let placement = ContextPlacement::parse(&args.placement)?;
    let variant = match (&args.variant, difficulty) {
        (Some(raw), _) => Some(AdversarialVariant::parse(raw)?),
        (None, Difficulty::Adversarial) => Some(AdversarialVariant::WithTimestamp),
        (None, _) => None,
    };

    let scenario = Scenario::new(args.pollution, difficulty, tool_set, placement, variant)?;
    let prompt = PromptGenerator::new().generate(&scenario, args.seed)?;

    let mut settings = RunnerSettings::from_env()?;
    if let Some(api_base) = args.api_base {
        settings.api_base = api_base;
    }
    if let Some(api_key) = args.api_key {
        settings.api_key = Some(api_key);
    }
    settings.validate()?;

    let client = HttpChatClient::new(
        settings.api_base.clone(),
        settings.api_key.clone(),
        settings.request_timeout_secs,
    );
    let registry = ToolRegistry::for_set(scenario.tool_set());
    let options = RunOptions::new(&args.model)
        .with_seed(args.seed)
        .with_max_tool_calls(settings.max_tool_calls)
        .with_retries(settings.max_retries, settings.retry_backoff_ms);

    let runner = ConversationRunner::new(&client, &registry, options);
    let transcript = runner
        .run(&prompt.system_message, &prompt.user_message)
        .await?;

    let classifier = Classifier::new()?;
    let evaluation = classifier.classify(&transcript, prompt.expected_value, prompt.trap_value);

    print_single_report(&scenario, &prompt, &transcript);

    println!();
    println!("=== Evaluation ===");
    println!("  classification:  {}", evaluation.classification);
    println!("  called any tool: {}", evaluation.called_any_tool);
    println!("  called target:   {}", evaluation.called_target_tool);
    println!("  used result:     {}", evaluation.used_tool_result);
    println!("  anchored:        {}", evaluation.anchored_on_context);
    match evaluation.extracted_value {
        Some(value) => println!("  extracted:       {value:.2}"),
        None => println!("  extracted:       (none)"),
    }
    println!("  candidates:      {}", evaluation.candidate_count);
    println!("  confidence:      {:.2}", evaluation.confidence_score);
    println!(
        "  needs review:    {}",
        if evaluation.needs_review() { "yes" } else { "no" }
    );
    println!("  reasoning:       {}", evaluation.reasoning);

    Ok(())
}

fn print_single_report(scenario: &Scenario, prompt: &GeneratedPrompt, transcript: &Transcript) {
    println!("=== Scenario ===");
    println!("  cell:        {}", scenario.cell_label());
    println!("  seed:        {}", prompt.seed);
    println!("  prompt hash: {}", prompt.prompt_hash);
    println!("  expected:    {:.2}", prompt.expected_value);
    println!("  trap:        {:.2}", prompt.trap_value);
    println!("  blocks:      {}", prompt.block_count);

    println!();
    println!("=== Transcript ===");
    if transcript.tool_calls.is_empty() {
        println!("  (no tool calls)");
    }
    for call in &transcript.tool_calls {
        let status = if call.execution_success { "ok" } else { "error" };
        println!(
            "  {}. {}({}) -> {}",
            call.sequence_order, call.tool_name, call.arguments, status
        );
    }
    if transcript.budget_exhausted {
        println!("  (tool-call budget exhausted)");
    }
    println!();
    println!("  final: {}", transcript.final_text);
    println!(
        "  latency: {} ms, rounds: {}, tokens: {} in / {} out",
        transcript.latency_ms, transcript.rounds, transcript.input_tokens, transcript.output_tokens
    );
}

// ============================================================================
// Results Command
// ============================================================================

async fn run_results_command(args: ResultsArgs) -> anyhow::Result<()> {
    let database = Database::connect(&args.database_url).await?;

    match args.experiment {
        Some(raw) => {
            let id = Uuid::parse_str(&raw)?;
            let rows = database.cell_metrics(id).await?;
            if rows.is_empty() {
                println!("No completed executions for experiment {id}.");
                return Ok(());
            }

            println!(
                "{:<24} {:>4} {:<16} {:<9} {:<7} {:<18} {:>5} {:>8} {:>8} {:>9}",
                "model",
                "poll",
                "difficulty",
                "tools",
                "place",
                "variant",
                "n",
                "success",
                "anchor",
                "avg ms"
            );
            for row in rows {
                println!(
                    "{:<24} {:>4} {:<16} {:<9} {:<7} {:<18} {:>5} {:>7.1}% {:>7.1}% {:>9.0}",
                    row.model,
                    row.pollution_level,
                    row.difficulty,
                    row.tool_set,
                    row.context_placement,
                    row.adversarial_variant.as_deref().unwrap_or("-"),
                    row.n,
                    row.success_rate * 100.0,
                    row.anchor_rate * 100.0,
                    row.avg_latency_ms.unwrap_or(0.0)
                );
            }
        }
        None => {
            let experiments = database.list_experiments(args.limit).await?;
            if experiments.is_empty() {
                println!("No experiments recorded.");
                return Ok(());
            }

            println!(
                "{:<36} {:<24} {:<10} {:>6} {:>6} {:<16}",
                "id", "name", "status", "execs", "iters", "created"
            );
            for experiment in experiments {
                println!(
                    "{:<36} {:<24} {:<10} {:>6} {:>6} {:<16}",
                    experiment.id,
                    experiment.name,
                    experiment.status,
                    experiment.execution_count,
                    experiment.iterations_per_cell,
                    experiment.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }

    Ok(())
}

// ============================================================================
// Export Command
// ============================================================================

async fn run_export_command(args: ExportArgs) -> anyhow::Result<()> {
    let id = Uuid::parse_str(&args.experiment)?;
    let database = Database::connect(&args.database_url).await?;
    let rows = export_experiment(&database, id, Path::new(&args.output)).await?;
    println!("✓ Exported {} rows to {}", rows, args.output);
    Ok(())
}

// ============================================================================
// Migrate Command
// ============================================================================

async fn run_migrate_command(args: MigrateArgs) -> anyhow::Result<()> {
    let database = Database::connect(&args.database_url).await?;
    let runner = MigrationRunner::new(database.pool().clone());

    if args.reset {
        runner.reset_database().await?;
        println!("✓ Dropped all tables and views");
    }

    database.run_migrations().await?;
    database.seed_catalog().await?;

    let applied = runner.list_applied_migrations().await?;

    println!("✓ Schema up to date ({} migrations applied)", applied.len());
    println!("✓ Tool catalog and prompt template seeded");
    Ok(())
}

// ============================================================================
// Config Command
// ============================================================================

fn run_config_command(args: ConfigArgs) -> anyhow::Result<()> {
    let settings = RunnerSettings::from_env()?;

    println!("=== Effective Configuration ===");
    println!("api_base:               {}", settings.api_base);
    println!(
        "api_key:                {}",
        if settings.api_key.is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!("request_timeout_secs:   {}", settings.request_timeout_secs);
    println!("max_retries:            {}", settings.max_retries);
    println!("retry_backoff_ms:       {}", settings.retry_backoff_ms);
    println!("max_tool_calls:         {}", settings.max_tool_calls);
    println!("context_window_tokens:  {}", settings.context_window_tokens);
    println!("temperature:            {}", settings.temperature);
    println!("database_url:           {}", args.database_url);
    Ok(())
}

// ============================================================================
// Dimension Parsing
// ============================================================================

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_pollution_levels(raw: &str) -> anyhow::Result<Vec<u8>> {
    parse_list(raw)
        .iter()
        .map(|item| {
            item.parse::<u8>()
                .map_err(|e| anyhow::anyhow!("invalid pollution level '{item}': {e}"))
        })
        .collect()
}

fn parse_dimension<T, E>(raw: &str, parse: fn(&str) -> Result<T, E>) -> Result<Vec<T>, E> {
    parse_list(raw).iter().map(|item| parse(item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        // Verify CLI definition is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_command_defaults() {
        let args = vec!["anchorlab", "run"];
        let cli = Cli::try_parse_from(args).expect("should parse");

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.name, "pollution-sweep");
                assert_eq!(args.models, DEFAULT_MODEL);
                assert_eq!(args.iterations, 10);
                assert_eq!(args.seed, DEFAULT_MASTER_SEED);
                assert_eq!(args.concurrency, 1);
                assert!(!args.dry_run);
                assert!(!args.no_db);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_command_with_all_options() {
        let args = vec![
            "anchorlab",
            "run",
            "-n",
            "h1-placement",
            "-m",
            "qwen2.5:7b,llama3.1:8b",
            "--pollution-levels",
            "0,100",
            "--difficulties",
            "adversarial",
            "--variants",
            "with_timestamp",
            "-i",
            "5",
            "--seed",
            "7",
            "--dry-run",
            "--no-db",
            "--concurrency",
            "4",
        ];
        let cli = Cli::try_parse_from(args).expect("should parse");

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.name, "h1-placement");
                assert_eq!(parse_list(&args.models).len(), 2);
                assert_eq!(args.iterations, 5);
                assert_eq!(args.seed, 7);
                assert!(args.dry_run);
                assert!(args.no_db);
                assert_eq!(args.concurrency, 4);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_alias() {
        let args = vec!["anchorlab", "r", "-i", "2"];
        let cli = Cli::try_parse_from(args).expect("should parse with alias");

        match cli.command {
            Commands::Run(args) => assert_eq!(args.iterations, 2),
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_single_command_defaults() {
        let args = vec!["anchorlab", "single"];
        let cli = Cli::try_parse_from(args).expect("should parse");

        match cli.command {
            Commands::Single(args) => {
                assert_eq!(args.model, DEFAULT_MODEL);
                assert_eq!(args.pollution, 80);
                assert_eq!(args.difficulty, "adversarial");
                assert_eq!(args.tool_set, "base");
                assert_eq!(args.placement, "user");
                assert!(args.variant.is_none());
            }
            _ => panic!("Expected Single command"),
        }
    }

    #[test]
    fn test_results_alias_and_experiment_flag() {
        let args = vec![
            "anchorlab",
            "ls",
            "-e",
            "2b1c6f2a-0000-0000-0000-000000000000",
        ];
        let cli = Cli::try_parse_from(args).expect("should parse with alias");

        match cli.command {
            Commands::Results(args) => {
                assert!(args.experiment.is_some());
                assert_eq!(args.limit, 20);
            }
            _ => panic!("Expected Results command"),
        }
    }

    #[test]
    fn test_export_requires_experiment() {
        let args = vec!["anchorlab", "export"];
        assert!(Cli::try_parse_from(args).is_err());

        let args = vec![
            "anchorlab",
            "export",
            "-e",
            "2b1c6f2a-0000-0000-0000-000000000000",
            "-o",
            "./out.csv",
        ];
        let cli = Cli::try_parse_from(args).expect("should parse");
        match cli.command {
            Commands::Export(args) => assert_eq!(args.output, "./out.csv"),
            _ => panic!("Expected Export command"),
        }
    }

    #[test]
    fn test_migrate_reset_flag() {
        let args = vec!["anchorlab", "migrate"];
        let cli = Cli::try_parse_from(args).expect("should parse");
        match cli.command {
            Commands::Migrate(args) => assert!(!args.reset),
            _ => panic!("Expected Migrate command"),
        }

        let args = vec!["anchorlab", "migrate", "--reset"];
        let cli = Cli::try_parse_from(args).expect("should parse");
        match cli.command {
            Commands::Migrate(args) => assert!(args.reset),
            _ => panic!("Expected Migrate command"),
        }
    }

    #[test]
    fn test_parse_list_trims_and_drops_empties() {
        assert_eq!(
            parse_list("qwen2.5:7b, llama3.1:8b ,"),
            vec!["qwen2.5:7b".to_string(), "llama3.1:8b".to_string()]
        );
    }

    #[test]
    fn test_parse_pollution_levels() {
        assert_eq!(parse_pollution_levels("0,20,40").unwrap(), vec![0, 20, 40]);
        assert!(parse_pollution_levels("0,abc").is_err());
    }

    #[test]
    fn test_parse_dimension_lists() {
        let difficulties = parse_dimension(DEFAULT_DIFFICULTIES, Difficulty::parse).unwrap();
        assert_eq!(difficulties.len(), 3);

        let variants = parse_dimension(DEFAULT_VARIANTS, AdversarialVariant::parse).unwrap();
        assert_eq!(variants.len(), 2);

        assert!(parse_dimension("base,weird", ToolSetKind::parse).is_err());
    }
}
