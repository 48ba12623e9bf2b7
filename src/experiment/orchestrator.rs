//! Experiment orchestrator: cell enumeration, seeding, and the run loop.
//!
//! The orchestrator expands an [`ExperimentPlan`] into the Cartesian product
//! of its dimension values, derives a reproducible sub-seed for every
//! (cell, iteration) pair, and drives each execution through generation,
//! the model conversation, classification, and persistence. Any single
//! execution can be replayed from `(plan, cell index, iteration)` alone.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::classifier::{Classification, Classifier, Evaluation};
use crate::error::{ConfigError, ExperimentError};
use crate::generator::PromptGenerator;
use crate::runner::{ChatProvider, ConversationRunner, HttpChatClient, RunOptions};
use crate::scenario::{AdversarialVariant, ContextPlacement, Difficulty, Scenario, ToolSetKind};
use crate::storage::{Database, ExecutionContext, ExperimentRecord, ExperimentStatus};
use crate::tools::ToolRegistry;

use super::config::ExperimentPlan;

/// Rough chars-per-token ratio for the pre-flight size estimate.
/// Conservative for Portuguese text, which tokenizes worse than English.
const CHARS_PER_TOKEN: usize = 3;

/// Tokens reserved for tool results and the model's replies.
const RESPONSE_ALLOWANCE_TOKENS: usize = 1_024;

/// One dimension combination to be run `iterations_per_cell` times
/// per model.
#[derive(Debug, Clone)]
pub struct ExperimentCell {
    /// Position in enumeration order; part of the sub-seed derivation.
    pub index: usize,
    pub scenario: Scenario,
}

/// Expands the plan's dimension sets into validated cells.
///
/// Adversarial difficulty is crossed with every configured variant; other
/// difficulties get exactly one cell with no variant. Enumeration order is
/// fixed (pollution, difficulty, tool set, placement, variant) so cell
/// indices are stable for a given plan.
pub fn enumerate_cells(plan: &ExperimentPlan) -> Result<Vec<ExperimentCell>, ConfigError> {
    let mut scenarios = Vec::new();

    for &level in &plan.pollution_levels {
        for &difficulty in &plan.difficulties {
            for &tool_set in &plan.tool_sets {
                for &placement in &plan.placements {
                    if difficulty == Difficulty::Adversarial {
                        for &variant in &plan.variants {
                            scenarios.push(Scenario::new(
                                level,
                                difficulty,
                                tool_set,
                                placement,
                                Some(variant),
                            )?);
                        }
                    } else {
                        scenarios.push(Scenario::new(level, difficulty, tool_set, placement, None)?);
                    }
                }
            }
        }
    }

    Ok(scenarios
        .into_iter()
        .enumerate()
        .map(|(index, scenario)| ExperimentCell { index, scenario })
        .collect())
}

/// Derives the seed for one execution from the master seed, the cell's
/// position, and the iteration number.
///
/// The model is deliberately not an input: every model sees byte-identical
/// prompts for the same cell and iteration, so cross-model comparisons are
/// apples to apples.
pub fn derive_seed(master_seed: u64, cell_index: usize, iteration: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(master_seed.to_be_bytes());
    hasher.update((cell_index as u64).to_be_bytes());
    hasher.update(iteration.to_be_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

fn estimate_tokens(chars: usize) -> usize {
    (chars + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN
}

/// Per-(model, difficulty, pollution) verdict counts.
#[derive(Debug, Clone, Default)]
pub struct CellStats {
    pub stc: u64,
    pub fnc: u64,
    pub fwt: u64,
    pub fh: u64,
    /// Executions that never produced a transcript.
    pub failed: u64,
    total_latency_ms: u64,
}

impl CellStats {
    fn record_verdict(&mut self, classification: Classification, latency_ms: u64) {
        match classification {
            Classification::Stc => self.stc += 1,
            Classification::Fnc => self.fnc += 1,
            Classification::Fwt => self.fwt += 1,
            Classification::Fh => self.fh += 1,
        }
        self.total_latency_ms += latency_ms;
    }

    fn record_failure(&mut self) {
        self.failed += 1;
    }

    fn absorb(&mut self, other: &CellStats) {
        self.stc += other.stc;
        self.fnc += other.fnc;
        self.fwt += other.fwt;
        self.fh += other.fh;
        self.failed += other.failed;
        self.total_latency_ms += other.total_latency_ms;
    }

    /// Executions that produced a transcript and a verdict.
    pub fn completed(&self) -> u64 {
        self.stc + self.fnc + self.fwt + self.fh
    }

    pub fn total(&self) -> u64 {
        self.completed() + self.failed
    }

    /// Share of completed executions classified STC.
    pub fn success_rate(&self) -> f64 {
        if self.completed() == 0 {
            0.0
        } else {
            self.stc as f64 / self.completed() as f64
        }
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.completed() == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.completed() as f64
        }
    }
}

/// Statistics for a whole run, grouped for the run-end summary table.
///
/// Keys are `(model, difficulty, pollution_level)`; the map is ordered so
/// the summary renders deterministically.
#[derive(Debug, Clone, Default)]
pub struct ExperimentStats {
    groups: BTreeMap<(String, String, u8), CellStats>,
}

impl ExperimentStats {
    fn record(&mut self, outcome: &ExecutionOutcome) {
        let key = (
            outcome.model.clone(),
            outcome.difficulty.as_str().to_string(),
            outcome.pollution_level,
        );
        let stats = self.groups.entry(key).or_default();
        match outcome.verdict {
            Some(classification) => stats.record_verdict(classification, outcome.latency_ms),
            None => stats.record_failure(),
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = (&(String, String, u8), &CellStats)> {
        self.groups.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Aggregate over every group.
    pub fn totals(&self) -> CellStats {
        let mut totals = CellStats::default();
        for stats in self.groups.values() {
            totals.absorb(stats);
        }
        totals
    }
}

/// What one execution contributed to the run statistics.
#[derive(Debug)]
struct ExecutionOutcome {
    model: String,
    difficulty: Difficulty,
    pollution_level: u8,
    /// None when the execution failed before classification.
    verdict: Option<Classification>,
    latency_ms: u64,
}

impl ExecutionOutcome {
    fn classified(model: &str, scenario: &Scenario, evaluation: &Evaluation, latency_ms: u64) -> Self {
        Self {
            model: model.to_string(),
            difficulty: scenario.difficulty(),
            pollution_level: scenario.pollution_level(),
            verdict: Some(evaluation.classification),
            latency_ms,
        }
    }

    fn failed(model: &str, scenario: &Scenario) -> Self {
        Self {
            model: model.to_string(),
            difficulty: scenario.difficulty(),
            pollution_level: scenario.pollution_level(),
            verdict: None,
            latency_ms: 0,
        }
    }
}

/// Result of [`ExperimentOrchestrator::run_all`].
#[derive(Debug)]
pub struct RunSummary {
    /// Set when the run was persisted.
    pub experiment_id: Option<Uuid>,
    pub cell_count: usize,
    /// Cells × iterations × models.
    pub total_executions: u64,
    pub dry_run: bool,
    pub stats: ExperimentStats,
}

/// Coordinates a full experiment run.
pub struct ExperimentOrchestrator {
    plan: ExperimentPlan,
    provider: Arc<dyn ChatProvider>,
    database: Option<Arc<Database>>,
    generator: PromptGenerator,
    classifier: Classifier,
}

impl ExperimentOrchestrator {
    /// Creates an orchestrator with an HTTP client built from the plan's
    /// runner settings, connecting to the database when the plan persists.
    ///
    /// Migrations and catalog seeding run as part of the connection so a
    /// fresh database works without a separate `migrate` step.
    pub async fn new(plan: ExperimentPlan) -> Result<Self, ExperimentError> {
        plan.validate()?;
        let classifier = Classifier::new()?;

        let provider: Arc<dyn ChatProvider> = Arc::new(HttpChatClient::new(
            plan.runner.api_base.clone(),
            plan.runner.api_key.clone(),
            plan.runner.request_timeout_secs,
        ));

        let database = if plan.persist && !plan.dry_run {
            let db = Database::connect(&plan.database_url).await?;
            db.run_migrations().await?;
            db.seed_catalog().await?;
            Some(Arc::new(db))
        } else {
            None
        };

        Ok(Self {
            plan,
            provider,
            database,
            generator: PromptGenerator::new(),
            classifier,
        })
    }

    /// Creates an orchestrator around an existing provider, without a
    /// database. Nothing is persisted.
    pub fn with_provider(
        plan: ExperimentPlan,
        provider: Arc<dyn ChatProvider>,
    ) -> Result<Self, ExperimentError> {
        plan.validate()?;
        let classifier = Classifier::new()?;

        Ok(Self {
            plan,
            provider,
            database: None,
            generator: PromptGenerator::new(),
            classifier,
        })
    }

    pub fn plan(&self) -> &ExperimentPlan {
        &self.plan
    }

    /// Checks that the endpoint's context window can hold the worst-case
    /// rendered prompt plus tool schemas and a reply allowance.
    ///
    /// Endpoints silently truncate over-length prompts, which would make
    /// high-pollution cells behave like low-pollution ones.
    pub fn verify_context_window(&self) -> Result<(), ExperimentError> {
        let max_level = self.plan.pollution_levels.iter().copied().max().unwrap_or(0);

        let (difficulty, variant) = if self.plan.difficulties.contains(&Difficulty::Adversarial) {
            (
                Difficulty::Adversarial,
                Some(AdversarialVariant::WithTimestamp),
            )
        } else if self.plan.difficulties.contains(&Difficulty::Counterfactual) {
            (Difficulty::Counterfactual, None)
        } else {
            (Difficulty::Neutral, None)
        };

        let tool_set = if self.plan.tool_sets.contains(&ToolSetKind::Expanded) {
            ToolSetKind::Expanded
        } else {
            ToolSetKind::Base
        };

        let scenario = Scenario::new(max_level, difficulty, tool_set, ContextPlacement::User, variant)?;
        let prompt = self.generator.generate(&scenario, 0)?;
        let prompt_chars = prompt.system_message.len() + prompt.user_message.len();

        let registry = ToolRegistry::for_set(tool_set);
        let schema_chars: usize = registry
            .schemas()
            .iter()
            .map(|schema| schema.to_string().len())
            .sum();

        let required = estimate_tokens(prompt_chars + schema_chars) + RESPONSE_ALLOWANCE_TOKENS;
        let configured = self.plan.runner.context_window_tokens;

        if required > configured {
            return Err(ConfigError::ContextWindowExceeded {
                required,
                configured,
            }
            .into());
        }

        debug!(required, configured, "Context window pre-flight passed");
        Ok(())
    }

    /// Runs the whole plan: every model × cell × iteration.
    ///
    /// Individual execution failures are recorded and counted, never fatal
    /// to the rest of the run. In dry-run mode this only reports how many
    /// executions the plan would perform.
    pub async fn run_all(&self) -> Result<RunSummary, ExperimentError> {
        self.plan.validate()?;
        self.verify_context_window()?;

        let cells = enumerate_cells(&self.plan)?;
        if cells.is_empty() || self.plan.models.is_empty() {
            return Err(ExperimentError::EmptyPlan);
        }

        let total_executions =
            cells.len() as u64 * self.plan.iterations_per_cell as u64 * self.plan.models.len() as u64;

        if self.plan.dry_run {
            info!(
                cells = cells.len(),
                models = self.plan.models.len(),
                iterations = self.plan.iterations_per_cell,
                total_executions,
                "Dry run: no model calls will be made"
            );
            return Ok(RunSummary {
                experiment_id: None,
                cell_count: cells.len(),
                total_executions,
                dry_run: true,
                stats: ExperimentStats::default(),
            });
        }

        let experiment_id = self.register_experiment().await?;
        let model_ids = self.register_models().await?;

        info!(
            experiment = %self.plan.name,
            cells = cells.len(),
            models = self.plan.models.len(),
            total_executions,
            concurrency = self.plan.concurrency,
            "Starting experiment run"
        );

        let semaphore = Arc::new(Semaphore::new(self.plan.concurrency));
        let mut units = Vec::with_capacity(total_executions as usize);
        for model in &self.plan.models {
            for cell in &cells {
                for iteration in 1..=self.plan.iterations_per_cell {
                    units.push((model.as_str(), cell, iteration));
                }
            }
        }

        let futures: Vec<_> = units
            .into_iter()
            .map(|(model, cell, iteration)| {
                let semaphore = Arc::clone(&semaphore);
                let model_id = model_ids.get(model).copied();
                async move {
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        // Closed only on shutdown; count the unit as failed.
                        Err(_) => return ExecutionOutcome::failed(model, &cell.scenario),
                    };
                    self.run_one(model, cell, iteration, experiment_id, model_id)
                        .await
                }
            })
            .collect();

        let outcomes = futures::future::join_all(futures).await;

        let mut stats = ExperimentStats::default();
        for outcome in &outcomes {
            stats.record(outcome);
        }

        let totals = stats.totals();
        if let (Some(db), Some(id)) = (&self.database, experiment_id) {
            let status = if totals.completed() == 0 && totals.failed > 0 {
                ExperimentStatus::Failed
            } else {
                ExperimentStatus::Completed
            };
            db.finish_experiment(id, status).await?;
        }

        info!(
            completed = totals.completed(),
            failed = totals.failed,
            success_rate = totals.success_rate(),
            "Experiment run finished"
        );

        Ok(RunSummary {
            experiment_id,
            cell_count: cells.len(),
            total_executions,
            dry_run: false,
            stats,
        })
    }

    async fn register_experiment(&self) -> Result<Option<Uuid>, ExperimentError> {
        let Some(db) = &self.database else {
            return Ok(None);
        };

        let mut record = ExperimentRecord::new(
            &self.plan.name,
            self.plan.master_seed,
            self.plan.iterations_per_cell,
        )
        .with_config(self.plan.snapshot());
        if let Some(hypothesis) = &self.plan.hypothesis {
            record = record.with_hypothesis(hypothesis);
        }
        if let Some(description) = &self.plan.description {
            record = record.with_description(description);
        }

        db.create_experiment(&record).await?;
        db.start_experiment(record.id).await?;
        Ok(Some(record.id))
    }

    async fn register_models(&self) -> Result<HashMap<String, Uuid>, ExperimentError> {
        let mut model_ids = HashMap::new();
        if let Some(db) = &self.database {
            for model in &self.plan.models {
                let id = db.get_or_create_model(model).await?;
                model_ids.insert(model.clone(), id);
            }
        }
        Ok(model_ids)
    }

    /// Runs one (model, cell, iteration) unit end to end.
    ///
    /// Never returns an error: failures are logged, persisted where
    /// possible, and folded into the statistics as failed executions.
    async fn run_one(
        &self,
        model: &str,
        cell: &ExperimentCell,
        iteration: u32,
        experiment_id: Option<Uuid>,
        model_id: Option<Uuid>,
    ) -> ExecutionOutcome {
        let seed = derive_seed(self.plan.master_seed, cell.index, iteration);

        let prompt = match self.generator.generate(&cell.scenario, seed) {
            Ok(prompt) => prompt,
            Err(e) => {
                error!(
                    cell = %cell.scenario.cell_label(),
                    iteration,
                    "Prompt generation failed: {e}"
                );
                return ExecutionOutcome::failed(model, &cell.scenario);
            }
        };

        let options = RunOptions {
            model: model.to_string(),
            temperature: self.plan.runner.temperature,
            seed: Some(seed),
            max_tool_calls: self.plan.runner.max_tool_calls,
            max_retries: self.plan.runner.max_retries,
            retry_backoff_ms: self.plan.runner.retry_backoff_ms,
        };
        let registry = ToolRegistry::for_set(cell.scenario.tool_set());
        let runner = ConversationRunner::new(self.provider.as_ref(), &registry, options);

        debug!(
            model,
            cell = %cell.scenario.cell_label(),
            iteration,
            seed,
            "Running execution"
        );

        match runner.run(&prompt.system_message, &prompt.user_message).await {
            Ok(transcript) => {
                let evaluation =
                    self.classifier
                        .classify(&transcript, prompt.expected_value, prompt.trap_value);
                let outcome =
                    ExecutionOutcome::classified(model, &cell.scenario, &evaluation, transcript.latency_ms);

                if let (Some(db), Some(experiment_id), Some(model_id)) =
                    (&self.database, experiment_id, model_id)
                {
                    let ctx = ExecutionContext {
                        id: Uuid::new_v4(),
                        experiment_id,
                        model_id,
                        scenario: cell.scenario.clone(),
                        iteration,
                        seed,
                        prompt,
                    };
                    if let Err(e) = db.save_execution(&ctx, &transcript, &evaluation).await {
                        error!(execution = %ctx.id, "Failed to persist execution: {e}");
                        return ExecutionOutcome::failed(model, &cell.scenario);
                    }
                }

                outcome
            }
            Err(e) => {
                warn!(
                    model,
                    cell = %cell.scenario.cell_label(),
                    iteration,
                    "Model call failed: {e}"
                );

                if let (Some(db), Some(experiment_id), Some(model_id)) =
                    (&self.database, experiment_id, model_id)
                {
                    let ctx = ExecutionContext {
                        id: Uuid::new_v4(),
                        experiment_id,
                        model_id,
                        scenario: cell.scenario.clone(),
                        iteration,
                        seed,
                        prompt,
                    };
                    if let Err(persist_err) = db.save_failed_execution(&ctx, &e.to_string()).await {
                        error!(execution = %ctx.id, "Failed to record failed execution: {persist_err}");
                    }
                }

                ExecutionOutcome::failed(model, &cell.scenario)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunnerError;
    use crate::runner::{ChatRequest, ChatResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Provider that answers every request with the same fixed text.
    struct FixedProvider {
        text: String,
        calls: AtomicU32,
    }

    impl FixedProvider {
        fn new(text: impl Into<String>) -> Self {
            Self {
                text: text.into(),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for FixedProvider {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, RunnerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = serde_json::json!({
                "choices": [{
                    "message": { "role": "assistant", "content": self.text }
                }]
            });
            serde_json::from_value(response).map_err(RunnerError::from)
        }
    }

    fn tiny_plan() -> ExperimentPlan {
        ExperimentPlan::new("unit-test")
            .with_models(vec!["test-model".to_string()])
            .with_pollution_levels(vec![0])
            .with_difficulties(vec![Difficulty::Neutral])
            .with_tool_sets(vec![ToolSetKind::Base])
            .with_placements(vec![ContextPlacement::User])
            .with_iterations(1)
            .without_persistence()
    }

    #[test]
    fn test_enumerate_cells_full_grid() {
        let plan = ExperimentPlan::new("grid").with_models(vec!["m".to_string()]);
        let cells = enumerate_cells(&plan).unwrap();
        // 6 pollution levels × (neutral + counterfactual + adversarial×2
        // variants) × 2 tool sets × 2 placements.
        assert_eq!(cells.len(), 6 * 4 * 2 * 2);
        for (position, cell) in cells.iter().enumerate() {
            assert_eq!(cell.index, position);
        }
    }

    #[test]
    fn test_enumerate_cells_sets_variant_only_for_adversarial() {
        let plan = ExperimentPlan::new("variants").with_models(vec!["m".to_string()]);
        let cells = enumerate_cells(&plan).unwrap();
        for cell in &cells {
            let has_variant = cell.scenario.adversarial_variant().is_some();
            let is_adversarial = cell.scenario.difficulty() == Difficulty::Adversarial;
            assert_eq!(has_variant, is_adversarial);
        }
    }

    #[test]
    fn test_derive_seed_is_reproducible() {
        assert_eq!(derive_seed(42, 3, 7), derive_seed(42, 3, 7));
        assert_ne!(derive_seed(42, 3, 7), derive_seed(42, 3, 8));
        assert_ne!(derive_seed(42, 3, 7), derive_seed(42, 4, 7));
        assert_ne!(derive_seed(42, 3, 7), derive_seed(43, 3, 7));
    }

    #[test]
    fn test_cell_stats_rates() {
        let mut stats = CellStats::default();
        stats.record_verdict(Classification::Stc, 100);
        stats.record_verdict(Classification::Stc, 200);
        stats.record_verdict(Classification::Fnc, 300);
        stats.record_failure();

        assert_eq!(stats.completed(), 3);
        assert_eq!(stats.total(), 4);
        assert!((stats.success_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert!((stats.avg_latency_ms() - 200.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_dry_run_counts_without_model_calls() {
        let plan = tiny_plan()
            .with_pollution_levels(vec![0, 20])
            .with_iterations(3)
            .as_dry_run();
        let provider = Arc::new(FixedProvider::new("should never be asked"));
        let orchestrator =
            ExperimentOrchestrator::with_provider(plan, Arc::clone(&provider) as Arc<dyn ChatProvider>)
                .unwrap();

        let summary = orchestrator.run_all().await.unwrap();

        assert!(summary.dry_run);
        assert_eq!(summary.cell_count, 2);
        assert_eq!(summary.total_executions, 6);
        assert!(summary.experiment_id.is_none());
        assert!(summary.stats.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_all_aggregates_anchored_answers_as_fnc() {
        let plan = tiny_plan()
            .with_pollution_levels(vec![80])
            .with_difficulties(vec![Difficulty::Adversarial])
            .with_variants(vec![AdversarialVariant::WithTimestamp])
            .with_iterations(2);
        let provider = Arc::new(FixedProvider::new(
            "Conforme o relatório, o preço da ação PETR4 é R$ 35,00.",
        ));
        let orchestrator =
            ExperimentOrchestrator::with_provider(plan, Arc::clone(&provider) as Arc<dyn ChatProvider>)
                .unwrap();

        let summary = orchestrator.run_all().await.unwrap();

        assert!(!summary.dry_run);
        assert!(summary.experiment_id.is_none());
        assert_eq!(summary.total_executions, 2);
        let totals = summary.stats.totals();
        assert_eq!(totals.fnc, 2);
        assert_eq!(totals.stc, 0);
        assert_eq!(totals.failed, 0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_context_window_preflight_rejects_tiny_window() {
        let mut plan = tiny_plan().with_pollution_levels(vec![100]);
        plan.runner.context_window_tokens = 2_048;
        let provider = Arc::new(FixedProvider::new("irrelevant"));
        let orchestrator =
            ExperimentOrchestrator::with_provider(plan, provider as Arc<dyn ChatProvider>).unwrap();

        let err = orchestrator.run_all().await.unwrap_err();
        assert!(matches!(
            err,
            ExperimentError::Config(ConfigError::ContextWindowExceeded { .. })
        ));
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(0), 0);
        assert_eq!(estimate_tokens(1), 1);
        assert_eq!(estimate_tokens(3), 1);
        assert_eq!(estimate_tokens(4), 2);
    }
}
