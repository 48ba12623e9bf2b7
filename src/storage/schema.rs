//! Database schema constants.
//!
//! All SQL schema definitions for the PostgreSQL storage backend. Every
//! statement is idempotent (IF NOT EXISTS / OR REPLACE) so migrations can
//! re-run safely.

/// SQL schema for creating the models table.
pub const CREATE_MODELS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS models (
    id UUID PRIMARY KEY,
    name VARCHAR(255) NOT NULL UNIQUE,
    provider VARCHAR(100) NOT NULL DEFAULT 'openai_compat',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL schema for creating the tools catalog table.
pub const CREATE_TOOLS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tools (
    id SERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL UNIQUE,
    description TEXT NOT NULL,
    parameters JSONB NOT NULL,
    is_target BOOLEAN NOT NULL DEFAULT FALSE,
    tool_set VARCHAR(20) NOT NULL CHECK (tool_set IN ('base', 'expanded')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL schema for creating the prompt_templates table.
pub const CREATE_PROMPT_TEMPLATES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS prompt_templates (
    id SERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL UNIQUE,
    system_prompt TEXT NOT NULL,
    user_prompt TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL schema for creating the experiments table.
pub const CREATE_EXPERIMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS experiments (
    id UUID PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    hypothesis TEXT,
    description TEXT,
    status VARCHAR(20) NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'running', 'completed', 'failed', 'cancelled')),
    master_seed BIGINT NOT NULL,
    iterations_per_cell INTEGER NOT NULL,
    config JSONB NOT NULL,
    started_at TIMESTAMPTZ,
    finished_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL schema for creating the executions table.
pub const CREATE_EXECUTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS executions (
    id UUID PRIMARY KEY,
    experiment_id UUID NOT NULL REFERENCES experiments(id) ON DELETE CASCADE,
    model_id UUID NOT NULL REFERENCES models(id),
    pollution_level SMALLINT NOT NULL,
    difficulty VARCHAR(20) NOT NULL
        CHECK (difficulty IN ('neutral', 'counterfactual', 'adversarial')),
    tool_set VARCHAR(20) NOT NULL CHECK (tool_set IN ('base', 'expanded')),
    context_placement VARCHAR(10) NOT NULL CHECK (context_placement IN ('user', 'system')),
    adversarial_variant VARCHAR(30)
        CHECK (adversarial_variant IN ('with_timestamp', 'without_timestamp')),
    iteration INTEGER NOT NULL,
    seed BIGINT NOT NULL,
    prompt_hash VARCHAR(64) NOT NULL,
    template_name VARCHAR(100) NOT NULL,
    system_prompt TEXT NOT NULL,
    user_prompt TEXT NOT NULL,
    pollution_text TEXT,
    block_count INTEGER NOT NULL,
    expected_value DOUBLE PRECISION NOT NULL,
    trap_value DOUBLE PRECISION NOT NULL,
    final_text TEXT,
    latency_ms BIGINT,
    input_tokens INTEGER,
    output_tokens INTEGER,
    rounds INTEGER,
    status VARCHAR(20) NOT NULL DEFAULT 'completed' CHECK (status IN ('completed', 'failed')),
    error TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL schema for creating the tool_calls table.
pub const CREATE_TOOL_CALLS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tool_calls (
    id SERIAL PRIMARY KEY,
    execution_id UUID NOT NULL REFERENCES executions(id) ON DELETE CASCADE,
    sequence_order INTEGER NOT NULL,
    tool_name VARCHAR(100) NOT NULL,
    arguments JSONB NOT NULL,
    result JSONB,
    execution_success BOOLEAN NOT NULL,
    is_target BOOLEAN NOT NULL,
    UNIQUE(execution_id, sequence_order)
)
"#;

/// SQL schema for creating the evaluations table.
///
/// The primary key doubles as the foreign key, enforcing the 1:1
/// relationship with executions.
pub const CREATE_EVALUATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS evaluations (
    execution_id UUID PRIMARY KEY REFERENCES executions(id) ON DELETE CASCADE,
    classification VARCHAR(3) NOT NULL CHECK (classification IN ('STC', 'FNC', 'FWT', 'FH')),
    called_any_tool BOOLEAN NOT NULL,
    called_target_tool BOOLEAN NOT NULL,
    used_tool_result BOOLEAN NOT NULL,
    anchored_on_context BOOLEAN NOT NULL,
    extracted_value DOUBLE PRECISION,
    candidate_count INTEGER NOT NULL DEFAULT 0,
    confidence_score DOUBLE PRECISION NOT NULL,
    manually_reviewed BOOLEAN NOT NULL DEFAULT FALSE,
    review_note TEXT,
    reasoning TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL for creating all required indexes.
pub const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_executions_experiment_id ON executions(experiment_id);
CREATE INDEX IF NOT EXISTS idx_executions_model_id ON executions(model_id);
CREATE INDEX IF NOT EXISTS idx_executions_pollution_level ON executions(pollution_level);
CREATE INDEX IF NOT EXISTS idx_executions_status ON executions(status);
CREATE INDEX IF NOT EXISTS idx_tool_calls_execution_id ON tool_calls(execution_id);
CREATE INDEX IF NOT EXISTS idx_experiments_status ON experiments(status)
"#;

/// Per-cell aggregation over evaluated executions.
pub const CREATE_CELL_METRICS_VIEW: &str = r#"
CREATE OR REPLACE VIEW v_cell_metrics AS
SELECT
    e.experiment_id,
    m.name AS model,
    e.pollution_level,
    e.difficulty,
    e.tool_set,
    e.context_placement,
    e.adversarial_variant,
    COUNT(ev.execution_id) AS n,
    AVG(CASE WHEN ev.classification = 'STC' THEN 1.0 ELSE 0.0 END)::double precision
        AS success_rate,
    AVG(CASE WHEN ev.anchored_on_context THEN 1.0 ELSE 0.0 END)::double precision
        AS anchor_rate,
    AVG(e.latency_ms)::double precision AS avg_latency_ms
FROM executions e
JOIN models m ON m.id = e.model_id
JOIN evaluations ev ON ev.execution_id = e.id
GROUP BY
    e.experiment_id, m.name, e.pollution_level, e.difficulty,
    e.tool_set, e.context_placement, e.adversarial_variant
"#;

/// Flat execution + evaluation join for listing and export. Failed
/// executions appear with NULL classification.
pub const CREATE_EXPERIMENT_RESULTS_VIEW: &str = r#"
CREATE OR REPLACE VIEW v_experiment_results AS
SELECT
    e.id AS execution_id,
    e.experiment_id,
    m.name AS model,
    e.pollution_level,
    e.difficulty,
    e.tool_set,
    e.context_placement,
    e.adversarial_variant,
    e.iteration,
    e.seed,
    e.prompt_hash,
    e.block_count,
    e.expected_value,
    e.trap_value,
    e.status,
    e.error,
    e.latency_ms,
    e.input_tokens,
    e.output_tokens,
    e.rounds,
    e.final_text,
    ev.classification,
    ev.called_any_tool,
    ev.called_target_tool,
    ev.used_tool_result,
    ev.anchored_on_context,
    ev.extracted_value,
    ev.candidate_count,
    ev.confidence_score,
    ev.manually_reviewed,
    e.created_at
FROM executions e
JOIN models m ON m.id = e.model_id
LEFT JOIN evaluations ev ON ev.execution_id = e.id
"#;

/// Returns all schema creation statements in the correct order.
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_MODELS_TABLE,
        CREATE_TOOLS_TABLE,
        CREATE_PROMPT_TEMPLATES_TABLE,
        CREATE_EXPERIMENTS_TABLE,
        CREATE_EXECUTIONS_TABLE,
        CREATE_TOOL_CALLS_TABLE,
        CREATE_EVALUATIONS_TABLE,
        CREATE_INDEXES,
        CREATE_CELL_METRICS_VIEW,
        CREATE_EXPERIMENT_RESULTS_VIEW,
    ]
}

/// Table names in the schema.
pub mod tables {
    /// Models table name.
    pub const MODELS: &str = "models";
    /// Tools catalog table name.
    pub const TOOLS: &str = "tools";
    /// Prompt templates table name.
    pub const PROMPT_TEMPLATES: &str = "prompt_templates";
    /// Experiments table name.
    pub const EXPERIMENTS: &str = "experiments";
    /// Executions table name.
    pub const EXECUTIONS: &str = "executions";
    /// Tool calls table name.
    pub const TOOL_CALLS: &str = "tool_calls";
    /// Evaluations table name.
    pub const EVALUATIONS: &str = "evaluations";
}
