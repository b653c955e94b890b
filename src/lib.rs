pub mod config;
pub mod error;
pub mod io;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod stages;

pub use config::{load_criteria_file, AnalysisConfig, DEFAULT_MODEL};
pub use error::{
    ConfigError, EmptyInputError, EvaluationFailure, GatewayError, GatewayErrorKind,
    GenerationFailure, RefinementFailure, SessionFailure, Stage, StageFailure,
};
pub use io::{
    load_transcript, validate_session_name, write_session, SessionSummary, SessionWriter,
};
pub use llm::{AnthropicClient, AnthropicConfig, GatewayRequest, LlmGateway, RetryPolicy};
pub use models::{
    Chunk, Code, EvaluationCriteria, OverallEvaluation, RefinementOperation, RefinementPlan,
    SessionResult, SessionStatus, Theme, ThemeSet,
};
pub use orchestrator::{Orchestrator, SessionState};
pub use stages::{
    apply_plan, chunk_transcript, ChunkerConfig, EvaluationStage, GenerationStage,
    RefinementStage,
};
