//! Operation stage tracking.

use std::fmt;

use tracing::{debug, debug_span, Span};

use crate::error::{QueryError, QueryResult};

/// Where an operation is in its pipeline.
///
/// ```text
/// Requested → Normalizing → Building → Executing → Mapping → Completed
///                  └───────────┴───────────┴──────────┴──→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Requested,
    Normalizing,
    Building,
    Executing,
    Mapping,
    Completed,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Requested => "requested",
            Stage::Normalizing => "normalizing",
            Stage::Building => "building",
            Stage::Executing => "executing",
            Stage::Mapping => "mapping",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One operation's walk through the stages, logged under its own span.
///
/// Events are emitted with `in_scope` so a pipeline can live across await
/// points without holding a span guard.
#[derive(Debug)]
pub(crate) struct Pipeline {
    span: Span,
    stage: Stage,
}

impl Pipeline {
    pub(crate) fn start(operation: &'static str, entity: &str) -> Self {
        let span = debug_span!("quarry", operation, entity);
        span.in_scope(|| debug!(stage = %Stage::Requested, "operation requested"));
        Self {
            span,
            stage: Stage::Requested,
        }
    }

    pub(crate) fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn advance(&mut self, stage: Stage) {
        let from = self.stage;
        self.stage = stage;
        self.span
            .in_scope(|| debug!(from = %from, stage = %stage, "stage transition"));
    }

    /// Close the pipeline with the operation's outcome.
    pub(crate) fn finish<T>(mut self, result: QueryResult<T>) -> QueryResult<T> {
        match &result {
            Ok(_) => self.advance(Stage::Completed),
            Err(e) => self.fail(e),
        }
        result
    }

    fn fail(&mut self, error: &QueryError) {
        let from = self.stage;
        self.stage = Stage::Failed;
        self.span.in_scope(|| {
            debug!(from = %from, stage = %Stage::Failed, error = %error, "operation failed")
        });
    }
}
