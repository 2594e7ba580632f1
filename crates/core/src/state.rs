//! Run and variant lifecycle state machines.
//!
//! Both are explicit tagged enums with validated transition tables, so
//! an illegal move (e.g. `Accepted -> Retrying`) is a construction-time
//! error rather than a silently stored status string.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Run status
// ---------------------------------------------------------------------------

/// Lifecycle status of a run. Transitions exactly once from `Running`
/// to a terminal state, never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    /// String representation for database storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }

    /// Parse from the stored string.
    pub fn from_str(s: &str) -> Result<Self, EngineError> {
        match s {
            "RUNNING" => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            other => Err(EngineError::Validation(format!(
                "Unknown run status '{other}'"
            ))),
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Validate the single allowed transition: `Running` to a terminal
    /// state.
    pub fn finish(self, next: RunStatus) -> Result<RunStatus, EngineError> {
        if self == Self::Running && next.is_terminal() {
            Ok(next)
        } else {
            Err(EngineError::Internal(format!(
                "Illegal run transition {} -> {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Variant state
// ---------------------------------------------------------------------------

/// Lifecycle state of one variant within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariantState {
    Pending,
    CopyGenerated,
    ImageGenerated,
    QcEvaluated,
    Accepted,
    Retrying,
    Failed,
}

impl VariantState {
    /// String representation for database storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::CopyGenerated => "COPY_GENERATED",
            Self::ImageGenerated => "IMAGE_GENERATED",
            Self::QcEvaluated => "QC_EVALUATED",
            Self::Accepted => "ACCEPTED",
            Self::Retrying => "RETRYING",
            Self::Failed => "FAILED",
        }
    }

    /// Parse from the stored string.
    pub fn from_str(s: &str) -> Result<Self, EngineError> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "COPY_GENERATED" => Ok(Self::CopyGenerated),
            "IMAGE_GENERATED" => Ok(Self::ImageGenerated),
            "QC_EVALUATED" => Ok(Self::QcEvaluated),
            "ACCEPTED" => Ok(Self::Accepted),
            "RETRYING" => Ok(Self::Retrying),
            "FAILED" => Ok(Self::Failed),
            other => Err(EngineError::Validation(format!(
                "Unknown variant state '{other}'"
            ))),
        }
    }

    /// `Accepted` and `Failed` end the variant's lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Failed)
    }

    /// The transition table.
    ///
    /// `Retrying` may restart from copy generation (text failure) or
    /// image generation (validated copy is reused). Every non-terminal
    /// state may fail.
    pub fn can_transition_to(self, next: VariantState) -> bool {
        use VariantState::*;
        matches!(
            (self, next),
            (Pending, CopyGenerated)
                | (Pending, Retrying)
                | (Pending, Failed)
                | (CopyGenerated, ImageGenerated)
                | (CopyGenerated, Retrying)
                | (CopyGenerated, Failed)
                | (ImageGenerated, QcEvaluated)
                | (ImageGenerated, Retrying)
                | (ImageGenerated, Failed)
                | (QcEvaluated, Accepted)
                | (QcEvaluated, Retrying)
                | (QcEvaluated, Failed)
                | (Retrying, CopyGenerated)
                | (Retrying, ImageGenerated)
                | (Retrying, Failed)
        )
    }

    /// Validated transition; illegal moves are internal errors.
    pub fn transition(self, next: VariantState) -> Result<VariantState, EngineError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(EngineError::Internal(format!(
                "Illegal variant transition {} -> {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }
}
