//! Task lifecycle and callback states.

use super::{ParseCallbackStateError, ParseTaskStateError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Task waits in its workbasket to be claimed.
    Ready,
    /// Task is claimed by its owner.
    Claimed,
    /// Task waits in its workbasket to be claimed for review.
    ReadyForReview,
    /// Task is claimed by a reviewer.
    InReview,
    /// Task has been completed.
    Completed,
}

impl TaskState {
    /// Every task state.
    pub const ALL: [Self; 5] = [
        Self::Ready,
        Self::Claimed,
        Self::ReadyForReview,
        Self::InReview,
        Self::Completed,
    ];

    /// States from which a task can still be worked on or moved.
    pub const NON_FINAL: [Self; 4] = [
        Self::Ready,
        Self::Claimed,
        Self::ReadyForReview,
        Self::InReview,
    ];

    /// States in which a task is held by an owner.
    pub const CLAIMED: [Self; 2] = [Self::Claimed, Self::InReview];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Claimed => "CLAIMED",
            Self::ReadyForReview => "READY_FOR_REVIEW",
            Self::InReview => "IN_REVIEW",
            Self::Completed => "COMPLETED",
        }
    }

    /// Returns `true` for states no transition leaves.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns `true` when the task is held by an owner.
    #[must_use]
    pub const fn is_claimed(self) -> bool {
        matches!(self, Self::Claimed | Self::InReview)
    }

    /// State reached by claiming a task in this state.
    #[must_use]
    pub const fn after_claim(self) -> Self {
        match self {
            Self::ReadyForReview | Self::InReview => Self::InReview,
            Self::Ready | Self::Claimed | Self::Completed => Self::Claimed,
        }
    }

    /// State reached by releasing a claim on a task in this state.
    #[must_use]
    pub const fn after_cancel_claim(self) -> Self {
        match self {
            Self::InReview | Self::ReadyForReview => Self::ReadyForReview,
            Self::Claimed | Self::Ready | Self::Completed => Self::Ready,
        }
    }

    /// State reached by moving a task in this state to another workbasket.
    #[must_use]
    pub const fn after_transfer(self) -> Self {
        match self {
            Self::Claimed => Self::Ready,
            Self::InReview => Self::ReadyForReview,
            Self::Ready | Self::ReadyForReview | Self::Completed => self,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskState {
    type Error = ParseTaskStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "READY" => Ok(Self::Ready),
            "CLAIMED" => Ok(Self::Claimed),
            "READY_FOR_REVIEW" => Ok(Self::ReadyForReview),
            "IN_REVIEW" => Ok(Self::InReview),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(ParseTaskStateError(value.to_owned())),
        }
    }
}

/// State of the callback handshake with the system that created a task.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackState {
    /// No callback is expected.
    #[default]
    None,
    /// The creating system must be notified about completion.
    CallbackProcessingRequired,
    /// A callback processor has picked up the task.
    Claimed,
    /// The callback has been delivered.
    CallbackProcessingCompleted,
}

impl CallbackState {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::CallbackProcessingRequired => "CALLBACK_PROCESSING_REQUIRED",
            Self::Claimed => "CLAIMED",
            Self::CallbackProcessingCompleted => "CALLBACK_PROCESSING_COMPLETED",
        }
    }
}

impl fmt::Display for CallbackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for CallbackState {
    type Error = ParseCallbackStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "NONE" => Ok(Self::None),
            "CALLBACK_PROCESSING_REQUIRED" => Ok(Self::CallbackProcessingRequired),
            "CLAIMED" => Ok(Self::Claimed),
            "CALLBACK_PROCESSING_COMPLETED" => Ok(Self::CallbackProcessingCompleted),
            _ => Err(ParseCallbackStateError(value.to_owned())),
        }
    }
}
