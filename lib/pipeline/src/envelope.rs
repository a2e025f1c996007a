use receiptx_core::Receipt;
use serde::{Deserialize, Serialize};

pub const SUCCESS_MESSAGE: &str = "Receipt processed successfully";
pub const FAILURE_MESSAGE: &str = "Failed to process receipt. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failed,
}

/// Caller-facing result of one pipeline run.
///
/// Failures carry only a generic message; details go to the logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub status: Status,
    pub message: String,
    pub data: Option<Receipt>,
}

impl ResultEnvelope {
    pub fn success(receipt: Receipt) -> Self {
        Self {
            status: Status::Success,
            message: SUCCESS_MESSAGE.to_string(),
            data: Some(receipt),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: Status::Failed,
            message: FAILURE_MESSAGE.to_string(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}
