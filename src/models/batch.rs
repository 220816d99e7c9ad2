use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Inventory progress of a batch
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    NotStarted,
    PartiallyCompleted,
    Completed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::NotStarted => "not_started",
            BatchStatus::PartiallyCompleted => "partially_completed",
            BatchStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(BatchStatus::NotStarted),
            "partially_completed" => Ok(BatchStatus::PartiallyCompleted),
            "completed" => Ok(BatchStatus::Completed),
            other => Err(format!("Unknown batch status '{}'", other)),
        }
    }
}

/// A batch record as stored and as pushed over the live channel
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: i64,
    pub batch_number: String,
    pub article_number: String,
    pub description: String,
    pub location: Option<String>,
    pub total_weight: i64,
    pub inventored_weight: Option<i64>,
    pub status: BatchStatus,
    pub updated_at: Option<DateTime<Utc>>,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
}

/// Fields required to create a batch, also the shape of an import row
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewBatch {
    pub batch_number: String,
    pub article_number: String,
    pub description: String,
    pub location: Option<String>,
    pub total_weight: i64,
}

impl NewBatch {
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_number.trim().is_empty() {
            return Err("batchNumber must not be empty".to_string());
        }
        if self.article_number.trim().is_empty() {
            return Err("articleNumber must not be empty".to_string());
        }
        if self.total_weight < 0 {
            return Err(format!(
                "totalWeight must be zero or positive, got {}",
                self.total_weight
            ));
        }
        Ok(())
    }
}

/// Partial update of a batch. Absent fields are left untouched.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdate {
    pub location: Option<String>,
    pub inventored_weight: Option<i64>,
    pub status: Option<BatchStatus>,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
}

impl BatchUpdate {
    pub fn validate(&self) -> Result<(), String> {
        match self.inventored_weight {
            Some(weight) if weight < 0 => Err(format!(
                "inventoredWeight must be zero or positive, got {}",
                weight
            )),
            _ => Ok(()),
        }
    }
}

/// Outcome of a bulk import
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
}
