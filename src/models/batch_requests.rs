use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::NewBatch;

/// Body of a full inventory request
#[derive(Serialize, Deserialize, ToSchema, Debug, Default)]
pub struct InventoryCompleteRequest {
    pub location: Option<String>,
}

/// Body of a partial inventory request
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct PartialInventoryRequest {
    pub weight: i64,
    pub location: Option<String>,
}

/// Rows to import in one call
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ImportRequest {
    pub rows: Vec<NewBatch>,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ImportResponse {
    pub message: String,
    pub count: u64,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ClearResponse {
    pub message: String,
    pub removed: u64,
}
