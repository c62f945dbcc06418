use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Liveness payload: the process is up and serving requests.
#[derive(Serialize, Debug, PartialEq, Deserialize, ToSchema)]
pub struct LiveResponse {
    pub status: String,
    pub timestamp: String,
}

impl LiveResponse {
    pub fn up() -> Self {
        Self {
            status: "UP".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}
