use super::{DbStatus, HealthSnapshot};
use crate::monitor::RouteStat;
use serde::Serialize;
use utoipa::ToSchema;

/// Table whose link columns should be indexed.
pub const RELATIONSHIP_TABLE: &str = "account_clients";
const RELATIONSHIP_COLUMNS: [&str; 2] = ["client_id", "account_id"];

/// Row count above which a table is flagged for archiving.
pub const LARGE_TABLE_ROWS: i64 = 1_000_000;

/// Failure rate (percent) above which a route is flagged.
pub const ERROR_RATE_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Index,
    Performance,
    Reliability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<Recommendation>,
}

/// Derives recommendations from the latest snapshot and route statistics.
pub fn recommend(snapshot: &HealthSnapshot, routes: &[RouteStat]) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if snapshot.status == DbStatus::Healthy {
        for (name, table) in &snapshot.tables {
            if !table.exists {
                continue;
            }

            if let Some(indexes) = table.indexes.as_deref().filter(|_| name == RELATIONSHIP_TABLE) {
                for column in RELATIONSHIP_COLUMNS {
                    if !indexes.iter().any(|def| def.contains(column)) {
                        recommendations.push(Recommendation {
                            kind: RecommendationKind::Index,
                            priority: Priority::High,
                            message: format!(
                                "Add index on {name}.{column} for better query performance"
                            ),
                        });
                    }
                }
            }

            if let Some(rows) = table.row_count.filter(|rows| *rows > LARGE_TABLE_ROWS) {
                recommendations.push(Recommendation {
                    kind: RecommendationKind::Performance,
                    priority: Priority::Medium,
                    message: format!(
                        "Consider archiving old data from {name} ({} rows)",
                        with_thousands(rows)
                    ),
                });
            }
        }
    }

    for route in routes {
        let rate = route.failure_rate();
        if route.total_calls > 0 && rate > ERROR_RATE_THRESHOLD {
            recommendations.push(Recommendation {
                kind: RecommendationKind::Reliability,
                priority: Priority::High,
                message: format!("High error rate ({rate:.1}%) on route {}", route.identifier),
            });
        }
    }

    recommendations
}

fn with_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
