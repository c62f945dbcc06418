use chrono::{DateTime, NaiveDate, Utc};
use crate::monitor::params::deserialize_integer;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Maximum number of clients linked to one account.
pub const MAX_CLIENTS_PER_ACCOUNT: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, ToSchema)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub renewal_date: Option<NaiveDate>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The client fields exposed by lookups and account listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClientSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub renewal_date: Option<NaiveDate>,
}

impl From<Client> for ClientSummary {
    fn from(client: Client) -> Self {
        Self {
            id: client.id,
            name: client.name,
            email: client.email,
            renewal_date: client.renewal_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
pub struct NewClientRequest {
    pub name: String,
    pub email: String,
    #[serde(deserialize_with = "deserialize_integer")]
    pub account_id: i64,
    pub renewal_date: NaiveDate,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClientLookupRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientLookupResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientSummary>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct LinkRequest {
    #[serde(deserialize_with = "deserialize_integer")]
    pub client_id: i64,
    #[serde(deserialize_with = "deserialize_integer")]
    pub account_id: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenewRequest {
    #[serde(deserialize_with = "deserialize_integer")]
    pub client_id: i64,
    pub renewal_date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountClientsResponse {
    pub clients: Vec<ClientSummary>,
}
