use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A mailing list subscriber as it is stored in the emails table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmailEntry {
    pub id: i64,
    pub email: String,
    /// Epoch zero means the address was never confirmed
    pub confirmed_at: DateTime<Utc>,
    pub opt_out: bool,
}

/// Body accepted by the update endpoint. The row is upserted by email, so `id` is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmailEntryUpdate {
    #[serde(default)]
    pub id: Option<i64>,
    pub email: String,
    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub opt_out: Option<bool>,
}

/// Body shared by the create, get and delete endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmailBody {
    pub email: String,
}

impl EmailEntryUpdate {
    /// Seconds since epoch to persist. A missing confirmation time is stored as 0.
    pub fn confirmed_at_timestamp(&self) -> i64 {
        self.confirmed_at.map(|at| at.timestamp()).unwrap_or(0)
    }

    /// A missing or null opt-out flag keeps the subscriber active.
    pub fn is_opt_out(&self) -> bool {
        self.opt_out.unwrap_or(false)
    }
}

pub fn timestamp_to_datetime(seconds: i64) -> Result<DateTime<Utc>, String> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| format!("{} is not a valid confirmation timestamp", seconds))
}
