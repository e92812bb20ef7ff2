use serde::Deserialize;

const INVALID_BATCH_MESSAGE: &str = "page and count fields are required and must be greater than 0";

/// Body of the get_batch endpoint. Missing fields decode as 0 and fail validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmailBatchBody {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub count: i64,
}

/// A validated pagination window over the active subscribers. Pages start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmailBatch {
    page: i64,
    count: i64,
    offset: i64,
}

impl EmailBatch {
    pub fn parse(page: i64, count: i64) -> Result<EmailBatch, String> {
        if page < 1 || count < 1 {
            return Err(String::from(INVALID_BATCH_MESSAGE));
        }

        let offset = (page - 1)
            .checked_mul(count)
            .ok_or_else(|| format!("page {} with count {} is out of range", page, count))?;

        Ok(Self {
            page,
            count,
            offset,
        })
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn limit(&self) -> i64 {
        self.count
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

impl TryFrom<EmailBatchBody> for EmailBatch {
    type Error = String;

    fn try_from(body: EmailBatchBody) -> Result<Self, Self::Error> {
        EmailBatch::parse(body.page, body.count)
    }
}
