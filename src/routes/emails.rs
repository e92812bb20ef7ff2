use actix_web::http::StatusCode;
use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;

use crate::{
    domain::{
        email_batch::{EmailBatch, EmailBatchBody},
        email_entry::{EmailBody, EmailEntryUpdate},
    },
    store::{EmailStore, StoreError},
};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(thiserror::Error)]
pub enum EmailApiError {
    #[error("{0}")]
    MalformedBody(String),
    #[error("{0}")]
    InvalidBatch(String),
    // The create, update or delete statement itself failed
    #[error("{0}")]
    Rejected(#[source] StoreError),
    #[error("{0}")]
    Lookup(#[source] StoreError),
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(rename = "Err")]
    err: String,
}

impl std::fmt::Debug for EmailApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Caused by:\n\t({})", self)
    }
}

impl ResponseError for EmailApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            EmailApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            EmailApiError::InvalidBatch(_) => StatusCode::BAD_REQUEST,
            EmailApiError::Rejected(_) => StatusCode::BAD_REQUEST,
            EmailApiError::Lookup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        json_response(
            self.status_code(),
            &ErrorBody {
                err: self.to_string(),
            },
        )
    }
}

/// Turns body decoding failures into the same JSON error shape the handlers use.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::error!("Failed to decode request body: {:?}", err);

    EmailApiError::MalformedBody(err.to_string()).into()
}

/// Answers requests made with a method the resource does not serve.
pub async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().finish()
}

#[tracing::instrument(
    name = "Creating a new email handler",
    skip(body, store),
    fields(email = %body.email)
)]
pub async fn handle_create_email(
    body: web::Json<EmailBody>,
    store: web::Data<EmailStore>,
) -> Result<HttpResponse, EmailApiError> {
    store
        .create(&body.email)
        .await
        .map_err(EmailApiError::Rejected)?;

    let entry = store
        .get(&body.email)
        .await
        .map_err(EmailApiError::Lookup)?;

    Ok(json_response(StatusCode::OK, &entry))
}

#[tracing::instrument(
    name = "Getting an email handler",
    skip(body, store),
    fields(email = %body.email)
)]
pub async fn handle_get_email(
    body: web::Json<EmailBody>,
    store: web::Data<EmailStore>,
) -> Result<HttpResponse, EmailApiError> {
    let entry = store
        .get(&body.email)
        .await
        .map_err(EmailApiError::Lookup)?;

    Ok(json_response(StatusCode::OK, &entry))
}

#[tracing::instrument(
    name = "Updating an email handler",
    skip(body, store),
    fields(email = %body.email, opt_out = body.is_opt_out())
)]
pub async fn handle_update_email(
    body: web::Json<EmailEntryUpdate>,
    store: web::Data<EmailStore>,
) -> Result<HttpResponse, EmailApiError> {
    store
        .update(&body)
        .await
        .map_err(EmailApiError::Rejected)?;

    let entry = store
        .get(&body.email)
        .await
        .map_err(EmailApiError::Lookup)?;

    Ok(json_response(StatusCode::OK, &entry))
}

#[tracing::instrument(
    name = "Opting out an email handler",
    skip(body, store),
    fields(email = %body.email)
)]
pub async fn handle_delete_email(
    body: web::Json<EmailBody>,
    store: web::Data<EmailStore>,
) -> Result<HttpResponse, EmailApiError> {
    store
        .delete(&body.email)
        .await
        .map_err(EmailApiError::Rejected)?;

    let entry = store
        .get(&body.email)
        .await
        .map_err(EmailApiError::Lookup)?;

    Ok(json_response(StatusCode::OK, &entry))
}

#[tracing::instrument(
    name = "Getting a batch of emails handler",
    skip(body, store),
    fields(page = body.page, count = body.count)
)]
pub async fn handle_get_email_batch(
    body: web::Json<EmailBatchBody>,
    store: web::Data<EmailStore>,
) -> Result<HttpResponse, EmailApiError> {
    let batch: EmailBatch = body
        .into_inner()
        .try_into()
        .map_err(EmailApiError::InvalidBatch)?;

    let entries = store
        .get_batch(&batch)
        .await
        .map_err(EmailApiError::Lookup)?;

    Ok(json_response(StatusCode::OK, &entries))
}

fn json_response<T: Serialize>(status: StatusCode, data: &T) -> HttpResponse {
    match serde_json::to_vec(data) {
        Ok(body) => HttpResponse::build(status)
            .content_type(JSON_CONTENT_TYPE)
            .body(body),
        Err(err) => {
            tracing::error!("Failed to serialize response body: {:?}", err);
            HttpResponse::InternalServerError().finish()
        }
    }
}
