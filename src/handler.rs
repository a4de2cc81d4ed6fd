use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_macros::debug_handler;
use utoipa::OpenApi;

use std::sync::Arc;

use crate::{
    dto::{EmailSendRequest, FetchQuery},
    error::{EmailError, QueueError},
    queue::Broker,
    service::EmailService,
    transport,
};

pub struct AppState {
    pub service: Arc<EmailService>,
    pub broker: Arc<Broker>,
    pub queue: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(send_email, fetch_emails),
    components(schemas(EmailSendRequest)),
    tags(
        (name = "emails", description = "Queued email dispatch and mailbox listing")
    )
)]
pub struct ApiDoc;

/// Faults raised while handling a request. Both map to 500.
#[derive(Debug)]
pub enum ApiError {
    Email(EmailError),
    Unknown(String),
}

impl From<EmailError> for ApiError {
    fn from(e: EmailError) -> Self {
        Self::Email(e)
    }
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        Self::Unknown(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::Unknown(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::Unknown(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self {
            Self::Email(e) => format!("Error: {e}"),
            Self::Unknown(message) => format!("Unknown error: {message}"),
        };
        tracing::error!("Request failed: {body}");
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

#[utoipa::path(
    post,
    path = "/api/emails/send",
    request_body = EmailSendRequest,
    responses(
        (status = 200, description = "Email queued for sending", body = String),
        (status = 500, description = "Queue publish or request binding failed")
    ),
    tag = "emails"
)]
#[debug_handler]
pub async fn send_email(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EmailSendRequest>, JsonRejection>,
) -> Result<String, ApiError> {
    let Json(request) = payload?;

    state.broker.publish(&state.queue, &request).await?;
    tracing::info!("Queued email for {}", request.to);

    Ok(format!(
        "Email has been added to the queue for sending to {}",
        request.to
    ))
}

#[utoipa::path(
    get,
    path = "/api/emails/fetch",
    params(FetchQuery),
    responses(
        (status = 200, description = "Folder listing started", body = String),
        (status = 500, description = "Missing or malformed folder name")
    ),
    tag = "emails"
)]
#[debug_handler]
pub async fn fetch_emails(
    State(state): State<Arc<AppState>>,
    params: Result<Query<FetchQuery>, QueryRejection>,
) -> Result<String, ApiError> {
    let Query(FetchQuery { folder_name }) = params?;
    transport::check_folder_name(&folder_name)?;

    let reply = format!("Reading emails from folder: {folder_name}");
    state.service.fetch_folder_async(folder_name).await;

    Ok(reply)
}

#[debug_handler]
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[debug_handler]
pub async fn health_check() -> Response {
    (StatusCode::OK, "Hello from mail dispatch service!").into_response()
}
