//! Route handlers: health probe and the parse endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::AppError;
use super::AppConfig;
use crate::models::{Diagnostic, ExtractStats, WorkflowContext};
use crate::services::{Extractor, PassthroughParser};

/// `logs` string cap, below the transport body cap.
pub const MAX_LOGS_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct ParseRequest {
    logs: String,
    #[serde(default)]
    context: Option<ParseRequestContext>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParseRequestContext {
    job: Option<String>,
    step: Option<String>,
    base_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub errors: Vec<Diagnostic>,
    pub stats: ExtractStats,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub parsers: usize,
    pub version: String,
}

pub async fn health(Extension(config): Extension<Arc<AppConfig>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        parsers: Extractor::new().parser_count(),
        version: config.version.clone(),
    })
}

pub async fn parse_logs(
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ParseResponse>, AppError> {
    validate_content_type(&headers)?;

    // Two-stage decode so a present-but-malformed body and a missing field
    // report differently.
    let value: Value = serde_json::from_slice(&body).map_err(|_| AppError::InvalidJson)?;
    if value.get("logs").map_or(true, |v| !v.is_string()) {
        return Err(AppError::MissingLogs);
    }
    let request: ParseRequest =
        serde_json::from_value(value).map_err(|_| AppError::InvalidJson)?;

    if request.logs.len() > MAX_LOGS_BYTES {
        return Err(AppError::PayloadTooLarge);
    }

    let context = request.context.unwrap_or_default();
    let base_path = context.base_path;
    let workflow = match (context.job, context.step) {
        (None, None) => None,
        (job, step) => Some(WorkflowContext::new(
            job.unwrap_or_default(),
            step.unwrap_or_default(),
        )),
    };

    // The engine is CPU-bound and stateless per request; keep it off the
    // async workers.
    let result = tokio::task::spawn_blocking(move || {
        let mut extractor = Extractor::new();
        extractor.extract_with_context(
            &request.logs,
            &mut PassthroughParser,
            base_path.as_deref(),
            workflow,
        )
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Json(ParseResponse {
        errors: result.diagnostics,
        stats: result.stats,
    }))
}

/// Missing Content-Type is accepted; a present one must be JSON, with an
/// optional charset suffix.
fn validate_content_type(headers: &HeaderMap) -> Result<(), AppError> {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return Ok(());
    };
    let Ok(value) = value.to_str() else {
        return Err(AppError::UnsupportedMediaType);
    };
    let media_type = value.split(';').next().unwrap_or("").trim();
    if media_type.eq_ignore_ascii_case("application/json") {
        Ok(())
    } else {
        Err(AppError::UnsupportedMediaType)
    }
}
