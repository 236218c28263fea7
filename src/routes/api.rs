use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use std::sync::Arc;

use super::pages::{certificate_location, course_card, CertificateQuery, COURSES_PAGE_SIZE};
use crate::a11y::node::Node;
use crate::a11y::COURSE_CONTAINER;
use crate::auth::Identity;
use crate::certificate::gateway::{load_eligible, GatewayError};
use crate::certificate::resolver::{ensure_certificate_id, IdStatus};
use crate::certificate::view::verification_link;
use crate::certificate::{Notice, BRAND};
use crate::export::{
    export_certificate, ExportContext, ExportError, ExportRequest, CAPTURE_UNAVAILABLE,
    PDF_UNAVAILABLE,
};
use crate::state::AppState;

pub async fn download_certificate(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    headers: HeaderMap,
    Query(query): Query<CertificateQuery>,
) -> Response {
    let course_id = match query.course_id {
        Some(id) if !id.is_empty() => id,
        _ => return Redirect::to("/certificate").into_response(),
    };

    let ctx = ExportContext {
        backend: state.backend.as_ref(),
        rasterizer: state.rasterizer.as_deref(),
        pdf: state.pdf.as_deref(),
        config: &state.config,
    };
    let request = ExportRequest {
        identity: &identity,
        course_id: &course_id,
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    match export_certificate(&ctx, request, Utc::now()).await {
        Ok(outcome) => {
            let download = outcome.download();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, download.content_type.to_string()),
                    (header::CONTENT_DISPOSITION, content_disposition(&download.filename)),
                ],
                download.bytes.clone(),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Error downloading certificate: {}", e);
            Redirect::to(&certificate_location(&course_id, Some(export_notice(&e)))).into_response()
        }
    }
}

fn export_notice(error: &ExportError) -> Notice {
    match error {
        ExportError::MissingCapability(PDF_UNAVAILABLE) => Notice::PdfUnavailable,
        ExportError::MissingCapability(CAPTURE_UNAVAILABLE) => Notice::CaptureUnavailable,
        ExportError::Gateway(GatewayError::NotEligible) => Notice::NotEligible,
        _ => Notice::DownloadFailed,
    }
}

/// Characters left as-is in an RFC 5987 `filename*` value.
const FILENAME_ATTR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Attachment header value. The quoted `filename` is an ASCII approximation;
/// `filename*` carries the exact UTF-8 name.
fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        utf8_percent_encode(filename, FILENAME_ATTR)
    )
}

pub async fn share_link(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<CertificateQuery>,
) -> Response {
    let course_id = query.course_id.unwrap_or_default();
    let eligible = match load_eligible(state.backend.as_ref(), &identity, &course_id).await {
        Ok(eligible) => eligible,
        Err(GatewayError::NotEligible) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "success": false,
                    "error": GatewayError::NotEligible.to_string()
                })),
            )
                .into_response()
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "error": e.to_string()
                })),
            )
                .into_response()
        }
    };

    let resolved =
        ensure_certificate_id(state.backend.as_ref(), &eligible.enrollment, &identity, Utc::now())
            .await;
    if let IdStatus::Unconfirmed(error) = &resolved.status {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "success": false,
                "error": format!("Error saving certificate data: {}", error)
            })),
        )
            .into_response();
    }

    Json(serde_json::json!({
        "success": true,
        "title": format!("{} Certificate", BRAND),
        "text": format!("I earned a certificate from {}!", BRAND),
        "url": format!("{}/{}", state.config.public_origin, verification_link(&resolved.id)),
    }))
    .into_response()
}

#[derive(Deserialize)]
pub struct CardsQuery {
    offset: Option<usize>,
    limit: Option<usize>,
}

/// Next batch of course cards for the "Load more" button. The fragment goes
/// through the insertion bus before it is returned.
pub async fn course_cards(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CardsQuery>,
) -> Response {
    let courses = match state.backend.get_courses().await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load courses: {}", e);
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    let offset = query.offset.unwrap_or(COURSES_PAGE_SIZE);
    let limit = query.limit.unwrap_or(COURSES_PAGE_SIZE).min(50);
    let mut fragment = Node::new("div");
    for course in courses.iter().skip(offset).take(limit) {
        fragment = fragment.child(course_card(course, &state.config.default_instructor));
    }
    state.bus.publish(COURSE_CONTAINER, &mut fragment).await;

    let html: String = fragment.children.iter().map(Node::to_html).collect();
    Html(html).into_response()
}
