pub mod filename;
pub mod raster;

use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::auth::Identity;
use crate::certificate::gateway::{load_eligible, GatewayError};
use crate::certificate::resolver::ensure_certificate_id;
use crate::certificate::view::CertificateView;
use crate::config::Config;
use crate::db::{Backend, NewDownloadLog};
use crate::pdf::{assemble_certificate, CertificateMetadata, PdfEngine, PdfError};

use filename::{fallback_png_filename, pdf_basename};
use raster::{Bitmap, CaptureTarget, RasterError, RasterOptions, Rasterizer};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{0}")]
    MissingCapability(&'static str),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("certificate template could not be rendered: {0}")]
    Template(#[from] tera::Error),
    #[error("Failed to download certificate. Please try again. ({0})")]
    Fallback(RasterError),
}

pub const PDF_UNAVAILABLE: &str = "PDF library not loaded";
pub const CAPTURE_UNAVAILABLE: &str = "Image capture library not loaded";

#[derive(Debug, Error)]
enum PrintError {
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error(transparent)]
    Pdf(#[from] PdfError),
}

#[derive(Debug, Clone)]
pub struct Download {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum ExportOutcome {
    Pdf(Download),
    /// PDF generation failed and the bare image was exported instead.
    Image(Download),
}

impl ExportOutcome {
    pub fn download(&self) -> &Download {
        match self {
            ExportOutcome::Pdf(d) | ExportOutcome::Image(d) => d,
        }
    }
}

/// Collaborators the pipeline needs. Either renderer may be absent when the
/// host could not provide it.
pub struct ExportContext<'a> {
    pub backend: &'a dyn Backend,
    pub rasterizer: Option<&'a dyn Rasterizer>,
    pub pdf: Option<&'a dyn PdfEngine>,
    pub config: &'a Config,
}

pub struct ExportRequest<'a> {
    pub identity: &'a Identity,
    pub course_id: &'a str,
    pub user_agent: Option<String>,
}

async fn capture_within(
    timeout: Duration,
    capture: impl Future<Output = Result<Bitmap, RasterError>>,
) -> Result<Bitmap, RasterError> {
    tokio::time::timeout(timeout, capture)
        .await
        .map_err(|_| RasterError::Timeout(timeout))?
}

pub async fn export_certificate(
    ctx: &ExportContext<'_>,
    request: ExportRequest<'_>,
    now: DateTime<Utc>,
) -> Result<ExportOutcome, ExportError> {
    let pdf = ctx.pdf.ok_or(ExportError::MissingCapability(PDF_UNAVAILABLE))?;
    let rasterizer = ctx
        .rasterizer
        .ok_or(ExportError::MissingCapability(CAPTURE_UNAVAILABLE))?;

    let eligible = load_eligible(ctx.backend, request.identity, request.course_id).await?;
    let resolved = ensure_certificate_id(ctx.backend, &eligible.enrollment, request.identity, now).await;
    if !resolved.is_confirmed() {
        warn!(certificate_id = %resolved.id, "exporting with an unconfirmed certificate id");
    }

    let view = CertificateView::issued(
        &eligible.course,
        &eligible.enrollment,
        request.identity,
        &resolved.id,
        &ctx.config.default_instructor,
        now,
    );
    let target = CaptureTarget {
        html: crate::templates::render_certificate_card(&view)?,
        base_url: format!("{}/", ctx.config.public_origin),
    };

    let basename = pdf_basename(&view.course_title, &view.student_name, now.timestamp_millis());
    info!(filename = %basename, "Generating certificate");

    let metadata = CertificateMetadata {
        course_title: view.course_title.clone(),
        student_name: view.student_name.clone(),
        certificate_id: resolved.id.clone(),
        issue_date: view.issue_date().to_string(),
        instructor: view.instructor.clone(),
        verification_url: ctx.config.verification_page(),
    };

    let printed: Result<Vec<u8>, PrintError> = async {
        let bitmap = capture_within(
            ctx.config.export_timeout,
            rasterizer.capture(&target, &RasterOptions::print()),
        )
        .await?;
        Ok::<_, PrintError>(assemble_certificate(pdf, &bitmap, &metadata)?)
    }
    .await;

    match printed {
        Ok(bytes) => {
            let filename = format!("{}.pdf", basename);
            info!(filename = %filename, "Certificate downloaded successfully");
            log_download(ctx.backend, &request, &basename, now).await;
            Ok(ExportOutcome::Pdf(Download {
                filename,
                content_type: "application/pdf",
                bytes,
            }))
        }
        Err(e) => {
            error!(error = %e, "Error generating certificate PDF");
            export_image(ctx, rasterizer, &target, &view).await
        }
    }
}

async fn export_image(
    ctx: &ExportContext<'_>,
    rasterizer: &dyn Rasterizer,
    target: &CaptureTarget,
    view: &CertificateView,
) -> Result<ExportOutcome, ExportError> {
    let bitmap = capture_within(
        ctx.config.export_timeout,
        rasterizer.capture(target, &RasterOptions::fallback()),
    )
    .await
    .map_err(|e| {
        error!(error = %e, "Fallback image download failed");
        ExportError::Fallback(e)
    })?;

    info!("Certificate downloaded as image");
    Ok(ExportOutcome::Image(Download {
        filename: fallback_png_filename(&view.course_title, &view.student_name),
        content_type: "image/png",
        bytes: bitmap.png,
    }))
}

/// Audit trail of PDF downloads. Failures are logged and otherwise ignored.
async fn log_download(
    backend: &dyn Backend,
    request: &ExportRequest<'_>,
    basename: &str,
    now: DateTime<Utc>,
) {
    let entry = NewDownloadLog {
        user_id: request.identity.uid.clone(),
        course_id: request.course_id.to_string(),
        filename: basename.to_string(),
        downloaded_at: now,
        user_agent: request.user_agent.clone(),
    };
    match backend.push_download_log(entry).await {
        Ok(logged) => info!(log_id = %logged.id, "Certificate download logged"),
        Err(e) => warn!(error = %e, "Error logging certificate download"),
    }
}
