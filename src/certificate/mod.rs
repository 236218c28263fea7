pub mod gateway;
pub mod naming;
pub mod resolver;
pub mod view;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::Identity;
use crate::config::Config;
use crate::db::Backend;

use gateway::{load_eligible, GatewayError};
use naming::{AskedFlags, NamingPrompt};
use resolver::{ensure_certificate_id, IdStatus};
use view::CertificateView;

pub const BRAND: &str = "BYAMN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }
}

/// Notification carried across a redirect as a short query-string code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    NameSaved,
    NameRequired,
    EnrollmentMissing,
    NameSaveFailed,
    NotEligible,
    PdfUnavailable,
    CaptureUnavailable,
    DownloadFailed,
}

impl Notice {
    pub fn code(self) -> &'static str {
        match self {
            Notice::NameSaved => "name_saved",
            Notice::NameRequired => "name_required",
            Notice::EnrollmentMissing => "enrollment_missing",
            Notice::NameSaveFailed => "name_save_failed",
            Notice::NotEligible => "not_eligible",
            Notice::PdfUnavailable => "pdf_unavailable",
            Notice::CaptureUnavailable => "capture_unavailable",
            Notice::DownloadFailed => "download_failed",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        [
            Notice::NameSaved,
            Notice::NameRequired,
            Notice::EnrollmentMissing,
            Notice::NameSaveFailed,
            Notice::NotEligible,
            Notice::PdfUnavailable,
            Notice::CaptureUnavailable,
            Notice::DownloadFailed,
        ]
        .into_iter()
        .find(|n| n.code() == code)
    }

    pub fn notification(self) -> Notification {
        match self {
            Notice::NameSaved => Notification::success("Certificate name saved successfully!"),
            Notice::NameRequired => Notification::error("Please enter a name for your certificate"),
            Notice::EnrollmentMissing => Notification::error("Enrollment not found"),
            Notice::NameSaveFailed => Notification::error("Error saving certificate name"),
            Notice::NotEligible => Notification::error("Course not found or not completed"),
            Notice::PdfUnavailable => Notification::error("PDF library not loaded"),
            Notice::CaptureUnavailable => Notification::error("Image capture library not loaded"),
            Notice::DownloadFailed => {
                Notification::error("Failed to download certificate. Please try again.")
            }
        }
    }

    /// A rejected Save keeps the prompt on screen.
    pub fn reopens_prompt(self) -> bool {
        matches!(self, Notice::NameRequired | Notice::NameSaveFailed)
    }
}

/// Everything needed to render the certificate page for one request.
#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub view: CertificateView,
    pub prompt: Option<NamingPrompt>,
    pub notifications: Vec<Notification>,
    /// Enrollment whose asked-flag must be recorded on the device.
    pub mark_asked: Option<String>,
}

impl PageOutcome {
    fn failed(view: CertificateView, notification: Notification) -> Self {
        Self {
            view,
            prompt: None,
            notifications: vec![notification],
            mark_asked: None,
        }
    }
}

/// Explicit context for the page-load workflow, passed to every step.
pub struct CertificateWorkflow<'a> {
    pub backend: &'a dyn Backend,
    pub config: &'a Config,
}

impl<'a> CertificateWorkflow<'a> {
    pub fn new(backend: &'a dyn Backend, config: &'a Config) -> Self {
        Self { backend, config }
    }

    pub async fn load_page(
        &self,
        identity: &Identity,
        course_id: Option<&str>,
        flags: &dyn AskedFlags,
        reopen_prompt: bool,
        now: DateTime<Utc>,
    ) -> PageOutcome {
        let Some(course_id) = course_id.filter(|id| !id.is_empty()) else {
            return PageOutcome::failed(
                CertificateView::invalid_request(),
                Notification::error("Invalid user or course"),
            );
        };

        let eligible = match load_eligible(self.backend, identity, course_id).await {
            Ok(eligible) => eligible,
            Err(GatewayError::NotEligible) => {
                return PageOutcome::failed(
                    CertificateView::not_eligible(),
                    Notification::error(GatewayError::NotEligible.to_string()),
                );
            }
            Err(e @ GatewayError::Backend(_)) => {
                return PageOutcome::failed(
                    CertificateView::load_error(),
                    Notification::error(e.to_string()),
                );
            }
        };

        let mut notifications = Vec::new();
        let resolved =
            ensure_certificate_id(self.backend, &eligible.enrollment, identity, now).await;
        match &resolved.status {
            IdStatus::Issued => {
                notifications.push(Notification::success("Certificate is ready for verification!"))
            }
            IdStatus::Unconfirmed(error) => notifications.push(Notification::error(format!(
                "Error saving certificate data: {}",
                error
            ))),
            IdStatus::Existing => {}
        }

        let mut view = CertificateView::issued(
            &eligible.course,
            &eligible.enrollment,
            identity,
            &resolved.id,
            &self.config.default_instructor,
            now,
        );
        view.id_confirmed = resolved.is_confirmed();

        let prompt = if reopen_prompt {
            Some(NamingPrompt::reopen(&eligible.enrollment, identity))
        } else {
            NamingPrompt::open(flags, &eligible.enrollment, identity)
        };
        let mark_asked = prompt.as_ref().map(|p| p.enrollment_id.clone());

        PageOutcome {
            view,
            prompt,
            notifications,
            mark_asked,
        }
    }
}
