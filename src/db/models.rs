use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub instructor: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub progress: i32,
    pub completed_at: Option<DateTime<Utc>>,
    pub certificate_id: Option<String>,
    pub custom_certificate_name: Option<String>,
    pub user_display_name: Option<String>,
    pub user_email: Option<String>,
}

impl Enrollment {
    pub fn is_complete(&self) -> bool {
        self.progress == 100
    }
}

/// Partial update of an enrollment. `None` leaves the column untouched.
///
/// The certificate identifier is deliberately absent: it is only ever written
/// through [`CertificateAssignment`].
#[derive(Debug, Clone, Default)]
pub struct EnrollmentPatch {
    pub custom_certificate_name: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub user_display_name: Option<String>,
    pub user_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CertificateAssignment {
    pub certificate_id: String,
    pub completed_at: DateTime<Utc>,
    pub user_display_name: String,
    pub user_email: Option<String>,
}

/// Append-only audit record of a successful PDF download.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadLogEntry {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub filename: String,
    pub downloaded_at: DateTime<Utc>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewDownloadLog {
    pub user_id: String,
    pub course_id: String,
    pub filename: String,
    pub downloaded_at: DateTime<Utc>,
    pub user_agent: Option<String>,
}
