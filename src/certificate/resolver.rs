use chrono::{DateTime, Utc};
use rand::Rng;

use crate::auth::Identity;
use crate::db::{Backend, BackendError, CertificateAssignment, Enrollment};

use super::BRAND;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdStatus {
    /// Already stored before this call, possibly by a concurrent writer.
    Existing,
    /// Generated here and acknowledged by the backend.
    Issued,
    /// Generated here but the write was rejected.
    Unconfirmed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateIdentity {
    pub id: String,
    pub status: IdStatus,
}

impl CertificateIdentity {
    pub fn is_confirmed(&self) -> bool {
        !matches!(self.status, IdStatus::Unconfirmed(_))
    }
}

/// Keeps the last `n` characters of a number's decimal form.
pub fn trailing_digits(value: i64, n: usize) -> String {
    let digits = value.to_string();
    digits[digits.len().saturating_sub(n)..].to_string()
}

pub fn generate_certificate_id<R: Rng + ?Sized>(now_millis: i64, rng: &mut R) -> String {
    format!(
        "CERT-{}-{}{}",
        BRAND,
        trailing_digits(now_millis, 5),
        rng.gen_range(1000..=9999)
    )
}

/// Generated identifiers tried before a collision is reported as a failed write.
const ID_ATTEMPTS: usize = 2;

/// Makes sure the enrollment carries a certificate identifier.
///
/// The returned identifier is always usable for rendering. When the backend
/// rejects the write the status says so and the caller surfaces the error.
pub async fn ensure_certificate_id(
    backend: &dyn Backend,
    enrollment: &Enrollment,
    identity: &Identity,
    now: DateTime<Utc>,
) -> CertificateIdentity {
    let now_millis = now.timestamp_millis();
    assign_generated_id(backend, enrollment, identity, now, || {
        generate_certificate_id(now_millis, &mut rand::thread_rng())
    })
    .await
}

async fn assign_generated_id(
    backend: &dyn Backend,
    enrollment: &Enrollment,
    identity: &Identity,
    now: DateTime<Utc>,
    mut next_id: impl FnMut() -> String + Send,
) -> CertificateIdentity {
    if let Some(id) = &enrollment.certificate_id {
        return CertificateIdentity {
            id: id.clone(),
            status: IdStatus::Existing,
        };
    }

    let mut attempt = 1;
    loop {
        let candidate = next_id();
        let assignment = CertificateAssignment {
            certificate_id: candidate.clone(),
            completed_at: now,
            user_display_name: enrollment
                .custom_certificate_name
                .clone()
                .unwrap_or_else(|| identity.default_certificate_name()),
            user_email: identity.email.clone(),
        };

        match backend.assign_certificate_id(&enrollment.id, assignment).await {
            Ok(stored) if stored == candidate => {
                tracing::info!(enrollment_id = %enrollment.id, certificate_id = %stored, "certificate id issued");
                return CertificateIdentity {
                    id: stored,
                    status: IdStatus::Issued,
                };
            }
            Ok(stored) => {
                tracing::warn!(
                    enrollment_id = %enrollment.id,
                    certificate_id = %stored,
                    discarded = %candidate,
                    "certificate id already assigned by another writer"
                );
                return CertificateIdentity {
                    id: stored,
                    status: IdStatus::Existing,
                };
            }
            Err(BackendError::DuplicateCertificateId(taken)) if attempt < ID_ATTEMPTS => {
                tracing::warn!(enrollment_id = %enrollment.id, certificate_id = %taken, "certificate id collision, regenerating");
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(enrollment_id = %enrollment.id, error = %e, "Error saving certificate data");
                return CertificateIdentity {
                    id: candidate,
                    status: IdStatus::Unconfirmed(e.to_string()),
                };
            }
        }
    }
}
