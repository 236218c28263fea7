//! One-time prompt asking the learner which name goes on the certificate.

use std::collections::HashSet;

use thiserror::Error;

use crate::auth::Identity;
use crate::db::{Backend, BackendError, Enrollment, EnrollmentPatch};

pub const ASKED_FLAG_PREFIX: &str = "certificateNameAsked_";

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("Please enter a name for your certificate")]
    EmptyName,
    #[error("Enrollment not found")]
    EnrollmentNotFound,
    #[error("Error saving certificate name: {0}")]
    Backend(#[from] BackendError),
}

/// Per-device record of which enrollments have already been prompted.
pub trait AskedFlags: Sync {
    fn was_asked(&self, enrollment_id: &str) -> bool;
}

impl AskedFlags for HashSet<String> {
    fn was_asked(&self, enrollment_id: &str) -> bool {
        self.contains(enrollment_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingState {
    Unasked,
    Asked,
}

impl NamingState {
    pub fn for_enrollment(flags: &dyn AskedFlags, enrollment_id: &str) -> Self {
        if flags.was_asked(enrollment_id) {
            NamingState::Asked
        } else {
            NamingState::Unasked
        }
    }
}

pub fn asked_flag_name(enrollment_id: &str) -> String {
    format!("{}{}", ASKED_FLAG_PREFIX, enrollment_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptAction {
    Save(String),
    Skip,
    OverlayClick,
    Escape,
}

impl PromptAction {
    /// Parses the dismissal reason posted by the modal. Unknown values count as Skip.
    pub fn dismissal(reason: Option<&str>) -> Self {
        match reason {
            Some("overlay") => PromptAction::OverlayClick,
            Some("escape") => PromptAction::Escape,
            _ => PromptAction::Skip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Saved(String),
    Skipped,
}

/// Context of an open naming prompt. Exists only while the prompt is on
/// screen and is consumed by the action that closes it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NamingPrompt {
    pub enrollment_id: String,
    pub course_id: String,
    pub prefill: String,
}

impl NamingPrompt {
    pub fn open(
        flags: &dyn AskedFlags,
        enrollment: &Enrollment,
        identity: &Identity,
    ) -> Option<Self> {
        match NamingState::for_enrollment(flags, &enrollment.id) {
            NamingState::Asked => None,
            NamingState::Unasked => Some(Self::reopen(enrollment, identity)),
        }
    }

    /// Shows the prompt regardless of the flag, e.g. after a rejected Save.
    pub fn reopen(enrollment: &Enrollment, identity: &Identity) -> Self {
        Self {
            enrollment_id: enrollment.id.clone(),
            course_id: enrollment.course_id.clone(),
            prefill: identity.default_certificate_name(),
        }
    }

    pub async fn resolve(
        self,
        backend: &dyn Backend,
        identity: &Identity,
        action: PromptAction,
    ) -> Result<PromptOutcome, NamingError> {
        match action {
            PromptAction::Save(name) => {
                let saved = save_certificate_name(backend, identity, &self.course_id, &name).await?;
                Ok(PromptOutcome::Saved(saved))
            }
            dismissed => {
                tracing::debug!(enrollment_id = %self.enrollment_id, action = ?dismissed, "naming prompt dismissed");
                Ok(PromptOutcome::Skipped)
            }
        }
    }
}

/// Stores `name` as the certificate name override of the identity's
/// enrollment in `course_id`. Returns the trimmed name that was saved.
pub async fn save_certificate_name(
    backend: &dyn Backend,
    identity: &Identity,
    course_id: &str,
    name: &str,
) -> Result<String, NamingError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NamingError::EmptyName);
    }

    let enrollments = backend.get_user_enrollments(&identity.uid).await?;
    let enrollment = enrollments
        .into_iter()
        .find(|e| e.course_id == course_id)
        .ok_or(NamingError::EnrollmentNotFound)?;

    backend
        .update_enrollment(
            &enrollment.id,
            EnrollmentPatch {
                custom_certificate_name: Some(name.to_string()),
                ..Default::default()
            },
        )
        .await
        .inspect_err(|e| tracing::error!(enrollment_id = %enrollment.id, error = %e, "Error saving certificate name"))?;

    tracing::info!(enrollment_id = %enrollment.id, "certificate name saved");
    Ok(name.to_string())
}
