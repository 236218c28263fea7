use thiserror::Error;

use crate::auth::Identity;
use crate::db::{Backend, BackendError, Course, Enrollment};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Course not found or not completed")]
    NotEligible,
    #[error("Error loading certificate data: {0}")]
    Backend(#[from] BackendError),
}

/// A completed enrollment joined with its course.
#[derive(Debug, Clone)]
pub struct Eligible {
    pub course: Course,
    pub enrollment: Enrollment,
}

pub fn select_eligible(
    courses: Vec<Course>,
    enrollments: Vec<Enrollment>,
    course_id: &str,
) -> Result<Eligible, GatewayError> {
    let course = courses.into_iter().find(|c| c.id == course_id);
    let enrollment = enrollments.into_iter().find(|e| e.course_id == course_id);

    match (course, enrollment) {
        (Some(course), Some(enrollment)) if enrollment.is_complete() => {
            Ok(Eligible { course, enrollment })
        }
        _ => Err(GatewayError::NotEligible),
    }
}

pub async fn load_eligible(
    backend: &dyn Backend,
    identity: &Identity,
    course_id: &str,
) -> Result<Eligible, GatewayError> {
    let (courses, enrollments) = tokio::try_join!(
        backend.get_courses(),
        backend.get_user_enrollments(&identity.uid)
    )
    .map_err(|e| {
        tracing::error!(course_id, error = %e, "Error loading certificate data");
        GatewayError::Backend(e)
    })?;

    select_eligible(courses, enrollments, course_id).inspect_err(|_| {
        tracing::info!(course_id, uid = %identity.uid, "course not found or not completed");
    })
}
