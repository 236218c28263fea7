//! In-memory backend for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    Backend, BackendError, CertificateAssignment, Course, DownloadLogEntry, Enrollment,
    EnrollmentPatch, NewDownloadLog,
};

#[derive(Default)]
pub struct MemoryBackend {
    courses: RwLock<Vec<Course>>,
    enrollments: RwLock<Vec<Enrollment>>,
    downloads: RwLock<Vec<DownloadLogEntry>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_audit: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_records(courses: Vec<Course>, enrollments: Vec<Enrollment>) -> Self {
        let backend = Self::new();
        *backend.courses.write().await = courses;
        *backend.enrollments.write().await = enrollments;
        backend
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_audit(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    /// Number of enrollment writes attempted, successful or not.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn enrollment(&self, id: &str) -> Option<Enrollment> {
        self.enrollments
            .read()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub async fn downloads(&self) -> Vec<DownloadLogEntry> {
        self.downloads.read().await.clone()
    }

    fn check_reads(&self) -> Result<(), BackendError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("mock read failure".to_string()));
        }
        Ok(())
    }

    fn check_writes(&self) -> Result<(), BackendError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("mock write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get_courses(&self) -> Result<Vec<Course>, BackendError> {
        self.check_reads()?;
        Ok(self.courses.read().await.clone())
    }

    async fn get_user_enrollments(&self, user_id: &str) -> Result<Vec<Enrollment>, BackendError> {
        self.check_reads()?;
        Ok(self
            .enrollments
            .read()
            .await
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_enrollment(
        &self,
        enrollment_id: &str,
        patch: EnrollmentPatch,
    ) -> Result<(), BackendError> {
        self.check_writes()?;
        let mut enrollments = self.enrollments.write().await;
        let enrollment = enrollments
            .iter_mut()
            .find(|e| e.id == enrollment_id)
            .ok_or_else(|| BackendError::EnrollmentNotFound(enrollment_id.to_string()))?;

        if let Some(name) = patch.custom_certificate_name {
            enrollment.custom_certificate_name = Some(name);
        }
        if let Some(at) = patch.completed_at {
            enrollment.completed_at = Some(at);
        }
        if let Some(name) = patch.user_display_name {
            enrollment.user_display_name = Some(name);
        }
        if let Some(email) = patch.user_email {
            enrollment.user_email = Some(email);
        }
        Ok(())
    }

    async fn assign_certificate_id(
        &self,
        enrollment_id: &str,
        assignment: CertificateAssignment,
    ) -> Result<String, BackendError> {
        self.check_writes()?;
        let mut enrollments = self.enrollments.write().await;
        let index = enrollments
            .iter()
            .position(|e| e.id == enrollment_id)
            .ok_or_else(|| BackendError::EnrollmentNotFound(enrollment_id.to_string()))?;

        if let Some(existing) = &enrollments[index].certificate_id {
            return Ok(existing.clone());
        }
        if enrollments
            .iter()
            .any(|e| e.certificate_id.as_deref() == Some(assignment.certificate_id.as_str()))
        {
            return Err(BackendError::DuplicateCertificateId(assignment.certificate_id));
        }

        let enrollment = &mut enrollments[index];

        enrollment.certificate_id = Some(assignment.certificate_id.clone());
        enrollment.completed_at = Some(assignment.completed_at);
        enrollment.user_display_name = Some(assignment.user_display_name);
        if assignment.user_email.is_some() {
            enrollment.user_email = assignment.user_email;
        }
        Ok(assignment.certificate_id)
    }

    async fn push_download_log(
        &self,
        entry: NewDownloadLog,
    ) -> Result<DownloadLogEntry, BackendError> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("mock audit failure".to_string()));
        }
        let logged = DownloadLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: entry.user_id,
            course_id: entry.course_id,
            filename: entry.filename,
            downloaded_at: entry.downloaded_at,
            user_agent: entry.user_agent,
        };
        self.downloads.write().await.push(logged.clone());
        Ok(logged)
    }
}

pub fn course(id: &str, title: &str) -> Course {
    Course {
        id: id.to_string(),
        title: title.to_string(),
        instructor: None,
        description: None,
    }
}

pub fn enrollment(id: &str, user_id: &str, course_id: &str, progress: i32) -> Enrollment {
    Enrollment {
        id: id.to_string(),
        user_id: user_id.to_string(),
        course_id: course_id.to_string(),
        progress,
        completed_at: None,
        certificate_id: None,
        custom_certificate_name: None,
        user_display_name: None,
        user_email: None,
    }
}
