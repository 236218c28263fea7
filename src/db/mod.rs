mod models;
#[cfg(test)]
pub mod memory;

pub use models::*;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;

pub type DbPool = Arc<PgPool>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("enrollment {0} not found")]
    EnrollmentNotFound(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("certificate id {0} is already taken")]
    DuplicateCertificateId(String),
}

/// Record store for courses, enrollments and the download audit trail.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get_courses(&self) -> Result<Vec<Course>, BackendError>;

    async fn get_user_enrollments(&self, user_id: &str) -> Result<Vec<Enrollment>, BackendError>;

    async fn update_enrollment(
        &self,
        enrollment_id: &str,
        patch: EnrollmentPatch,
    ) -> Result<(), BackendError>;

    /// Writes the certificate identifier only if the enrollment has none yet.
    /// Returns the identifier stored after the call, which is the caller's
    /// identifier unless another writer got there first.
    async fn assign_certificate_id(
        &self,
        enrollment_id: &str,
        assignment: CertificateAssignment,
    ) -> Result<String, BackendError>;

    async fn push_download_log(&self, entry: NewDownloadLog)
        -> Result<DownloadLogEntry, BackendError>;
}

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub struct PgBackend {
    pool: DbPool,
}

impl PgBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Backend for PgBackend {
    async fn get_courses(&self) -> Result<Vec<Course>, BackendError> {
        let courses = sqlx::query_as::<_, Course>(
            "SELECT id, title, instructor, description FROM courses ORDER BY title",
        )
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(courses)
    }

    async fn get_user_enrollments(&self, user_id: &str) -> Result<Vec<Enrollment>, BackendError> {
        let enrollments = sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT id, user_id, course_id, progress, completed_at, certificate_id,
                   custom_certificate_name, user_display_name, user_email
            FROM enrollments
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(enrollments)
    }

    async fn update_enrollment(
        &self,
        enrollment_id: &str,
        patch: EnrollmentPatch,
    ) -> Result<(), BackendError> {
        let result = sqlx::query(
            r#"
            UPDATE enrollments
            SET custom_certificate_name = COALESCE($2, custom_certificate_name),
                completed_at = COALESCE($3, completed_at),
                user_display_name = COALESCE($4, user_display_name),
                user_email = COALESCE($5, user_email)
            WHERE id = $1
            "#,
        )
        .bind(enrollment_id)
        .bind(&patch.custom_certificate_name)
        .bind(patch.completed_at)
        .bind(&patch.user_display_name)
        .bind(&patch.user_email)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(BackendError::EnrollmentNotFound(enrollment_id.to_string()));
        }
        Ok(())
    }

    async fn assign_certificate_id(
        &self,
        enrollment_id: &str,
        assignment: CertificateAssignment,
    ) -> Result<String, BackendError> {
        let assigned: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE enrollments
            SET certificate_id = $2,
                completed_at = $3,
                user_display_name = $4,
                user_email = COALESCE($5, user_email)
            WHERE id = $1 AND certificate_id IS NULL
            RETURNING certificate_id
            "#,
        )
        .bind(enrollment_id)
        .bind(&assignment.certificate_id)
        .bind(assignment.completed_at)
        .bind(&assignment.user_display_name)
        .bind(&assignment.user_email)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                BackendError::DuplicateCertificateId(assignment.certificate_id.clone())
            }
            other => BackendError::Database(other),
        })?;

        if let Some(id) = assigned {
            return Ok(id);
        }

        // Lost the race, or the enrollment does not exist.
        let existing: Option<Option<String>> =
            sqlx::query_scalar("SELECT certificate_id FROM enrollments WHERE id = $1")
                .bind(enrollment_id)
                .fetch_optional(self.pool.as_ref())
                .await?;

        existing
            .flatten()
            .ok_or_else(|| BackendError::EnrollmentNotFound(enrollment_id.to_string()))
    }

    async fn push_download_log(
        &self,
        entry: NewDownloadLog,
    ) -> Result<DownloadLogEntry, BackendError> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO certificate_downloads (id, user_id, course_id, filename, downloaded_at, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&id)
        .bind(&entry.user_id)
        .bind(&entry.course_id)
        .bind(&entry.filename)
        .bind(entry.downloaded_at)
        .bind(&entry.user_agent)
        .execute(self.pool.as_ref())
        .await?;

        Ok(DownloadLogEntry {
            id,
            user_id: entry.user_id,
            course_id: entry.course_id,
            filename: entry.filename,
            downloaded_at: entry.downloaded_at,
            user_agent: entry.user_agent,
        })
    }
}
