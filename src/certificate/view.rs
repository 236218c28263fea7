use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::Identity;
use crate::db::{Course, Enrollment};

/// Field values shown on the certificate page. Recomputed on every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateView {
    pub student_name: String,
    pub course_title: String,
    pub completion_date: String,
    pub instructor: String,
    pub issued_date: String,
    pub certificate_id: Option<String>,
    pub status: String,
    pub expiration: String,
    pub verify_link: Option<String>,
    pub export_enabled: bool,
    pub id_confirmed: bool,
}

pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%B %d, %Y").to_string()
}

pub fn verification_link(certificate_id: &str) -> String {
    format!("verification.html?certId={}", certificate_id)
}

impl CertificateView {
    /// Missing course, missing enrollment, or progress below 100.
    pub fn not_eligible() -> Self {
        Self::placeholder("N/A", "Course Not Found", "Invalid")
    }

    pub fn load_error() -> Self {
        Self::placeholder("N/A", "Error Loading", "Error")
    }

    /// The request itself was unusable, e.g. no course id.
    pub fn invalid_request() -> Self {
        Self::placeholder("Error", "Error Loading", "Error")
    }

    fn placeholder(student: &str, title: &str, status: &str) -> Self {
        Self {
            student_name: student.to_string(),
            course_title: title.to_string(),
            completion_date: "N/A".to_string(),
            instructor: "N/A".to_string(),
            issued_date: String::new(),
            certificate_id: None,
            status: status.to_string(),
            expiration: "N/A".to_string(),
            verify_link: None,
            export_enabled: false,
            id_confirmed: false,
        }
    }

    pub fn issued(
        course: &Course,
        enrollment: &Enrollment,
        identity: &Identity,
        certificate_id: &str,
        default_instructor: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let student_name = enrollment
            .custom_certificate_name
            .clone()
            .unwrap_or_else(|| identity.default_certificate_name());
        let completed = format_date(enrollment.completed_at.unwrap_or(now));

        Self {
            student_name,
            course_title: course.title.clone(),
            completion_date: completed.clone(),
            instructor: course
                .instructor
                .clone()
                .unwrap_or_else(|| default_instructor.to_string()),
            issued_date: format!("Issued On: {}", completed),
            certificate_id: Some(certificate_id.to_string()),
            status: "Active".to_string(),
            expiration: "Lifetime".to_string(),
            verify_link: Some(verification_link(certificate_id)),
            export_enabled: true,
            id_confirmed: true,
        }
    }

    pub fn uid_label(&self) -> String {
        match &self.certificate_id {
            Some(id) => format!("UID: {}", id),
            None => String::new(),
        }
    }

    /// Issue date without the label, as printed in the PDF metadata.
    pub fn issue_date(&self) -> &str {
        self.issued_date
            .strip_prefix("Issued On: ")
            .unwrap_or(&self.issued_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{course, enrollment};
    use chrono::TimeZone;

    fn identity() -> Identity {
        Identity {
            uid: "u1".to_string(),
            display_name: None,
            email: Some("jane.doe@example.com".to_string()),
        }
    }

    #[test]
    fn test_placeholders_disable_export() {
        for view in [
            CertificateView::not_eligible(),
            CertificateView::load_error(),
            CertificateView::invalid_request(),
        ] {
            assert!(!view.export_enabled);
            assert!(view.certificate_id.is_none());
            assert!(view.verify_link.is_none());
            assert_eq!(view.completion_date, "N/A");
        }
        assert_eq!(CertificateView::not_eligible().course_title, "Course Not Found");
        assert_eq!(CertificateView::not_eligible().status, "Invalid");
        assert_eq!(CertificateView::load_error().status, "Error");
    }

    #[test]
    fn test_issued_uses_override_name_and_default_instructor() {
        let c = course("c1", "Systems 101");
        let mut e = enrollment("e1", "u1", "c1", 100);
        e.completed_at = Some(Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap());
        e.custom_certificate_name = Some("J. Doe".to_string());

        let view = CertificateView::issued(&c, &e, &identity(), "CERT-BYAMN-1", "Rajesh Kumar", Utc::now());

        assert_eq!(view.student_name, "J. Doe");
        assert_eq!(view.course_title, "Systems 101");
        assert_eq!(view.instructor, "Rajesh Kumar");
        assert_eq!(view.completion_date, "March 05, 2024");
        assert_eq!(view.issued_date, "Issued On: March 05, 2024");
        assert_eq!(view.issue_date(), "March 05, 2024");
        assert_eq!(view.uid_label(), "UID: CERT-BYAMN-1");
        assert_eq!(view.verify_link.as_deref(), Some("verification.html?certId=CERT-BYAMN-1"));
        assert_eq!(view.status, "Active");
        assert_eq!(view.expiration, "Lifetime");
        assert!(view.export_enabled);
    }

    #[test]
    fn test_issued_without_override_uses_identity_name() {
        let mut c = course("c1", "Systems 101");
        c.instructor = Some("Ada".to_string());
        let e = enrollment("e1", "u1", "c1", 100);

        let view = CertificateView::issued(&c, &e, &identity(), "X", "Rajesh Kumar", Utc::now());

        assert_eq!(view.student_name, "jane.doe");
        assert_eq!(view.instructor, "Ada");
    }
}
