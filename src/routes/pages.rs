use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tera::Context;

use crate::a11y::node::Node;
use crate::a11y::{enhance_document, COURSE_CARD, COURSE_CARD_TITLE, COURSE_CONTAINER};
use crate::auth::Identity;
use crate::certificate::naming::{
    asked_flag_name, AskedFlags, NamingError, NamingPrompt, PromptAction, ASKED_FLAG_PREFIX,
};
use crate::certificate::{CertificateWorkflow, Notice};
use crate::db::Course;
use crate::state::AppState;

/// Cards rendered with the first page load; the rest arrive through "Load more".
pub const COURSES_PAGE_SIZE: usize = 6;

const ASKED_COOKIE_MAX_AGE: u32 = 60 * 60 * 24 * 365;

#[derive(Deserialize)]
pub struct CertificateQuery {
    #[serde(rename = "courseId")]
    pub course_id: Option<String>,
    pub notice: Option<String>,
}

#[derive(Deserialize)]
pub struct NameForm {
    course_id: String,
    enrollment_id: String,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
pub struct SkipForm {
    course_id: String,
    enrollment_id: String,
    reason: Option<String>,
}

/// Asked-flags recorded on the device as `certificateNameAsked_<id>=true` cookies.
#[derive(Debug, Default)]
pub struct DeviceFlags {
    asked: HashSet<String>,
}

impl DeviceFlags {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let asked = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(_, value)| *value == "true")
            .filter_map(|(name, _)| name.strip_prefix(ASKED_FLAG_PREFIX))
            .map(str::to_string)
            .collect();
        Self { asked }
    }
}

impl AskedFlags for DeviceFlags {
    fn was_asked(&self, enrollment_id: &str) -> bool {
        self.asked.contains(enrollment_id)
    }
}

pub async fn certificate_page(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    headers: HeaderMap,
    Query(query): Query<CertificateQuery>,
) -> Response {
    let flags = DeviceFlags::from_headers(&headers);
    let notice = query.notice.as_deref().and_then(Notice::from_code);
    let reopen = notice.is_some_and(Notice::reopens_prompt);

    let workflow = CertificateWorkflow::new(state.backend.as_ref(), &state.config);
    let mut outcome = workflow
        .load_page(&identity, query.course_id.as_deref(), &flags, reopen, Utc::now())
        .await;
    if let Some(notice) = notice {
        outcome.notifications.insert(0, notice.notification());
    }

    let mut ctx = Context::new();
    ctx.insert("greeting", &identity.greeting());
    ctx.insert("notifications", &outcome.notifications);
    ctx.insert("view", &outcome.view);
    ctx.insert("course_id", query.course_id.as_deref().unwrap_or_default());
    ctx.insert("prompt", &outcome.prompt);

    let mut response = render_template("certificate.html", &ctx).into_response();
    if let Some(enrollment_id) = &outcome.mark_asked {
        append_asked_cookie(&mut response, enrollment_id);
    }
    response
}

pub async fn save_name(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Form(form): Form<NameForm>,
) -> Response {
    let prompt = NamingPrompt {
        enrollment_id: form.enrollment_id.clone(),
        course_id: form.course_id.clone(),
        prefill: String::new(),
    };

    let notice = match prompt
        .resolve(state.backend.as_ref(), &identity, PromptAction::Save(form.name))
        .await
    {
        Ok(_) => Notice::NameSaved,
        Err(NamingError::EmptyName) => Notice::NameRequired,
        Err(NamingError::EnrollmentNotFound) => Notice::EnrollmentMissing,
        Err(e) => {
            tracing::error!("Error saving certificate name: {}", e);
            Notice::NameSaveFailed
        }
    };

    let mut response = Redirect::to(&certificate_location(&form.course_id, Some(notice))).into_response();
    if !notice.reopens_prompt() {
        append_asked_cookie(&mut response, &form.enrollment_id);
    }
    response
}

pub async fn skip_name(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Form(form): Form<SkipForm>,
) -> Response {
    let prompt = NamingPrompt {
        enrollment_id: form.enrollment_id.clone(),
        course_id: form.course_id.clone(),
        prefill: String::new(),
    };
    let action = PromptAction::dismissal(form.reason.as_deref());
    if let Err(e) = prompt.resolve(state.backend.as_ref(), &identity, action).await {
        tracing::warn!("Dismissing naming prompt failed: {}", e);
    }

    let mut response = Redirect::to(&certificate_location(&form.course_id, None)).into_response();
    append_asked_cookie(&mut response, &form.enrollment_id);
    response
}

pub async fn courses_page(State(state): State<Arc<AppState>>) -> Html<String> {
    let mut main = Node::new("main").child(Node::new("h2").text("Popular Courses"));

    match state.backend.get_courses().await {
        Ok(courses) => {
            let mut container = Node::new("div").attr("id", COURSE_CONTAINER).class("course-grid");
            for course in courses.iter().take(COURSES_PAGE_SIZE) {
                container = container.child(course_card(course, &state.config.default_instructor));
            }
            main = main.child(container);
            if courses.len() > COURSES_PAGE_SIZE {
                main = main.child(
                    Node::new("button")
                        .attr("id", "load-more-courses")
                        .attr("type", "button")
                        .class("btn")
                        .text("Load more courses"),
                );
            }
        }
        Err(e) => {
            tracing::error!("Failed to load courses: {}", e);
            main = main.child(
                Node::new("p")
                    .class("notification notification-error")
                    .text("Courses could not be loaded. Please try again later."),
            );
        }
    }

    let mut body = Node::new("body")
        .child(
            Node::new("header")
                .class("site-header")
                .child(Node::new("a").attr("href", "/courses").text("BYAMN Courses")),
        )
        .child(main);
    enhance_document(&mut body);

    let mut ctx = Context::new();
    ctx.insert("body", &body.to_html());
    render_template("courses.html", &ctx)
}

/// Markup for one course card as it appears in the popular-courses grid.
pub(crate) fn course_card(course: &Course, default_instructor: &str) -> Node {
    let instructor = course.instructor.as_deref().unwrap_or(default_instructor);
    let mut card = Node::new("div")
        .class(COURSE_CARD)
        .child(Node::new("h3").class(COURSE_CARD_TITLE).text(&course.title))
        .child(Node::new("p").class("course-card-instructor").text(instructor));
    if let Some(description) = &course.description {
        card = card.child(Node::new("p").class("course-card-description").text(description));
    }
    card.child(
        Node::new("a")
            .class("btn")
            .attr("href", &format!("player.html?courseId={}", course.id))
            .text("Start Learning"),
    )
}

/// Path and query of the certificate page, with an optional notice code.
pub(crate) fn certificate_location(course_id: &str, notice: Option<Notice>) -> String {
    let mut url = reqwest::Url::parse("http://localhost/certificate").expect("static base url");
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("courseId", course_id);
        if let Some(notice) = notice {
            query.append_pair("notice", notice.code());
        }
    }
    format!("{}?{}", url.path(), url.query().unwrap_or_default())
}

fn append_asked_cookie(response: &mut Response, enrollment_id: &str) {
    let cookie = format!(
        "{}=true; Path=/; Max-Age={}; SameSite=Lax",
        asked_flag_name(enrollment_id),
        ASKED_COOKIE_MAX_AGE
    );
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(enrollment_id, "Cannot record asked flag: {}", e),
    }
}

pub(crate) fn render_template(name: &str, ctx: &Context) -> Html<String> {
    let rendered = crate::templates::render(name, ctx).unwrap_or_else(|e| {
        tracing::error!("Template error in {}: {}", name, e);
        format!("Template error: {}", name)
    });
    Html(rendered)
}
