//! Accessibility enhancement for rendered pages.
//!
//! Course cards become keyboard-focusable buttons with a descriptive label,
//! a skip link is added ahead of the page content, and buttons or form inputs
//! without an accessible name are reported.

pub mod bus;
pub mod node;

use tracing::warn;

use bus::InsertionSubscriber;
use node::Node;

pub const COURSE_CARD: &str = "course-card";
pub const COURSE_CARD_TITLE: &str = "course-card-title";
pub const COURSE_CONTAINER: &str = "popular-courses-container";
pub const MAIN_CONTENT_ID: &str = "main-content";
const SKIP_LINK_CLASS: &str = "skip-to-main";
const ACTIVATION_ATTR: &str = "data-activate-href";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum A11yWarning {
    UnnamedButton,
    UnlabelledInput { id: Option<String> },
}

fn is_course_card(node: &Node) -> bool {
    node.has_class(COURSE_CARD)
}

fn is_enroll_link(node: &Node) -> bool {
    node.tag == "a"
        && node
            .get_attr("href")
            .map(|href| href.contains("player.html"))
            .unwrap_or(false)
}

/// The player link a card opens when activated from the keyboard.
pub fn activation_target(card: &Node) -> Option<&str> {
    card.find(&is_enroll_link).and_then(|a| a.get_attr("href"))
}

fn tag_card(card: &mut Node) {
    card.set_attr("tabindex", "0");
    card.set_attr("role", "button");

    let title = card
        .find(&|n: &Node| n.has_class(COURSE_CARD_TITLE))
        .map(|t| t.text_content().trim().to_string());
    if let Some(title) = title {
        card.set_attr("aria-label", &format!("View course: {}", title));
    }

    if let Some(href) = activation_target(card).map(str::to_string) {
        card.set_attr(ACTIVATION_ATTR, &href);
    }
}

/// Tags every course card under `root`. Safe to run repeatedly.
pub fn tag_course_cards(root: &mut Node) -> usize {
    root.for_each_mut(&is_course_card, &mut tag_card)
}

/// Enter or Space on a card resolves to the card's player link.
pub fn handle_card_key<'a>(card: &'a Node, key: &str) -> Option<&'a str> {
    match key {
        "Enter" | " " => activation_target(card),
        _ => None,
    }
}

pub fn audit_buttons(root: &Node) -> Vec<A11yWarning> {
    root.find_all(&|n: &Node| n.has_class("btn"))
        .into_iter()
        .filter(|b| !b.has_attr("aria-label") && b.text_content().trim().is_empty())
        .map(|_| A11yWarning::UnnamedButton)
        .collect()
}

pub fn audit_forms(root: &Node) -> Vec<A11yWarning> {
    let mut warnings = Vec::new();
    for form in root.find_all(&|n: &Node| n.tag == "form") {
        let inputs = form.find_all(&|n: &Node| matches!(n.tag.as_str(), "input" | "textarea" | "select"));
        for input in inputs {
            let labelled = input.id().is_some_and(|id| {
                form.find(&|n: &Node| n.tag == "label" && n.get_attr("for") == Some(id))
                    .is_some()
            });
            if !labelled && !input.has_attr("aria-label") {
                warnings.push(A11yWarning::UnlabelledInput {
                    id: input.id().map(str::to_string),
                });
            }
        }
    }
    warnings
}

/// Puts a skip link first in `body` and makes sure `main` has an id to target.
pub fn add_skip_link(body: &mut Node) {
    let already = body
        .children
        .first()
        .is_some_and(|first| first.has_class(SKIP_LINK_CLASS));
    if !already {
        let link = Node::new("a")
            .attr("href", &format!("#{}", MAIN_CONTENT_ID))
            .class(SKIP_LINK_CLASS)
            .attr("aria-label", "Skip to main content")
            .text("Skip to main content");
        body.children.insert(0, link);
    }

    body.for_each_mut(&|n: &Node| n.tag == "main" && n.id().is_none(), &mut |main: &mut Node| {
        main.set_attr("id", MAIN_CONTENT_ID)
    });
}

/// Full pass over a freshly rendered page body.
pub fn enhance_document(body: &mut Node) -> Vec<A11yWarning> {
    tag_course_cards(body);
    let mut warnings = audit_buttons(body);
    add_skip_link(body);
    warnings.extend(audit_forms(body));

    for warning in &warnings {
        match warning {
            A11yWarning::UnnamedButton => warn!("Button without text or aria-label found"),
            A11yWarning::UnlabelledInput { id } => {
                warn!(input_id = ?id, "Input without label or aria-label")
            }
        }
    }
    warnings
}

/// Re-tags course cards in fragments inserted into a watched container.
pub struct Enhancer {
    containers: Vec<String>,
}

impl Enhancer {
    pub fn watching(container: &str) -> Self {
        Self {
            containers: vec![container.to_string()],
        }
    }
}

impl InsertionSubscriber for Enhancer {
    fn name(&self) -> &str {
        "accessibility"
    }

    fn containers(&self) -> Vec<String> {
        self.containers.clone()
    }

    fn on_inserted(&self, container: &str, fragment: &mut Node) {
        let tagged = tag_course_cards(fragment);
        if tagged > 0 {
            tracing::debug!(container, tagged, "tagged inserted course cards");
        }
    }
}
