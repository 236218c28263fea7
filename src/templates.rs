use std::sync::OnceLock;
use tera::{Context, Tera};

use crate::certificate::view::CertificateView;

const TEMPLATES: &[(&str, &str)] = &[
    ("certificate.html", include_str!("../templates/certificate.html")),
    ("certificate_card.html", include_str!("../templates/certificate_card.html")),
    ("courses.html", include_str!("../templates/courses.html")),
];

static TERA: OnceLock<Tera> = OnceLock::new();

pub fn get_tera() -> &'static Tera {
    TERA.get_or_init(|| {
        let mut tera = Tera::default();
        if let Err(e) = tera.add_raw_templates(TEMPLATES.iter().copied()) {
            tracing::error!(error = %e, "Failed to load templates");
        }
        tera
    })
}

pub fn render(name: &str, ctx: &Context) -> Result<String, tera::Error> {
    get_tera().render(name, ctx)
}

/// The certificate region on its own, as handed to the rasterizer.
pub fn render_certificate_card(view: &CertificateView) -> Result<String, tera::Error> {
    let mut ctx = Context::new();
    ctx.insert("view", view);
    render("certificate_card.html", &ctx)
}
