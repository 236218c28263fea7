mod a11y;
mod auth;
mod certificate;
mod config;
mod db;
mod export;
mod pdf;
mod routes;
mod state;
mod templates;

use std::sync::Arc;

use a11y::bus::InsertionBus;
use a11y::{Enhancer, COURSE_CONTAINER};
use export::raster::{HttpRasterizer, Rasterizer};
use pdf::{GenpdfEngine, PdfEngine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coursecert=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;
    let config = Arc::new(config);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;

    let rasterizer: Option<Arc<dyn Rasterizer>> = match &config.rasterizer_url {
        Some(url) => Some(Arc::new(HttpRasterizer::new(url.clone(), config.export_timeout)?)),
        None => {
            tracing::warn!("RASTERIZER_URL not set, certificate downloads are disabled");
            None
        }
    };

    let pdf: Option<Arc<dyn PdfEngine>> = match GenpdfEngine::discover(&config.font_dirs) {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            tracing::warn!("PDF engine unavailable: {}", e);
            None
        }
    };

    let bus = InsertionBus::new();
    bus.subscribe(Arc::new(Enhancer::watching(COURSE_CONTAINER))).await;

    let state = Arc::new(state::AppState {
        backend: Arc::new(db::PgBackend::new(pool)),
        config: config.clone(),
        rasterizer,
        pdf,
        bus,
    });

    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Certificate service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
