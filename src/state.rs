use crate::a11y::bus::InsertionBus;
use crate::config::Config;
use crate::db::Backend;
use crate::export::raster::Rasterizer;
use crate::pdf::PdfEngine;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub config: Arc<Config>,
    pub rasterizer: Option<Arc<dyn Rasterizer>>,
    pub pdf: Option<Arc<dyn PdfEngine>>,
    pub bus: InsertionBus,
}
