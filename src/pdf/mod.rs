// Certificate PDF assembly
// Uses genpdf - requires Liberation or similar fonts in standard paths
use genpdf::fonts::{FontCache, FontData, FontFamily};
use genpdf::render::Renderer;
use genpdf::style::{Color, Style};
use genpdf::{Mm, Position, Rotation, Scale, Size};
use std::path::PathBuf;
use thiserror::Error;

use crate::export::raster::Bitmap;

/// Landscape A4 in millimetres.
pub const PAGE_WIDTH_MM: f64 = 297.0;
pub const PAGE_HEIGHT_MM: f64 = 210.0;
const IMAGE_WIDTH_MM: f64 = 280.0;
const IMAGE_LEFT_MM: f64 = 5.0;
const TEXT_LEFT_MM: f64 = 10.0;
const METADATA_BASELINE_MM: f64 = PAGE_HEIGHT_MM - 10.0;
const LINE_SPACING_MM: f64 = 5.0;
const METADATA_FONT_SIZE: u8 = 10;
const METADATA_GREY: (u8, u8, u8) = (100, 100, 100);
const IMAGE_DPI: f64 = 300.0;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("No suitable fonts found. Install: apt install fonts-liberation")]
    FontsMissing,
    #[error("PDF rendering failed: {0}")]
    Render(#[from] genpdf::error::Error),
    #[error("image could not be embedded: {0}")]
    Image(#[from] image::ImageError),
    #[error("bitmap has no area")]
    EmptyBitmap,
}

/// Where the captured bitmap goes on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub image_x: f64,
    pub image_y: f64,
    pub image_width: f64,
    pub image_height: f64,
}

impl PageLayout {
    /// Fixed 280 mm width, height by aspect ratio, centred vertically.
    pub fn for_bitmap(width_px: u32, height_px: u32) -> Result<Self, PdfError> {
        if width_px == 0 || height_px == 0 {
            return Err(PdfError::EmptyBitmap);
        }
        let image_height = f64::from(height_px) * IMAGE_WIDTH_MM / f64::from(width_px);
        Ok(Self {
            image_x: IMAGE_LEFT_MM,
            image_y: (PAGE_HEIGHT_MM - image_height) / 2.0,
            image_width: IMAGE_WIDTH_MM,
            image_height,
        })
    }
}

/// Plain-text facts printed under the certificate image.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateMetadata {
    pub course_title: String,
    pub student_name: String,
    pub certificate_id: String,
    pub issue_date: String,
    pub instructor: String,
    pub verification_url: String,
}

impl CertificateMetadata {
    pub fn lines(&self) -> [String; 5] {
        [
            format!("Certificate: {}", self.course_title),
            format!("Student: {}", self.student_name),
            format!("Certificate ID: {}", self.certificate_id),
            format!("Issued: {} | Instructor: {}", self.issue_date, self.instructor),
            format!("Verified at: {}", self.verification_url),
        ]
    }
}

/// A single-page document with image and text primitives. Coordinates are
/// millimetres from the top left corner; text `y` is the baseline.
pub trait PdfWriter {
    fn add_image(&mut self, bitmap: &Bitmap, layout: &PageLayout) -> Result<(), PdfError>;
    fn set_font_size(&mut self, size: u8);
    fn set_text_color(&mut self, r: u8, g: u8, b: u8);
    fn text(&mut self, text: &str, x: f64, y: f64) -> Result<(), PdfError>;
    fn finish(self: Box<Self>) -> Result<Vec<u8>, PdfError>;
}

pub trait PdfEngine: Send + Sync {
    fn landscape_a4(&self, title: &str) -> Result<Box<dyn PdfWriter>, PdfError>;
}

pub fn assemble_certificate(
    engine: &dyn PdfEngine,
    bitmap: &Bitmap,
    metadata: &CertificateMetadata,
) -> Result<Vec<u8>, PdfError> {
    let layout = PageLayout::for_bitmap(bitmap.width, bitmap.height)?;
    let mut doc = engine.landscape_a4(&format!("Certificate: {}", metadata.course_title))?;

    doc.add_image(bitmap, &layout)?;

    doc.set_font_size(METADATA_FONT_SIZE);
    let (r, g, b) = METADATA_GREY;
    doc.set_text_color(r, g, b);
    for (i, line) in metadata.lines().iter().enumerate() {
        let y = METADATA_BASELINE_MM - 15.0 + LINE_SPACING_MM * i as f64;
        doc.text(line, TEXT_LEFT_MM, y)?;
    }

    doc.finish()
}

pub fn load_font_family(dirs: &[PathBuf]) -> Result<FontFamily<FontData>, PdfError> {
    dirs.iter()
        .filter(|p| p.exists())
        .find_map(|path| {
            ["LiberationSans", "DejaVuSans", "Arial"]
                .iter()
                .find_map(|name| genpdf::fonts::from_files(path, name, None).ok())
        })
        .ok_or(PdfError::FontsMissing)
}

/// genpdf backed engine. Fonts are located once at startup.
pub struct GenpdfEngine {
    fonts: FontFamily<FontData>,
}

impl GenpdfEngine {
    pub fn discover(dirs: &[PathBuf]) -> Result<Self, PdfError> {
        Ok(Self {
            fonts: load_font_family(dirs)?,
        })
    }
}

impl PdfEngine for GenpdfEngine {
    fn landscape_a4(&self, title: &str) -> Result<Box<dyn PdfWriter>, PdfError> {
        let renderer = Renderer::new(Size::new(PAGE_WIDTH_MM, PAGE_HEIGHT_MM), title)?;
        let mut fonts = FontCache::new(self.fonts.clone());
        fonts.load_pdf_fonts(&renderer)?;
        Ok(Box::new(GenpdfWriter {
            renderer,
            fonts,
            style: Style::new(),
        }))
    }
}

/// genpdf positions text by the top of the line box.
fn line_top(baseline: Mm, ascent: Mm) -> Mm {
    baseline - ascent
}

struct GenpdfWriter {
    renderer: Renderer,
    fonts: FontCache,
    style: Style,
}

impl PdfWriter for GenpdfWriter {
    fn add_image(&mut self, bitmap: &Bitmap, layout: &PageLayout) -> Result<(), PdfError> {
        // genpdf cannot embed an alpha channel; the capture background is white anyway.
        let decoded = image::load_from_memory(&bitmap.png)?;
        let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());

        let natural_width = f64::from(bitmap.width) / IMAGE_DPI * 25.4;
        let natural_height = f64::from(bitmap.height) / IMAGE_DPI * 25.4;
        let scale = Scale::new(
            layout.image_width / natural_width,
            layout.image_height / natural_height,
        );

        // Images are anchored at their lower left corner.
        let anchor = Position::new(
            Mm::from(layout.image_x),
            Mm::from(layout.image_y + layout.image_height),
        );
        let layer = self.renderer.first_page().first_layer();
        let area = layer.area();
        area.add_image(&rgb, anchor, scale, Rotation::default(), Some(IMAGE_DPI));
        Ok(())
    }

    fn set_font_size(&mut self, size: u8) {
        self.style.set_font_size(size);
    }

    fn set_text_color(&mut self, r: u8, g: u8, b: u8) {
        self.style.set_color(Color::Rgb(r, g, b));
    }

    fn text(&mut self, text: &str, x: f64, y: f64) -> Result<(), PdfError> {
        let ascent = self.style.metrics(&self.fonts).ascent;
        let layer = self.renderer.first_page().first_layer();
        let area = layer.area();
        area.print_str(
            &self.fonts,
            Position::new(Mm::from(x), line_top(Mm::from(y), ascent)),
            self.style,
            text,
        )?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, PdfError> {
        let mut out = Vec::new();
        self.renderer.write(&mut out)?;
        Ok(out)
    }
}
