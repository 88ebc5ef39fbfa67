//! Renders one certificate: the template image as a full-page background with
//! each editable field drawn as text on top, in a single-page PDF sized to the
//! template.
//!
//! Field text is written as PDF text objects rather than burnt into the image,
//! so it stays selectable and searchable.

use crate::error::AppError;
use common::model::field::{Field, TextAlign};
use genpdf::elements::Image as PdfImage;
use genpdf::fonts::{FontData, FontFamily};
use genpdf::render::Area;
use genpdf::style::{Color, Style};
use genpdf::{Context, Document, Element, Mm, Position, RenderResult, Size};
use image::imageops::FilterType;
use image::{load_from_memory, DynamicImage, GenericImageView};
use log::{debug, warn};
use png::{BitDepth as PngBitDepth, ColorType as PngColorType, Encoder as PngEncoder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;

/// Template coordinates are CSS pixels.
pub const TEMPLATE_DPI: f64 = 96.0;
const MM_PER_INCH: f64 = 25.4;
/// Larger templates are downscaled before embedding.
const MAX_EMBED_PX: u32 = 4000;

pub fn px_to_mm(px: f64) -> f64 {
    px / TEMPLATE_DPI * MM_PER_INCH
}

/// Parses `#rrggbb`.
pub fn parse_hex_color(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// A template image prepared for embedding: alpha flattened over white and
/// re-encoded as an RGB PNG on disk, where genpdf reads it from.
pub struct TemplateArtwork {
    width_px: u32,
    height_px: u32,
    embed_dpi: f64,
    png: NamedTempFile,
}

impl TemplateArtwork {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let bytes = std::fs::read(path).map_err(|e| {
            AppError::Render(format!("cannot read template image '{}': {e}", path.display()))
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AppError> {
        let img = load_from_memory(bytes)
            .map_err(|e| AppError::Render(format!("cannot decode template image: {e}")))?;
        let (width_px, height_px) = img.dimensions();
        if width_px == 0 || height_px == 0 {
            return Err(AppError::Render("template image is empty".to_string()));
        }

        let longest = width_px.max(height_px);
        let (img, embed_dpi) = if longest > MAX_EMBED_PX {
            let scale = MAX_EMBED_PX as f64 / longest as f64;
            let new_w = ((width_px as f64 * scale).round() as u32).max(1);
            let new_h = ((height_px as f64 * scale).round() as u32).max(1);
            (
                img.resize_exact(new_w, new_h, FilterType::Lanczos3),
                TEMPLATE_DPI * new_w as f64 / width_px as f64,
            )
        } else {
            (img, TEMPLATE_DPI)
        };

        // Flatten alpha channel over white background and convert to RGB
        let rgba = img.to_rgba8();
        let (w, h) = rgba.dimensions();
        let mut background = image::RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255]));
        image::imageops::overlay(&mut background, &rgba, 0, 0);
        let raw = DynamicImage::ImageRgba8(background).to_rgb8().into_raw();

        let mut png = NamedTempFile::new()?;
        {
            let file = png.as_file_mut();
            let mut encoder = PngEncoder::new(file, w, h);
            encoder.set_color(PngColorType::Rgb);
            encoder.set_depth(PngBitDepth::Eight);
            let mut writer = encoder
                .write_header()
                .map_err(|e| AppError::Render(e.to_string()))?;
            writer
                .write_image_data(&raw)
                .map_err(|e| AppError::Render(e.to_string()))?;
        }

        Ok(Self {
            width_px,
            height_px,
            embed_dpi,
            png,
        })
    }

    pub fn width_px(&self) -> u32 {
        self.width_px
    }

    pub fn height_px(&self) -> u32 {
        self.height_px
    }

    /// Page size in millimetres; the template image covers it exactly.
    pub fn page_size_mm(&self) -> (f64, f64) {
        (
            px_to_mm(self.width_px as f64),
            px_to_mm(self.height_px as f64),
        )
    }

    pub fn png_path(&self) -> &Path {
        self.png.path()
    }
}

/// Turns a template and a list of filled fields into PDF bytes.
pub trait CertificateRenderer: Send + Sync {
    /// Each editable field is drawn with its `sample_value` as text.
    fn render(&self, artwork: &TemplateArtwork, fields: &[Field]) -> Result<Vec<u8>, AppError>;
}

fn render_err(e: impl std::fmt::Display) -> AppError {
    AppError::Render(e.to_string())
}

/// genpdf-backed renderer loading TrueType families from a fonts directory.
pub struct PdfRenderer {
    fonts_dir: PathBuf,
    default_font: String,
    families: Mutex<HashMap<String, FontFamily<FontData>>>,
}

impl PdfRenderer {
    pub fn new(fonts_dir: impl Into<PathBuf>, default_font: impl Into<String>) -> Self {
        Self {
            fonts_dir: fonts_dir.into(),
            default_font: default_font.into(),
            families: Mutex::new(HashMap::new()),
        }
    }

    /// Loads `<name>-{Regular,Bold,Italic,BoldItalic}.ttf`, once per family.
    fn font_family(&self, name: &str) -> Result<FontFamily<FontData>, AppError> {
        let mut families = self.families.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(family) = families.get(name) {
            return Ok(family.clone());
        }
        let family = genpdf::fonts::from_files(&self.fonts_dir, name, None).map_err(|e| {
            AppError::Render(format!(
                "font family '{name}' not found in '{}': {e}",
                self.fonts_dir.display()
            ))
        })?;
        debug!("loaded font family '{name}'");
        families.insert(name.to_string(), family.clone());
        Ok(family)
    }
}

impl CertificateRenderer for PdfRenderer {
    fn render(&self, artwork: &TemplateArtwork, fields: &[Field]) -> Result<Vec<u8>, AppError> {
        let mut doc = Document::new(self.font_family(&self.default_font)?);
        doc.set_title("Certificate");
        let (width_mm, height_mm) = artwork.page_size_mm();
        doc.set_paper_size(Size::new(width_mm, height_mm));

        let mut added = HashMap::new();
        let mut texts = Vec::new();
        for field in fields.iter().filter(|f| f.is_editable()) {
            if field.sample_value.is_empty() {
                continue;
            }
            let mut style = Style::new().with_font_size(field.font_size);
            if let Some((r, g, b)) = parse_hex_color(&field.color) {
                style = style.with_color(Color::Rgb(r, g, b));
            }
            if let Some(name) = field
                .font_family
                .as_deref()
                .filter(|name| *name != self.default_font)
            {
                if !added.contains_key(name) {
                    match self.font_family(name) {
                        Ok(family) => {
                            added.insert(name.to_string(), doc.add_font_family(family));
                        }
                        Err(e) => warn!("{e}; using '{}'", self.default_font),
                    }
                }
                if let Some(family) = added.get(name) {
                    style = style.with_font_family(*family);
                }
            }
            texts.push(PlacedText {
                text: field.sample_value.clone(),
                x: px_to_mm(field.x),
                y: px_to_mm(field.y),
                alignment: field.alignment,
                style,
            });
        }

        let mut background = PdfImage::from_path(artwork.png_path()).map_err(render_err)?;
        background.set_dpi(artwork.embed_dpi);
        doc.push(CertificatePage { background, texts });

        let mut out = Vec::new();
        doc.render(&mut out).map_err(render_err)?;
        Ok(out)
    }
}

struct PlacedText {
    text: String,
    x: f64,
    y: f64,
    alignment: TextAlign,
    style: Style,
}

/// The background image plus absolutely positioned text, on one page.
struct CertificatePage {
    background: PdfImage,
    texts: Vec<PlacedText>,
}

impl Element for CertificatePage {
    fn render(
        &mut self,
        context: &Context,
        area: Area<'_>,
        style: Style,
    ) -> Result<RenderResult, genpdf::error::Error> {
        let mut result = self.background.render(context, area.clone(), style)?;
        for text in &self.texts {
            let width = text.style.str_width(&context.font_cache, &text.text);
            let anchor = Mm::from(text.x);
            let x = match text.alignment {
                TextAlign::Left => anchor,
                TextAlign::Center => anchor - width / 2.0,
                TextAlign::Right => anchor - width,
            };
            let position = Position::new(x, Mm::from(text.y));
            if !area.print_str(&context.font_cache, position, text.style, &text.text)? {
                warn!("text '{}' does not fit on the certificate page", text.text);
            }
        }
        result.has_more = false;
        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 0]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_hex_color("#ff8000"), Some((255, 128, 0)));
        assert_eq!(parse_hex_color(" #000000 "), Some((0, 0, 0)));
        assert_eq!(parse_hex_color("ff8000"), None);
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
    }

    #[test]
    fn pixels_convert_at_96_dpi() {
        assert!((px_to_mm(96.0) - 25.4).abs() < 1e-9);
        assert!((px_to_mm(0.0)).abs() < 1e-9);
    }

    #[test]
    fn artwork_is_flattened_to_rgb_and_keeps_its_size() {
        let artwork = TemplateArtwork::from_bytes(&png_bytes(192, 96)).unwrap();
        assert_eq!(artwork.width_px(), 192);
        assert_eq!(artwork.height_px(), 96);
        let (w, h) = artwork.page_size_mm();
        assert!((w - 50.8).abs() < 1e-9);
        assert!((h - 25.4).abs() < 1e-9);

        let embedded = load_from_memory(&std::fs::read(artwork.png_path()).unwrap()).unwrap();
        assert_eq!(embedded.color(), image::ColorType::Rgb8);
        // Fully transparent pixels land on white.
        assert_eq!(embedded.to_rgb8().get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn undecodable_artwork_is_a_render_error() {
        assert!(matches!(
            TemplateArtwork::from_bytes(b"not an image"),
            Err(AppError::Render(_))
        ));
    }

    #[test]
    fn missing_fonts_fail_the_render() {
        let dir = tempfile::TempDir::new().unwrap();
        let renderer = PdfRenderer::new(dir.path(), "NoSuchFont");
        let artwork = TemplateArtwork::from_bytes(&png_bytes(10, 10)).unwrap();
        let mut field = Field::new("name", "Name");
        field.sample_value = "Alice".into();
        let err = renderer.render(&artwork, &[field]).unwrap_err();
        assert!(err.to_string().contains("NoSuchFont"));
    }

    const SYSTEM_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

    /// A fonts directory holding one system TrueType font under all four
    /// style names, or `None` when the machine has no such font.
    pub(crate) fn dejavu_fonts() -> Option<tempfile::TempDir> {
        let source = Path::new(SYSTEM_FONT);
        if !source.exists() {
            eprintln!("skipping: {SYSTEM_FONT} is not installed");
            return None;
        }
        let dir = tempfile::TempDir::new().unwrap();
        for style in ["Regular", "Bold", "Italic", "BoldItalic"] {
            std::fs::copy(source, dir.path().join(format!("DejaVuSans-{style}.ttf"))).unwrap();
        }
        Some(dir)
    }

    /// Operators drawn on the only page of `pdf`, and that page's MediaBox.
    pub(crate) fn single_page(pdf: &[u8]) -> (Vec<String>, Vec<f32>) {
        let doc = lopdf::Document::load_mem(pdf).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = *pages.values().next().unwrap();

        let content = doc.get_page_content(page_id).unwrap();
        let operators = lopdf::content::Content::decode(&content)
            .unwrap()
            .operations
            .into_iter()
            .map(|op| op.operator)
            .collect();

        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = match page.get(b"MediaBox") {
            Ok(media_box) => media_box.clone(),
            Err(_) => {
                let parent = page.get(b"Parent").unwrap().as_reference().unwrap();
                doc.get_dictionary(parent)
                    .unwrap()
                    .get(b"MediaBox")
                    .unwrap()
                    .clone()
            }
        };
        let media_box = media_box
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n.as_float().unwrap())
            .collect();
        (operators, media_box)
    }

    #[test]
    fn renders_one_page_sized_to_the_template_with_the_field_text() {
        let Some(fonts) = dejavu_fonts() else { return };
        let renderer = PdfRenderer::new(fonts.path(), "DejaVuSans");
        let artwork = TemplateArtwork::from_bytes(&png_bytes(800, 600)).unwrap();

        let mut name = Field::new("name", "Name").at(400.0, 250.0);
        name.sample_value = "Alice Example".into();
        name.alignment = TextAlign::Center;
        name.color = "#1a2b3c".into();
        let mut date = Field::new("date", "Date").at(700.0, 550.0);
        date.sample_value = "2024-01-01".into();
        date.alignment = TextAlign::Right;
        let mut hidden = Field::new("code", "Code");
        hidden.sample_value = "never drawn".into();
        hidden.visible = false;

        let pdf = renderer.render(&artwork, &[name, date, hidden]).unwrap();
        assert!(pdf.starts_with(b"%PDF"));

        let (operators, media_box) = single_page(&pdf);
        // 800x600 px at 96 DPI is 600x450 pt.
        assert_eq!(media_box.len(), 4);
        assert!((media_box[2] - media_box[0] - 600.0).abs() < 1.0, "{media_box:?}");
        assert!((media_box[3] - media_box[1] - 450.0).abs() < 1.0, "{media_box:?}");

        let texts = operators.iter().filter(|op| *op == "Tj" || *op == "TJ").count();
        assert_eq!(texts, 2, "{operators:?}");
        assert!(operators.iter().any(|op| op == "Do"), "background image missing");
    }

    #[test]
    fn fields_without_a_value_draw_only_the_background() {
        let Some(fonts) = dejavu_fonts() else { return };
        let renderer = PdfRenderer::new(fonts.path(), "DejaVuSans");
        let artwork = TemplateArtwork::from_bytes(&png_bytes(200, 100)).unwrap();

        let pdf = renderer.render(&artwork, &[Field::new("name", "Name")]).unwrap();
        let (operators, _) = single_page(&pdf);
        assert!(!operators.iter().any(|op| op == "Tj" || op == "TJ"));
        assert!(operators.iter().any(|op| op == "Do"));
    }
}
