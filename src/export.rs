use ab_glyph::{FontArc, PxScale};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut, text_size};
use std::io::Cursor;
use std::path::Path;
use tiny_skia::{
    ColorU8, FillRule, Paint, Path as SkPath, PathBuilder, Pixmap, Rect, Stroke, Transform,
};

use crate::canvas::Canvas;
use crate::document::{DocumentKind, SourceDocument};
use crate::error::ExportError;
use crate::geometry::Point;
use crate::shape::{triangle_points, Drawable, Geometry};
use crate::style::{Color, TextAlign, TextStyle};
use crate::text::TextBox;

const JPEG_QUALITY: u8 = 100;
/// Horizontal shift per pixel of height for exported italics.
const ITALIC_SLANT: f32 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportMode {
    /// Same format and file name as the upload.
    SaveOriginal,
    /// PNG named `<stem>_edited.png`.
    AsImage,
}

#[derive(Clone, Debug)]
pub struct ExportedFile {
    pub file_name: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl ExportedFile {
    pub fn mime(&self) -> &'static str {
        self.kind.mime()
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ExportError> {
        std::fs::write(path, &self.bytes).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

pub fn export_file_name(source: &SourceDocument, mode: ExportMode) -> String {
    match mode {
        ExportMode::SaveOriginal => format!("{}.{}", source.stem(), source.extension()),
        ExportMode::AsImage => format!("{}_edited.png", source.stem()),
    }
}

/// Flatten the canvas and encode it for download.
pub fn export_image(
    canvas: &Canvas,
    source: &SourceDocument,
    mode: ExportMode,
    font: Option<&FontArc>,
) -> Result<ExportedFile, ExportError> {
    let kind = match mode {
        ExportMode::SaveOriginal => source.kind(),
        ExportMode::AsImage => DocumentKind::Png,
    };
    let image = flatten(canvas, font)?;
    let bytes = encode(&image, kind)?;
    let file_name = export_file_name(source, mode);
    log::info!(
        "exported {file_name} ({}, {} bytes, {} annotations)",
        kind.mime(),
        bytes.len(),
        canvas.len()
    );
    Ok(ExportedFile {
        file_name,
        kind,
        bytes,
    })
}

pub fn encode(image: &RgbaImage, kind: DocumentKind) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Cursor::new(Vec::new());
    match kind {
        DocumentKind::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            DynamicImage::ImageRgb8(rgb)
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY))?;
        }
        _ => image.write_to(&mut buffer, ImageFormat::Png)?,
    }
    Ok(buffer.into_inner())
}

/// Composite background and annotations at the canvas's native size, in
/// stacking order.
///
/// Shapes go through the tiny-skia pixmap and text through imageproc on an
/// `RgbaImage`, so the surface is handed across whenever the kind changes.
pub fn flatten(canvas: &Canvas, font: Option<&FontArc>) -> Result<RgbaImage, ExportError> {
    let background = canvas.background().ok_or(ExportError::NoBackground)?;
    let (width, height) = (canvas.width(), canvas.height());
    let mut pixmap = Pixmap::new(width, height).ok_or(ExportError::Surface { width, height })?;
    copy_image_to_pixmap(background, &mut pixmap);

    let mut raster: Option<RgbaImage> = None;
    let mut skipped = 0;
    for object in canvas.objects() {
        match (object.text(), font) {
            (Some(text), _) if text.is_empty() => {}
            (Some(text), Some(font)) => {
                let image = raster.get_or_insert_with(|| pixmap_to_image(&pixmap));
                draw_text_box(image, text, font);
            }
            (Some(_), None) => skipped += 1,
            (None, _) => {
                if let Some(image) = raster.take() {
                    copy_image_to_pixmap(&image, &mut pixmap);
                }
                draw_shape(&mut pixmap, object)?;
            }
        }
    }
    if skipped > 0 {
        log::warn!("no font available, {skipped} text annotations not exported");
    }
    Ok(raster.unwrap_or_else(|| pixmap_to_image(&pixmap)))
}

fn copy_image_to_pixmap(image: &RgbaImage, pixmap: &mut Pixmap) {
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
}

fn pixmap_to_image(pixmap: &Pixmap) -> RgbaImage {
    let mut out = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}

fn paint_for(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

fn polygon_path(points: &[Point]) -> Option<SkPath> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x, first.y);
    for p in rest {
        pb.line_to(p.x, p.y);
    }
    pb.close();
    pb.finish()
}

fn draw_shape(pixmap: &mut Pixmap, object: &Drawable) -> Result<(), ExportError> {
    let bounds = object.bounds();
    if matches!(object.geometry, Geometry::Text(_)) {
        return Ok(());
    }
    if bounds.width <= 0.0 && bounds.height <= 0.0 {
        log::debug!("skipping zero-extent object {}", object.id);
        return Ok(());
    }

    let path = match &object.geometry {
        Geometry::Line { start, end } => {
            let mut pb = PathBuilder::new();
            pb.move_to(start.x, start.y);
            pb.line_to(end.x, end.y);
            pb.finish()
        }
        Geometry::Rectangle(b) | Geometry::Highlight(b) | Geometry::Cover(b) => {
            Rect::from_xywh(b.left, b.top, b.width.max(0.5), b.height.max(0.5))
                .map(PathBuilder::from_rect)
        }
        Geometry::Triangle(b) => polygon_path(&triangle_points(b)),
        Geometry::Circle { center, radius } => PathBuilder::from_circle(center.x, center.y, *radius),
        Geometry::Ellipse { center, rx, ry } => Rect::from_xywh(
            center.x - rx,
            center.y - ry,
            (rx * 2.0).max(0.5),
            (ry * 2.0).max(0.5),
        )
        .and_then(PathBuilder::from_oval),
        Geometry::Polygon { points } => polygon_path(points),
        Geometry::Text(_) => None,
    };
    let path = path.ok_or(ExportError::Path(object.id))?;

    let is_line = matches!(object.geometry, Geometry::Line { .. });
    if let Some(fill) = object.style.fill.filter(|c| !c.is_transparent() && !is_line) {
        pixmap.fill_path(
            &path,
            &paint_for(fill),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }
    if object.style.stroke_width > 0.0 && !object.style.stroke.is_transparent() {
        let stroke = Stroke {
            width: object.style.stroke_width,
            ..Default::default()
        };
        pixmap.stroke_path(
            &path,
            &paint_for(object.style.stroke),
            &stroke,
            Transform::identity(),
            None,
        );
    }
    Ok(())
}

struct LaidOutLine {
    segments: Vec<(String, TextStyle, f32)>,
    width: f32,
    height: f32,
}

fn layout_lines(text: &TextBox, font: &FontArc) -> Vec<LaidOutLine> {
    let empty_line = || LaidOutLine {
        segments: Vec::new(),
        width: 0.0,
        height: text.style.font_size * 1.2,
    };
    let mut lines = vec![empty_line()];
    for (content, style) in text.segments() {
        for (i, piece) in content.split('\n').enumerate() {
            if i > 0 {
                lines.push(empty_line());
            }
            if piece.is_empty() {
                continue;
            }
            let (w, _) = text_size(PxScale::from(style.font_size), font, piece);
            if let Some(line) = lines.last_mut() {
                line.width += w as f32;
                line.height = line.height.max(style.font_size * 1.2);
                line.segments.push((piece.to_string(), style.clone(), w as f32));
            }
        }
    }
    lines
}

fn draw_text_box(image: &mut RgbaImage, text: &TextBox, font: &FontArc) {
    if text.is_empty() {
        return;
    }
    let lines = layout_lines(text, font);
    let block_width = lines.iter().map(|l| l.width).fold(0.0, f32::max);

    let mut y = text.origin.y;
    for line in &lines {
        let mut x = text.origin.x
            + match text.style.align {
                TextAlign::Left => 0.0,
                TextAlign::Center => (block_width - line.width) / 2.0,
                TextAlign::Right => block_width - line.width,
            };
        for (piece, style, width) in &line.segments {
            let color = Rgba(style.color.to_array());
            let scale = PxScale::from(style.font_size);
            let passes = if style.bold { 2 } else { 1 };
            for dx in 0..passes {
                let at = (x as i32 + dx, y as i32);
                if style.italic {
                    draw_slanted(image, piece, color, at, scale, font, line.height);
                } else {
                    draw_text_mut(image, color, at.0, at.1, scale, font, piece);
                }
            }
            if style.underline {
                let baseline = y + style.font_size * 1.05;
                draw_line_segment_mut(image, (x, baseline), (x + width, baseline), color);
            }
            x += width;
        }
        y += line.height;
    }
}

/// Faux italic: the run is rasterized upright into a transparent layer whose
/// rows are then sheared right towards the top while blending onto `image`.
fn draw_slanted(
    image: &mut RgbaImage,
    piece: &str,
    color: Rgba<u8>,
    (x, y): (i32, i32),
    scale: PxScale,
    font: &FontArc,
    height: f32,
) {
    let (w, _) = text_size(scale, font, piece);
    let h = height.ceil().max(1.0) as u32;
    let mut layer = RgbaImage::from_pixel(w + 2, h, Rgba([color[0], color[1], color[2], 0]));
    draw_text_mut(&mut layer, color, 0, 0, scale, font, piece);

    let (width, height) = (i64::from(image.width()), i64::from(image.height()));
    for (lx, ly, px) in layer.enumerate_pixels() {
        let coverage = px[3];
        if coverage == 0 {
            continue;
        }
        let shift = ((h - ly) as f32 * ITALIC_SLANT).round() as i64;
        let tx = i64::from(x) + i64::from(lx) + shift;
        let ty = i64::from(y) + i64::from(ly);
        if tx < 0 || ty < 0 || tx >= width || ty >= height {
            continue;
        }
        let dst = image.get_pixel_mut(tx as u32, ty as u32);
        let a = f32::from(coverage) / 255.0;
        for c in 0..3 {
            dst[c] = (f32::from(dst[c]) * (1.0 - a) + f32::from(color[c]) * a).round() as u8;
        }
        dst[3] = dst[3].max(coverage);
    }
}

/// Font for rasterizing text: the configured file if it loads, otherwise
/// egui's bundled proportional face.
pub fn load_font(path: Option<&Path>) -> Option<FontArc> {
    if let Some(path) = path {
        match std::fs::read(path).map(FontArc::try_from_vec) {
            Ok(Ok(font)) => return Some(font),
            Ok(Err(err)) => log::warn!("font {} is not usable: {err}", path.display()),
            Err(err) => log::warn!("cannot read font {}: {err}", path.display()),
        }
    }
    let defs = egui::FontDefinitions::default();
    let name = defs
        .families
        .get(&egui::FontFamily::Proportional)
        .and_then(|names| names.first())?;
    let data = defs.font_data.get(name)?;
    FontArc::try_from_vec(data.font.to_vec()).ok()
}
