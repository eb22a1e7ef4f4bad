use ab_glyph::FontArc;
use anyhow::{Context as _, Result};
use eframe::egui;
use egui::text::LayoutJob;
use std::path::{Path, PathBuf};

use doc_annotate::export::export_file_name;
use doc_annotate::shape::{ellipse_points, triangle_points};
use doc_annotate::style::{FONT_FAMILIES, FONT_SIZES};
use doc_annotate::{
    Color, Drawable, Editor, ExportMode, Geometry, HighlightStyle, InputEvent, Key, Point,
    ShapeKind, ShapeStyle, TextAlign, TextBox, TextStyle, ToolMode,
};

pub const APP_NAME: &str = "doc-annotate";

const SELECTION_BLUE: egui::Color32 = egui::Color32::from_rgb(0, 120, 255);

fn to_egui(c: Color) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(c.r, c.g, c.b, c.a)
}

fn from_egui(c: egui::Color32) -> Color {
    let [r, g, b, a] = c.to_srgba_unmultiplied();
    Color::rgba(r, g, b, a)
}

enum Status {
    Info(String),
    Error(String),
}

/// Answer to "save your annotations first?".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UnsavedChoice {
    Save,
    Discard,
    Cancel,
}

fn ask_unsaved(action: &str) -> UnsavedChoice {
    let answer = rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Warning)
        .set_title("Unsaved changes")
        .set_description(format!("Save your annotations before {action}?"))
        .set_buttons(rfd::MessageButtons::YesNoCancel)
        .show();
    match answer {
        rfd::MessageDialogResult::Yes => UnsavedChoice::Save,
        rfd::MessageDialogResult::No => UnsavedChoice::Discard,
        _ => UnsavedChoice::Cancel,
    }
}

/// Whether an action that drops the current annotations may go ahead.
/// Only asks when there is something to lose; choosing to save proceeds
/// only if the save went through.
fn may_discard(
    dirty: bool,
    ask: impl FnOnce() -> UnsavedChoice,
    save: impl FnOnce() -> bool,
) -> bool {
    if !dirty {
        return true;
    }
    match ask() {
        UnsavedChoice::Save => save(),
        UnsavedChoice::Discard => true,
        UnsavedChoice::Cancel => false,
    }
}

/// Which style controls the side panel shows.
#[derive(Clone, Copy, PartialEq, Eq)]
enum StyleTarget {
    Shape,
    Highlight,
    Cover,
    Text,
    Nothing,
}

pub struct DocAnnotateApp {
    editor: Editor,
    font: Option<FontArc>,
    texture: Option<egui::TextureHandle>,

    pan: egui::Vec2,
    zoom: f32,
    panning: bool,
    fit_pending: bool,
    pointer_captured: bool,

    status: Option<Status>,
    title: String,
}

impl DocAnnotateApp {
    pub fn new(editor: Editor, font: Option<FontArc>, startup_error: Option<String>) -> Self {
        Self {
            editor,
            font,
            texture: None,
            pan: egui::Vec2::ZERO,
            zoom: 1.0,
            panning: false,
            fit_pending: true,
            pointer_captured: false,
            status: startup_error.map(Status::Error),
            title: String::new(),
        }
    }

    // ── Files ───────────────────────────────────────────────────────────

    fn after_load(&mut self) {
        self.texture = None;
        self.pan = egui::Vec2::ZERO;
        self.fit_pending = true;
        self.pointer_captured = false;
        self.status = None;
    }

    fn report(&mut self, err: anyhow::Error) {
        log::warn!("{err:#}");
        self.status = Some(Status::Error(format!("{err:#}")));
    }

    fn open_path(&mut self, path: &Path) {
        match self.editor.open_path(path) {
            Ok(()) => self.after_load(),
            Err(err) => self.report(anyhow::Error::new(err).context(format!(
                "cannot open {}",
                path.display()
            ))),
        }
    }

    fn confirm_discard(&mut self, action: &str) -> bool {
        let dirty = self.editor.has_unsaved_changes();
        may_discard(dirty, || ask_unsaved(action), || {
            self.save(ExportMode::SaveOriginal)
        })
    }

    fn open_dialog(&mut self) {
        if !self.confirm_discard("opening another file") {
            return;
        }
        let file = rfd::FileDialog::new()
            .set_title("Open document")
            .add_filter("Images", &["png", "jpg", "jpeg"])
            .add_filter("All files", &["*"])
            .pick_file();
        if let Some(path) = file {
            self.open_path(&path);
        }
    }

    /// Returns whether a file was written.
    fn save(&mut self, mode: ExportMode) -> bool {
        match self.save_to_file(mode) {
            Ok(Some(path)) => {
                self.status = Some(Status::Info(format!("Saved {}", path.display())));
                true
            }
            Ok(None) => false,
            Err(err) => {
                self.report(err);
                false
            }
        }
    }

    fn save_to_file(&mut self, mode: ExportMode) -> Result<Option<PathBuf>> {
        let Some(source) = self.editor.source() else {
            return Ok(None);
        };
        let file_name = export_file_name(source, mode);
        let ext = Path::new(&file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png")
            .to_string();

        let file = rfd::FileDialog::new()
            .set_title("Save annotated document")
            .set_file_name(&file_name)
            .add_filter(ext.to_uppercase(), &[ext.as_str()])
            .save_file();
        let Some(path) = file else {
            return Ok(None);
        };

        self.editor
            .export_to(mode, self.font.as_ref(), &path)
            .context("export failed")?;
        Ok(Some(path))
    }

    // ── View transform ──────────────────────────────────────────────────

    fn image_size(&self) -> egui::Vec2 {
        let canvas = self.editor.canvas();
        egui::vec2(canvas.width() as f32, canvas.height() as f32)
    }

    fn to_screen(&self, canvas_rect: egui::Rect, p: Point) -> egui::Pos2 {
        canvas_rect.center() + self.pan + (egui::vec2(p.x, p.y) - self.image_size() * 0.5) * self.zoom
    }

    fn to_canvas(&self, canvas_rect: egui::Rect, screen: egui::Pos2) -> Point {
        let rel = (screen - canvas_rect.center() - self.pan) / self.zoom + self.image_size() * 0.5;
        Point::new(rel.x, rel.y)
    }

    fn image_rect_on_screen(&self, canvas_rect: egui::Rect) -> egui::Rect {
        let size = self.image_size();
        egui::Rect::from_min_max(
            self.to_screen(canvas_rect, Point::default()),
            self.to_screen(canvas_rect, Point::new(size.x, size.y)),
        )
    }

    fn fit_to(&mut self, canvas_rect: egui::Rect) {
        let size = self.image_size();
        if size.x > 0.0 && size.y > 0.0 {
            let fit = (canvas_rect.width() / size.x).min(canvas_rect.height() / size.y);
            self.zoom = fit.clamp(0.1, 1.0);
        }
        self.pan = egui::Vec2::ZERO;
        self.fit_pending = false;
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        if self.texture.is_some() {
            return;
        }
        if let Some(rgba) = self.editor.canvas().background() {
            let size = [rgba.width() as usize, rgba.height() as usize];
            let pixels = rgba.as_flat_samples();
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
            self.texture = Some(ctx.load_texture("background", color_image, egui::TextureOptions::LINEAR));
        }
    }

    // ── Input ───────────────────────────────────────────────────────────

    fn handle_keyboard(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let mut events = Vec::new();
        let (mut undo, mut redo, mut open, mut save) = (false, false, false, false);
        ctx.input(|i| {
            for event in &i.events {
                match event {
                    egui::Event::Text(text) => events.push(InputEvent::Text(text.clone())),
                    egui::Event::Key {
                        key,
                        pressed: true,
                        modifiers,
                        ..
                    } => {
                        let shift = modifiers.shift;
                        let key = match key {
                            egui::Key::Z if modifiers.command => {
                                if shift {
                                    redo = true;
                                } else {
                                    undo = true;
                                }
                                continue;
                            }
                            egui::Key::O if modifiers.command => {
                                open = true;
                                continue;
                            }
                            egui::Key::S if modifiers.command => {
                                save = true;
                                continue;
                            }
                            egui::Key::A if modifiers.command => Key::SelectAll,
                            egui::Key::Delete => Key::Delete,
                            egui::Key::Backspace => Key::Backspace,
                            egui::Key::Escape => Key::Escape,
                            egui::Key::Enter => Key::Enter,
                            egui::Key::ArrowLeft => Key::Left,
                            egui::Key::ArrowRight => Key::Right,
                            egui::Key::Home => Key::Home,
                            egui::Key::End => Key::End,
                            _ => continue,
                        };
                        events.push(InputEvent::Key { key, shift });
                    }
                    _ => {}
                }
            }
        });

        for event in events {
            self.editor.handle(event);
        }
        if undo {
            self.editor.undo();
        }
        if redo {
            self.editor.redo();
        }
        if open {
            self.open_dialog();
        }
        if save {
            self.save(ExportMode::SaveOriginal);
        }
    }

    fn handle_pointer(&mut self, ctx: &egui::Context, response: &egui::Response, canvas_rect: egui::Rect) {
        // Pan with the middle button.
        let (middle_down, delta) = ctx.input(|i| (i.pointer.middle_down(), i.pointer.delta()));
        self.panning = middle_down;
        if middle_down {
            self.pan += delta;
        }

        // Zoom around the cursor.
        let scroll_delta = ctx.input(|i| i.smooth_scroll_delta.y);
        if scroll_delta != 0.0 && response.hovered() {
            let new_zoom = (self.zoom * (1.0 + scroll_delta * 0.002)).clamp(0.1, 10.0);
            if let Some(cursor) = response.hover_pos() {
                let cursor_rel = cursor - canvas_rect.center() - self.pan;
                self.pan -= cursor_rel * (new_zoom / self.zoom - 1.0);
            }
            self.zoom = new_zoom;
        }

        let (pressed, released, pos) = ctx.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });
        let Some(pos) = pos else {
            return;
        };
        let p = self.to_canvas(canvas_rect, pos);
        if pressed && response.hovered() && !self.panning {
            self.pointer_captured = true;
            self.editor.handle(InputEvent::PointerDown(p));
        } else if self.pointer_captured {
            if released {
                self.pointer_captured = false;
                self.editor.handle(InputEvent::PointerUp(p));
            } else {
                self.editor.handle(InputEvent::PointerMove(p));
            }
        }
    }

    // ── Panels ──────────────────────────────────────────────────────────

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        let mode = self.editor.tool_mode();
        let has_file = self.editor.source().is_some();
        ui.horizontal(|ui| {
            if ui.button("Open…").clicked() {
                self.open_dialog();
            }
            ui.separator();

            ui.add_enabled_ui(has_file, |ui| {
                if ui.selectable_label(mode.is_selection(), "Select").clicked() {
                    self.editor.toggle_selection();
                }
                let shapes_label = match mode.shape() {
                    Some(kind) => format!("Shapes: {}", kind.label()),
                    None => "Shapes".to_string(),
                };
                let menu_open = self.editor.tools().shape_menu_open();
                if ui.selectable_label(mode.is_draw() || menu_open, shapes_label).clicked() {
                    self.editor.toggle_shape_menu();
                }
                if ui.selectable_label(mode.is_text(), "Text").clicked() {
                    self.editor.toggle_text();
                }
                ui.separator();
                if ui.button("Delete").clicked() {
                    self.editor.delete_selected();
                }
                if ui.add_enabled(self.editor.can_undo(), egui::Button::new("Undo")).clicked() {
                    self.editor.undo();
                }
                if ui.add_enabled(self.editor.can_redo(), egui::Button::new("Redo")).clicked() {
                    self.editor.redo();
                }
                ui.separator();
                if ui.button("Save").clicked() {
                    self.save(ExportMode::SaveOriginal);
                }
                if ui.button("Export as image").clicked() {
                    self.save(ExportMode::AsImage);
                }
            });
            ui.separator();
            ui.label(format!("Zoom: {:.0}%", self.zoom * 100.0));
        });

        if self.editor.tools().shape_menu_open() {
            ui.horizontal(|ui| {
                for kind in ShapeKind::ALL {
                    if ui.selectable_label(mode == ToolMode::Draw(kind), kind.label()).clicked() {
                        self.editor.choose_shape(kind);
                    }
                }
            });
        }
    }

    fn style_target(&self) -> StyleTarget {
        if let Some(object) = self.editor.canvas().active() {
            return match &object.geometry {
                Geometry::Text(_) => StyleTarget::Text,
                Geometry::Highlight(_) => StyleTarget::Highlight,
                Geometry::Cover(_) => StyleTarget::Cover,
                _ => StyleTarget::Shape,
            };
        }
        match self.editor.tool_mode() {
            ToolMode::Draw(ShapeKind::Highlight) => StyleTarget::Highlight,
            ToolMode::Draw(ShapeKind::Cover) => StyleTarget::Cover,
            ToolMode::Draw(_) => StyleTarget::Shape,
            ToolMode::Text => StyleTarget::Text,
            ToolMode::Selection | ToolMode::Idle => StyleTarget::Nothing,
        }
    }

    fn style_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Style");
        ui.separator();
        let target = self.style_target();
        if target == StyleTarget::Nothing || !self.editor.style_controls_active() {
            ui.weak("Select an object or a tool");
            return;
        }
        let style = self.editor.style().clone();
        match target {
            StyleTarget::Shape => self.shape_controls(ui, &style.shape),
            StyleTarget::Highlight => self.highlight_controls(ui, style.highlight),
            StyleTarget::Cover => {
                let mut color = to_egui(style.cover);
                ui.horizontal(|ui| {
                    ui.label("Color");
                    if ui.color_edit_button_srgba(&mut color).changed() {
                        self.editor.set_cover_color(from_egui(color));
                    }
                });
            }
            StyleTarget::Text => self.text_controls(ui, &style.text),
            StyleTarget::Nothing => {}
        }
    }

    fn shape_controls(&mut self, ui: &mut egui::Ui, shape: &ShapeStyle) {
        let mut stroke = to_egui(shape.stroke);
        ui.horizontal(|ui| {
            ui.label("Stroke");
            if ui.color_edit_button_srgba(&mut stroke).changed() {
                self.editor.set_stroke_color(from_egui(stroke));
            }
        });
        let mut width = shape.stroke_width;
        if ui
            .add(egui::Slider::new(&mut width, 0.0..=20.0).text("Width"))
            .changed()
        {
            self.editor.set_stroke_width(width);
        }
        let mut filled = shape.fill.is_some();
        let mut fill = to_egui(shape.fill.unwrap_or(Color::WHITE));
        ui.horizontal(|ui| {
            let toggled = ui.checkbox(&mut filled, "Fill").changed();
            let recolored = ui
                .add_enabled_ui(filled, |ui| ui.color_edit_button_srgba(&mut fill).changed())
                .inner;
            if toggled || recolored {
                self.editor.set_fill(filled.then(|| from_egui(fill)));
            }
        });
    }

    fn highlight_controls(&mut self, ui: &mut egui::Ui, highlight: HighlightStyle) {
        let mut color = to_egui(highlight.color);
        let mut opacity = highlight.opacity;
        let mut changed = false;
        ui.horizontal(|ui| {
            ui.label("Color");
            changed |= ui.color_edit_button_srgba(&mut color).changed();
        });
        changed |= ui
            .add(egui::Slider::new(&mut opacity, 0..=100).text("Opacity %"))
            .changed();
        if changed {
            self.editor.set_highlight(HighlightStyle {
                color: from_egui(color).with_alpha(255),
                opacity,
            });
        }
    }

    fn text_controls(&mut self, ui: &mut egui::Ui, text: &TextStyle) {
        let mut color = to_egui(text.color);
        ui.horizontal(|ui| {
            ui.label("Color");
            if ui.color_edit_button_srgba(&mut color).changed() {
                self.editor.set_stroke_color(from_egui(color));
            }
        });

        egui::ComboBox::from_id_salt("font_family")
            .selected_text(text.font_family.as_str())
            .show_ui(ui, |ui| {
                for family in FONT_FAMILIES {
                    if ui.selectable_label(text.font_family == *family, *family).clicked() {
                        self.editor.set_font_family(family);
                    }
                }
            });
        egui::ComboBox::from_id_salt("font_size")
            .selected_text(format!("{}", text.font_size))
            .show_ui(ui, |ui| {
                for size in FONT_SIZES {
                    if ui.selectable_label(text.font_size == *size, format!("{size}")).clicked() {
                        self.editor.set_font_size(*size);
                    }
                }
            });

        ui.horizontal(|ui| {
            let (mut bold, mut italic, mut underline) = (text.bold, text.italic, text.underline);
            if ui.toggle_value(&mut bold, egui::RichText::new("B").strong()).changed() {
                self.editor.set_bold(bold);
            }
            if ui.toggle_value(&mut italic, egui::RichText::new("I").italics()).changed() {
                self.editor.set_italic(italic);
            }
            if ui.toggle_value(&mut underline, egui::RichText::new("U").underline()).changed() {
                self.editor.set_underline(underline);
            }
        });
        ui.horizontal(|ui| {
            for (align, label) in [
                (TextAlign::Left, "Left"),
                (TextAlign::Center, "Center"),
                (TextAlign::Right, "Right"),
            ] {
                if ui.selectable_label(text.align == align, label).clicked() {
                    self.editor.set_text_align(align);
                }
            }
        });
    }

    // ── Painting ────────────────────────────────────────────────────────

    fn draw_objects(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        let active = self.editor.canvas().active_id();
        for object in self.editor.canvas().objects() {
            let outline = match &object.geometry {
                Geometry::Text(text) => self.draw_text(painter, canvas_rect, object, text),
                _ => self.draw_shape(painter, canvas_rect, object),
            };
            if active == Some(object.id) {
                draw_selection_indicator(painter, outline);
                if self.editor.tool_mode().objects_interactive() {
                    for handle in object.handles() {
                        draw_handle(painter, self.to_screen(canvas_rect, handle));
                    }
                }
            }
        }
    }

    /// Paint one shape and return its screen-space outline.
    fn draw_shape(&self, painter: &egui::Painter, canvas_rect: egui::Rect, object: &Drawable) -> egui::Rect {
        let screen = |p: Point| self.to_screen(canvas_rect, p);
        let stroke = egui::Stroke::new(object.style.stroke_width * self.zoom, to_egui(object.style.stroke));
        let fill = object.style.fill.map(to_egui).unwrap_or(egui::Color32::TRANSPARENT);
        let b = object.bounds();
        let outline = egui::Rect::from_two_pos(
            screen(b.origin()),
            screen(Point::new(b.right(), b.bottom())),
        );

        match &object.geometry {
            Geometry::Line { start, end } => {
                painter.line_segment([screen(*start), screen(*end)], stroke);
            }
            Geometry::Rectangle(_) | Geometry::Highlight(_) | Geometry::Cover(_) => {
                painter.rect(outline, 0.0, fill, stroke, egui::StrokeKind::Middle);
            }
            Geometry::Triangle(b) => {
                let points = triangle_points(b).map(screen).to_vec();
                painter.add(egui::Shape::convex_polygon(points, fill, stroke));
            }
            Geometry::Polygon { points } => {
                let points = points.iter().copied().map(screen).collect();
                painter.add(egui::Shape::convex_polygon(points, fill, stroke));
            }
            Geometry::Circle { center, radius } => {
                painter.circle(screen(*center), radius * self.zoom, fill, stroke);
            }
            Geometry::Ellipse { center, rx, ry } => {
                let points = ellipse_points(*center, *rx, *ry, 64).into_iter().map(screen).collect();
                painter.add(egui::Shape::convex_polygon(points, fill, stroke));
            }
            Geometry::Text(_) => {}
        }
        outline
    }

    fn draw_text(
        &self,
        painter: &egui::Painter,
        canvas_rect: egui::Rect,
        object: &Drawable,
        text: &TextBox,
    ) -> egui::Rect {
        let origin = self.to_screen(canvas_rect, text.origin);
        let session = self
            .editor
            .text_session()
            .filter(|s| s.object == object.id && text.editing);
        let selection = session.and_then(|s| s.selection());

        let chars: Vec<char> = text.content.chars().collect();
        let job = self.text_job(text, &chars, selection.clone(), false);
        let galley = painter.layout_job(job);
        let shift = egui::vec2(-galley.rect.min.x, 0.0);
        let size = galley.size();
        painter.galley(origin + shift, galley, egui::Color32::BLACK);

        // Bold is drawn as a second pass offset by one pixel.
        if chars.iter().enumerate().any(|(i, _)| text.style_at(i).bold) {
            let bold = painter.layout_job(self.text_job(text, &chars, None, true));
            painter.galley(origin + shift + egui::vec2(1.0, 0.0), bold, egui::Color32::BLACK);
        }

        let min_height = text.style.font_size * 1.2 * self.zoom;
        let outline = egui::Rect::from_min_size(origin, egui::vec2(size.x.max(2.0), size.y.max(min_height)));

        if let Some(session) = session {
            self.draw_caret(painter, origin, text, &chars, session.caret, size.x);
        }
        outline
    }

    /// Layout for a text object. With `bold_only`, every non-bold character
    /// is laid out transparent so the galley overprints just the bold runs.
    fn text_job(
        &self,
        text: &TextBox,
        chars: &[char],
        selection: Option<std::ops::Range<usize>>,
        bold_only: bool,
    ) -> LayoutJob {
        let mut job = LayoutJob {
            halign: match text.style.align {
                TextAlign::Left => egui::Align::LEFT,
                TextAlign::Center => egui::Align::Center,
                TextAlign::Right => egui::Align::RIGHT,
            },
            ..Default::default()
        };
        let selected = |i: usize| selection.as_ref().is_some_and(|r| r.contains(&i));

        let mut start = 0;
        while start < chars.len() {
            let style = text.style_at(start);
            let sel = selected(start);
            let mut end = start + 1;
            while end < chars.len() && selected(end) == sel && text.style_at(end) == style {
                end += 1;
            }
            let piece: String = chars[start..end].iter().collect();
            let mut format = self.text_format(&style);
            if bold_only && !style.bold {
                format.color = egui::Color32::TRANSPARENT;
                format.underline = egui::Stroke::NONE;
            }
            if sel && !bold_only {
                format.background = SELECTION_BLUE.gamma_multiply(0.35);
            }
            job.append(&piece, 0.0, format);
            start = end;
        }
        job
    }

    fn text_format(&self, style: &TextStyle) -> egui::TextFormat {
        let size = style.font_size * self.zoom;
        let font_id = if style.font_family.starts_with("Courier") {
            egui::FontId::monospace(size)
        } else {
            egui::FontId::proportional(size)
        };
        let color = to_egui(style.color);
        egui::TextFormat {
            font_id,
            color,
            italics: style.italic,
            underline: if style.underline {
                egui::Stroke::new((size / 14.0).max(1.0), color)
            } else {
                egui::Stroke::NONE
            },
            ..Default::default()
        }
    }

    /// The caret sits after the laid-out text of its line, shifted by the
    /// line's alignment within the box.
    fn draw_caret(
        &self,
        painter: &egui::Painter,
        origin: egui::Pos2,
        text: &TextBox,
        chars: &[char],
        caret: usize,
        box_width: f32,
    ) {
        let caret = caret.min(chars.len());
        let line_start = chars[..caret]
            .iter()
            .rposition(|c| *c == '\n')
            .map_or(0, |i| i + 1);
        let line_end = chars[caret..]
            .iter()
            .position(|c| *c == '\n')
            .map_or(chars.len(), |i| caret + i);

        let measure = |range: std::ops::Range<usize>| {
            let mut job = LayoutJob::default();
            for i in range {
                let mut buf = [0u8; 4];
                job.append(chars[i].encode_utf8(&mut buf), 0.0, self.text_format(&text.style_at(i)));
            }
            painter.layout_job(job).size()
        };

        let before = measure(line_start..caret);
        let line = measure(line_start..line_end);
        let above = if line_start > 0 {
            measure(0..line_start - 1).y
        } else {
            0.0
        };
        let offset = match text.style.align {
            TextAlign::Left => 0.0,
            TextAlign::Center => (box_width - line.x) / 2.0,
            TextAlign::Right => box_width - line.x,
        };
        let height = line.y.max(text.style_at(caret.saturating_sub(1)).font_size * self.zoom);
        let x = origin.x + offset + before.x;
        let top = origin.y + above;
        painter.line_segment(
            [egui::pos2(x, top), egui::pos2(x, top + height)],
            egui::Stroke::new(1.5, to_egui(text.style.color)),
        );
    }

    fn update_title(&mut self, ctx: &egui::Context) {
        let title = match self.editor.source() {
            Some(source) => {
                let marker = if self.editor.has_unsaved_changes() { "*" } else { "" };
                format!("{marker}{} - {APP_NAME}", source.name())
            }
            None => APP_NAME.to_string(),
        };
        if title != self.title {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title.clone()));
            self.title = title;
        }
    }
}

fn draw_selection_indicator(painter: &egui::Painter, rect: egui::Rect) {
    painter.rect_stroke(
        rect.expand(4.0),
        2.0,
        egui::Stroke::new(1.5, SELECTION_BLUE),
        egui::StrokeKind::Middle,
    );
}

fn draw_handle(painter: &egui::Painter, at: egui::Pos2) {
    let rect = egui::Rect::from_center_size(at, egui::vec2(8.0, 8.0));
    painter.rect_filled(rect, 1.0, egui::Color32::WHITE);
    painter.rect_stroke(rect, 1.0, egui::Stroke::new(1.0, SELECTION_BLUE), egui::StrokeKind::Inside);
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for DocAnnotateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) && !self.confirm_discard("closing") {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
        }
        self.ensure_texture(ctx);
        self.handle_keyboard(ctx);
        self.update_title(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));

        let mut dismiss = false;
        if let Some(status) = &self.status {
            egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    match status {
                        Status::Info(msg) => ui.label(msg.as_str()),
                        Status::Error(msg) => ui.colored_label(ui.visuals().error_fg_color, msg.as_str()),
                    };
                    dismiss = ui.small_button("✕").clicked();
                });
            });
        }
        if dismiss {
            self.status = None;
        }

        egui::SidePanel::right("style")
            .resizable(false)
            .default_width(200.0)
            .show(ctx, |ui| self.style_panel(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let canvas_rect = response.rect;
            painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));

            let Some(texture) = self.texture.as_ref().map(|t| t.id()) else {
                painter.text(
                    canvas_rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "Open a PNG or JPEG image to start annotating",
                    egui::FontId::proportional(18.0),
                    egui::Color32::from_gray(180),
                );
                return;
            };
            if self.fit_pending {
                self.fit_to(canvas_rect);
            }

            let img_rect = self.image_rect_on_screen(canvas_rect);
            painter.image(
                texture,
                img_rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
            let painter = painter.with_clip_rect(img_rect.intersect(canvas_rect));
            self.draw_objects(&painter, canvas_rect);
            self.handle_pointer(ctx, &response, canvas_rect);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_canvas_never_asks() {
        let proceed = may_discard(false, || panic!("asked"), || panic!("saved"));
        assert!(proceed);
    }

    #[test]
    fn unsaved_changes_follow_the_answer() {
        assert!(may_discard(true, || UnsavedChoice::Discard, || false));
        assert!(!may_discard(true, || UnsavedChoice::Cancel, || true));
        assert!(may_discard(true, || UnsavedChoice::Save, || true));
        // A cancelled or failed save keeps the annotations open.
        assert!(!may_discard(true, || UnsavedChoice::Save, || false));
    }
}
