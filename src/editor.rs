use ab_glyph::FontArc;
use std::path::Path;

use crate::canvas::Canvas;
use crate::config::EditorConfig;
use crate::document::{SourceDocument, UploadPolicy};
use crate::error::{ExportError, UploadError};
use crate::export::{export_image, ExportMode, ExportedFile};
use crate::geometry::Point;
use crate::history::History;
use crate::shape::{
    create_shape, resize_geometry, update_shape, Drawable, Geometry, ObjectId, ShapeKind,
};
use crate::style::{Color, HighlightStyle, StyleState, TextAlign, TextStylePatch};
use crate::text::{CaretMotion, TextBox, TextEditSession};
use crate::tool::{ToolMode, ToolState};

/// Pointer slack for picking objects, in canvas pixels.
pub const HIT_TOLERANCE: f32 = 4.0;

/// Pointer slack for grabbing a resize handle.
pub const HANDLE_TOLERANCE: f32 = 6.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Delete,
    Backspace,
    Escape,
    Enter,
    Left,
    Right,
    Home,
    End,
    SelectAll,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    PointerDown(Point),
    PointerMove(Point),
    PointerUp(Point),
    Key { key: Key, shift: bool },
    Text(String),
}

// ── Drag session ────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
enum DragSession {
    Create {
        start: Point,
        object: ObjectId,
    },
    Move {
        last: Point,
        object: ObjectId,
        before: Vec<Drawable>,
        moved: bool,
    },
    Resize {
        anchor: Point,
        object: ObjectId,
        original: Geometry,
        before: Vec<Drawable>,
        resized: bool,
    },
}

// ── Editor ──────────────────────────────────────────────────────────────────

/// Owns the canvas and all interaction state. Every pointer and keyboard
/// event goes through [`Editor::handle`], which consults the tool mode and
/// the text editing target before touching the canvas.
pub struct Editor {
    canvas: Canvas,
    source: Option<SourceDocument>,
    policy: UploadPolicy,
    default_tool: ToolMode,
    tools: ToolState,
    /// What the style controls show.
    style: StyleState,
    /// Style for new objects while nothing is selected.
    defaults: StyleState,
    drag: Option<DragSession>,
    text_session: Option<TextEditSession>,
    /// Whether the running text session already has an undo snapshot.
    text_recorded: bool,
    history: History<Vec<Drawable>>,
}

impl Editor {
    pub fn new(config: &EditorConfig) -> Self {
        let defaults = config.style_defaults();
        Self {
            canvas: Canvas::default(),
            source: None,
            policy: config.upload_policy(),
            default_tool: config.default_tool,
            tools: ToolState::new(config.default_tool),
            style: defaults.clone(),
            defaults,
            drag: None,
            text_session: None,
            text_recorded: false,
            history: History::default(),
        }
    }

    // ── Loading ─────────────────────────────────────────────────────────

    pub fn open_path(&mut self, path: &Path) -> Result<(), UploadError> {
        let doc = SourceDocument::open(path, &self.policy)?;
        self.load(doc)
    }

    pub fn open_bytes(
        &mut self,
        name: &str,
        declared_mime: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<(), UploadError> {
        let doc = SourceDocument::from_bytes(name, declared_mime, bytes, &self.policy)?;
        self.load(doc)
    }

    /// Replace the current file. Nothing changes if decoding fails.
    pub fn load(&mut self, doc: SourceDocument) -> Result<(), UploadError> {
        let image = doc.decode()?.to_rgba8();
        log::info!(
            "loaded {} ({}, {}x{})",
            doc.name(),
            doc.kind(),
            image.width(),
            image.height()
        );
        self.canvas = Canvas::with_background(image);
        self.source = Some(doc);
        self.tools = ToolState::new(self.default_tool);
        self.style = self.defaults.clone();
        self.drag = None;
        self.text_session = None;
        self.text_recorded = false;
        self.history.clear();
        Ok(())
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn source(&self) -> Option<&SourceDocument> {
        self.source.as_ref()
    }

    pub fn tools(&self) -> &ToolState {
        &self.tools
    }

    pub fn tool_mode(&self) -> ToolMode {
        self.tools.mode()
    }

    pub fn style(&self) -> &StyleState {
        &self.style
    }

    pub fn text_session(&self) -> Option<&TextEditSession> {
        self.text_session.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.canvas.is_dirty()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Whether style edits currently have anything to act on.
    pub fn style_controls_active(&self) -> bool {
        self.canvas.active_id().is_some() || self.tool_mode().is_draw() || self.tool_mode().is_text()
    }

    // ── Tool mode ───────────────────────────────────────────────────────

    fn change_tool(&mut self, change: impl FnOnce(&mut ToolState)) {
        self.end_text_edit();
        self.drag = None;
        change(&mut self.tools);
        let interactive = self.tool_mode().objects_interactive();
        self.canvas.set_interactive(interactive);
        if !interactive {
            self.select(None);
        }
    }

    pub fn set_tool_mode(&mut self, mode: ToolMode) {
        self.change_tool(|tools| tools.set_mode(mode));
    }

    pub fn toggle_selection(&mut self) {
        self.change_tool(ToolState::toggle_selection);
    }

    pub fn toggle_text(&mut self) {
        self.change_tool(ToolState::toggle_text);
    }

    pub fn choose_shape(&mut self, kind: ShapeKind) {
        self.change_tool(|tools| tools.choose_shape(kind));
    }

    pub fn toggle_shape_menu(&mut self) {
        self.tools.toggle_shape_menu();
    }

    // ── Input dispatch ──────────────────────────────────────────────────

    pub fn handle(&mut self, event: InputEvent) {
        if self.source.is_none() {
            return;
        }
        match event {
            InputEvent::PointerDown(p) => self.pointer_down(p),
            InputEvent::PointerMove(p) => self.pointer_move(p),
            InputEvent::PointerUp(p) => self.pointer_up(p),
            InputEvent::Key { key, shift } => self.key(key, shift),
            InputEvent::Text(text) => self.type_text(&text),
        }
    }

    fn pointer_down(&mut self, p: Point) {
        if self.drag.is_some() {
            return;
        }
        match self.tool_mode() {
            ToolMode::Selection => {
                if let Some((object, anchor)) = self.handle_at(p) {
                    if let Some(original) = self.canvas.get(object).map(|o| o.geometry.clone()) {
                        self.drag = Some(DragSession::Resize {
                            anchor,
                            object,
                            original,
                            before: self.snapshot(),
                            resized: false,
                        });
                        return;
                    }
                }
                let hit = self
                    .canvas
                    .object_at(p, HIT_TOLERANCE)
                    .filter(|id| self.canvas.get(*id).is_some_and(|o| o.selectable));
                if hit.is_none() || hit != self.editing_id() {
                    self.end_text_edit();
                }
                self.select(hit);
                if let Some(object) = hit {
                    self.drag = Some(DragSession::Move {
                        last: p,
                        object,
                        before: self.snapshot(),
                        moved: false,
                    });
                }
            }
            ToolMode::Draw(kind) => {
                self.end_text_edit();
                self.history.push(self.snapshot());
                let shape = create_shape(kind, p, &self.style, false);
                let object = self.canvas.add(shape);
                self.select(Some(object));
                self.drag = Some(DragSession::Create { start: p, object });
            }
            ToolMode::Text => {
                let hit = self
                    .canvas
                    .object_at(p, HIT_TOLERANCE)
                    .filter(|id| self.canvas.get(*id).is_some_and(Drawable::is_text));
                if hit.is_some() && hit == self.editing_id() {
                    return;
                }
                self.end_text_edit();
                match hit {
                    Some(id) => self.begin_text_edit(id, false),
                    None => {
                        self.history.push(self.snapshot());
                        let text = TextBox::new(p, self.style.text.clone());
                        let object = self.canvas.add(Drawable::new(
                            Geometry::Text(text),
                            self.style.shape,
                            false,
                        ));
                        self.begin_text_edit(object, true);
                    }
                }
            }
            ToolMode::Idle => {
                self.end_text_edit();
                self.select(None);
            }
        }
    }

    fn pointer_move(&mut self, p: Point) {
        match &mut self.drag {
            Some(DragSession::Create { start, object }) => {
                if let Some(shape) = self.canvas.get_mut(*object) {
                    update_shape(shape, *start, p);
                    self.canvas.mark_dirty();
                }
            }
            Some(DragSession::Move {
                last,
                object,
                moved,
                ..
            }) => {
                let (dx, dy) = (p.x - last.x, p.y - last.y);
                *last = p;
                if dx == 0.0 && dy == 0.0 {
                    return;
                }
                if let Some(shape) = self.canvas.get_mut(*object) {
                    shape.move_by(dx, dy);
                    *moved = true;
                    self.canvas.mark_dirty();
                }
            }
            Some(DragSession::Resize {
                anchor,
                object,
                original,
                resized,
                ..
            }) => {
                if let Some(shape) = self.canvas.get_mut(*object) {
                    shape.geometry = resize_geometry(original, *anchor, p);
                    *resized = true;
                    self.canvas.mark_dirty();
                }
            }
            None => {}
        }
    }

    /// A resize handle of the selected object under `p`, with the point
    /// that stays fixed while it is dragged.
    fn handle_at(&self, p: Point) -> Option<(ObjectId, Point)> {
        let object = self.canvas.active().filter(|o| o.selectable && !o.is_editing())?;
        let anchor = object.resize_anchor(p, HANDLE_TOLERANCE)?;
        Some((object.id, anchor))
    }

    fn pointer_up(&mut self, p: Point) {
        self.pointer_move(p);
        match self.drag.take() {
            Some(DragSession::Move {
                before,
                moved: true,
                ..
            })
            | Some(DragSession::Resize {
                before,
                resized: true,
                ..
            }) => self.history.push(before),
            Some(DragSession::Create { object, .. }) => {
                if let Some(shape) = self.canvas.get(object) {
                    log::debug!("finished {:?} at {:?}", shape.shape_kind(), shape.bounds());
                }
            }
            _ => {}
        }
    }

    fn key(&mut self, key: Key, shift: bool) {
        if self.text_session.is_some() {
            self.text_key(key, shift);
            return;
        }
        match key {
            Key::Delete | Key::Backspace => {
                self.delete_selected();
            }
            Key::Escape => self.select(None),
            _ => {}
        }
    }

    // ── Selection & style synchronization ───────────────────────────────

    fn select(&mut self, id: Option<ObjectId>) {
        self.canvas.set_active(id);
        self.pull_style();
    }

    pub fn clear_selection(&mut self) {
        self.end_text_edit();
        self.select(None);
    }

    /// Overwrite the style state from the selected object, or fall back to
    /// the defaults when nothing is selected.
    fn pull_style(&mut self) {
        let Some(object) = self.canvas.active() else {
            self.style = self.defaults.clone();
            return;
        };
        self.style.shape = object.shape_style();
        match &object.geometry {
            Geometry::Text(text) => self.style.text = text.style.clone(),
            Geometry::Highlight(_) => {
                if let Some(fill) = object.style.fill {
                    let opacity = (u16::from(fill.a) * 100 + 127) / 255;
                    self.style.highlight = HighlightStyle {
                        color: fill.with_alpha(255),
                        opacity: opacity as u8,
                    };
                }
            }
            Geometry::Cover(_) => {
                if let Some(fill) = object.style.fill {
                    self.style.cover = fill;
                }
            }
            _ => {}
        }
    }

    fn active_is_text(&self) -> bool {
        self.canvas.active().is_some_and(Drawable::is_text)
    }

    fn push_shape_style(&mut self) {
        let style = self.style.shape;
        let Some(object) = self.canvas.active() else {
            self.defaults.shape = style;
            return;
        };
        let fixed = matches!(object.geometry, Geometry::Highlight(_) | Geometry::Cover(_));
        let id = object.id;
        if fixed {
            self.pull_style();
            return;
        }
        self.history.push(self.snapshot());
        if let Some(object) = self.canvas.get_mut(id) {
            object.apply_shape_style(&style);
            self.canvas.mark_dirty();
        }
    }

    /// Text styling goes to the selected characters while editing (or to
    /// the next typed ones when none are selected), otherwise to the whole
    /// selected text object, otherwise to the defaults.
    fn push_text_patch(&mut self, patch: TextStylePatch) {
        if let Some(session) = &self.text_session {
            if session.selection().is_some() {
                self.edit_text(|s, t| s.apply_style(t, &patch));
            } else {
                self.with_text_session(|s, t| s.apply_style(t, &patch));
            }
            return;
        }
        match self.canvas.active_id() {
            Some(id) if self.active_is_text() => {
                self.history.push(self.snapshot());
                if let Some(text) = self.canvas.get_mut(id).and_then(Drawable::text_mut) {
                    patch.apply_to(&mut text.style);
                    self.canvas.mark_dirty();
                }
            }
            Some(_) => {}
            None => self.defaults.text = self.style.text.clone(),
        }
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        self.style.shape.stroke = color;
        if self.active_is_text() {
            self.style.text.color = color;
            self.push_text_patch(TextStylePatch {
                color: Some(color),
                ..Default::default()
            });
        } else {
            if self.canvas.active_id().is_none() {
                self.defaults.text.color = color;
                self.style.text.color = color;
            }
            self.push_shape_style();
        }
    }

    pub fn set_stroke_width(&mut self, width: f32) {
        self.style.shape.stroke_width = width.max(0.0);
        self.push_shape_style();
    }

    /// `None` is the transparent fill.
    pub fn set_fill(&mut self, fill: Option<Color>) {
        self.style.shape.fill = fill;
        self.push_shape_style();
    }

    pub fn set_font_family(&mut self, family: &str) {
        self.style.text.font_family = family.to_string();
        self.push_text_patch(TextStylePatch {
            font_family: Some(family.to_string()),
            ..Default::default()
        });
    }

    pub fn set_font_size(&mut self, size: f32) {
        let size = size.max(1.0);
        self.style.text.font_size = size;
        self.push_text_patch(TextStylePatch {
            font_size: Some(size),
            ..Default::default()
        });
    }

    pub fn set_bold(&mut self, bold: bool) {
        self.style.text.bold = bold;
        self.push_text_patch(TextStylePatch {
            bold: Some(bold),
            ..Default::default()
        });
    }

    pub fn set_italic(&mut self, italic: bool) {
        self.style.text.italic = italic;
        self.push_text_patch(TextStylePatch {
            italic: Some(italic),
            ..Default::default()
        });
    }

    pub fn set_underline(&mut self, underline: bool) {
        self.style.text.underline = underline;
        self.push_text_patch(TextStylePatch {
            underline: Some(underline),
            ..Default::default()
        });
    }

    /// Alignment belongs to the whole text object.
    pub fn set_text_align(&mut self, align: TextAlign) {
        self.style.text.align = align;
        match self.canvas.active_id() {
            Some(id) if self.active_is_text() => {
                self.history.push(self.snapshot());
                if let Some(text) = self.canvas.get_mut(id).and_then(Drawable::text_mut) {
                    text.style.align = align;
                    self.canvas.mark_dirty();
                }
            }
            Some(_) => {}
            None => self.defaults.text.align = align,
        }
    }

    pub fn set_highlight(&mut self, highlight: HighlightStyle) {
        self.style.highlight = highlight;
        match self.canvas.active_id() {
            Some(id) => {
                let target = self.canvas.get(id).map(|o| &o.geometry);
                if matches!(target, Some(Geometry::Highlight(_))) {
                    self.history.push(self.snapshot());
                    if let Some(object) = self.canvas.get_mut(id) {
                        object.apply_highlight(&highlight);
                        self.canvas.mark_dirty();
                    }
                }
            }
            None => self.defaults.highlight = highlight,
        }
    }

    pub fn set_cover_color(&mut self, color: Color) {
        let color = color.with_alpha(255);
        self.style.cover = color;
        match self.canvas.active_id() {
            Some(id) => {
                let target = self.canvas.get(id).map(|o| &o.geometry);
                if matches!(target, Some(Geometry::Cover(_))) {
                    self.history.push(self.snapshot());
                    if let Some(object) = self.canvas.get_mut(id) {
                        object.apply_cover(color);
                        self.canvas.mark_dirty();
                    }
                }
            }
            None => self.defaults.cover = color,
        }
    }

    // ── Text annotation editor ──────────────────────────────────────────

    fn editing_id(&self) -> Option<ObjectId> {
        self.text_session.as_ref().map(|s| s.object)
    }

    fn begin_text_edit(&mut self, id: ObjectId, created: bool) {
        let Some(text) = self.canvas.get_mut(id).and_then(Drawable::text_mut) else {
            return;
        };
        text.editing = true;
        let caret = text.char_len();
        self.text_session = Some(TextEditSession::new(id, caret));
        self.text_recorded = created;
        self.select(Some(id));
    }

    /// Leave text editing. An object left without text is removed.
    pub fn end_text_edit(&mut self) {
        let Some(session) = self.text_session.take() else {
            return;
        };
        self.text_recorded = false;
        let empty = match self.canvas.get_mut(session.object).and_then(Drawable::text_mut) {
            Some(text) => {
                text.editing = false;
                text.is_empty()
            }
            None => false,
        };
        if empty {
            log::debug!("removing empty text object {}", session.object);
            self.canvas.remove(session.object);
        }
        self.pull_style();
    }

    fn record_text_change(&mut self) {
        if !self.text_recorded {
            self.history.push(self.snapshot());
            self.text_recorded = true;
        }
    }

    fn with_text_session(&mut self, edit: impl FnOnce(&mut TextEditSession, &mut TextBox)) {
        let Some(session) = self.text_session.as_mut() else {
            return;
        };
        if let Some(text) = self.canvas.get_mut(session.object).and_then(Drawable::text_mut) {
            edit(session, text);
        }
    }

    fn edit_text(&mut self, edit: impl FnOnce(&mut TextEditSession, &mut TextBox)) {
        self.record_text_change();
        self.with_text_session(edit);
        self.canvas.mark_dirty();
    }

    fn type_text(&mut self, input: &str) {
        if self.text_session.is_none() || input.is_empty() {
            return;
        }
        self.edit_text(|session, text| session.insert(text, input));
    }

    fn text_key(&mut self, key: Key, shift: bool) {
        let motion = match key {
            Key::Backspace => return self.edit_text(|s, t| s.backspace(t)),
            Key::Delete => return self.edit_text(|s, t| s.delete_forward(t)),
            Key::Enter => return self.edit_text(|s, t| s.insert(t, "\n")),
            Key::Escape => return self.end_text_edit(),
            Key::SelectAll => return self.with_text_session(|s, t| s.select_all(t)),
            Key::Left => CaretMotion::Left,
            Key::Right => CaretMotion::Right,
            Key::Home => CaretMotion::Home,
            Key::End => CaretMotion::End,
        };
        self.with_text_session(|s, t| s.move_caret(motion, shift, t));
    }

    // ── Delete / undo / export ──────────────────────────────────────────

    /// Remove the selected object. Does nothing while that object is a text
    /// being edited, so keystrokes meant for its content never delete it.
    pub fn delete_selected(&mut self) -> bool {
        let Some(object) = self.canvas.active() else {
            return false;
        };
        if object.is_editing() {
            return false;
        }
        let id = object.id;
        self.history.push(self.snapshot());
        self.canvas.remove(id);
        self.pull_style();
        true
    }

    fn snapshot(&self) -> Vec<Drawable> {
        self.canvas.objects().to_vec()
    }

    fn restore(&mut self, mut objects: Vec<Drawable>) {
        for text in objects.iter_mut().filter_map(Drawable::text_mut) {
            text.editing = false;
        }
        self.canvas.restore(objects);
        self.canvas
            .set_interactive(self.tool_mode().objects_interactive());
        self.pull_style();
    }

    pub fn undo(&mut self) {
        self.end_text_edit();
        self.drag = None;
        if let Some(prev) = self.history.undo(self.snapshot()) {
            self.restore(prev);
        }
    }

    pub fn redo(&mut self) {
        self.end_text_edit();
        self.drag = None;
        if let Some(next) = self.history.redo(self.snapshot()) {
            self.restore(next);
        }
    }

    fn render(&self, mode: ExportMode, font: Option<&FontArc>) -> Result<ExportedFile, ExportError> {
        let source = self.source.as_ref().ok_or(ExportError::NoBackground)?;
        export_image(&self.canvas, source, mode, font)
    }

    /// Render and encode the canvas. A successful export clears the
    /// unsaved-changes flag.
    pub fn export(
        &mut self,
        mode: ExportMode,
        font: Option<&FontArc>,
    ) -> Result<ExportedFile, ExportError> {
        let file = self.render(mode, font)?;
        self.canvas.clear_dirty();
        Ok(file)
    }

    /// Export and write to `path`. Changes stay unsaved if writing fails.
    pub fn export_to(
        &mut self,
        mode: ExportMode,
        font: Option<&FontArc>,
        path: &Path,
    ) -> Result<ExportedFile, ExportError> {
        let file = self.render(mode, font)?;
        file.write_to(path)?;
        log::info!("wrote {} to {}", file.file_name, path.display());
        self.canvas.clear_dirty();
        Ok(file)
    }
}
