use std::io::Cursor;

use doc_annotate::{
    load_font, Bounds, Color, DocumentKind, Editor, EditorConfig, ExportMode, InputEvent, Key,
    Point, ShapeKind, ToolMode, UploadError,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

fn encoded(w: u32, h: u32, format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).expect("encode fixture");
    out.into_inner()
}

fn editor() -> Editor {
    Editor::new(&EditorConfig::default())
}

fn press(editor: &mut Editor, x: f32, y: f32) {
    editor.handle(InputEvent::PointerDown(Point::new(x, y)));
}

fn drag(editor: &mut Editor, from: (f32, f32), to: (f32, f32)) {
    press(editor, from.0, from.1);
    editor.handle(InputEvent::PointerMove(Point::new(to.0, to.1)));
    editor.handle(InputEvent::PointerUp(Point::new(to.0, to.1)));
}

fn key(editor: &mut Editor, key: Key) {
    editor.handle(InputEvent::Key { key, shift: false });
}

#[test]
fn draw_one_rectangle_on_large_png_and_export() {
    let mut editor = editor();
    editor
        .open_bytes("scan.png", Some("image/png"), encoded(2000, 1000, ImageFormat::Png))
        .expect("png loads");
    assert_eq!((editor.canvas().width(), editor.canvas().height()), (2000, 1000));
    assert_eq!(editor.tool_mode(), ToolMode::Draw(ShapeKind::Rectangle));

    drag(&mut editor, (10.0, 10.0), (110.0, 60.0));
    let file = editor.export(ExportMode::SaveOriginal, None).expect("export");

    let objects = editor.canvas().objects();
    assert_eq!(objects.len(), 1);
    assert_eq!(
        objects[0].bounds(),
        Bounds {
            left: 10.0,
            top: 10.0,
            width: 100.0,
            height: 50.0
        }
    );
    assert_eq!(file.file_name, "scan.png");
    assert!(!editor.has_unsaved_changes());
}

#[test]
fn save_original_keeps_jpeg() {
    let mut editor = editor();
    editor
        .open_bytes("photo.jpeg", None, encoded(64, 32, ImageFormat::Jpeg))
        .expect("jpeg loads");
    drag(&mut editor, (4.0, 4.0), (20.0, 20.0));

    let file = editor.export(ExportMode::SaveOriginal, None).expect("export");
    assert_eq!(file.kind, DocumentKind::Jpeg);
    assert_eq!(file.mime(), "image/jpeg");
    assert_eq!(file.file_name, "photo.jpeg");
    assert_eq!(image::guess_format(&file.bytes).expect("format"), ImageFormat::Jpeg);
}

#[test]
fn export_as_image_without_annotations_matches_background() {
    let mut editor = editor();
    let bytes = encoded(40, 30, ImageFormat::Png);
    let original = image::load_from_memory(&bytes).expect("decode").to_rgba8();
    editor.open_bytes("page.png", None, bytes).expect("png loads");

    let file = editor.export(ExportMode::AsImage, None).expect("export");
    assert_eq!(file.file_name, "page_edited.png");
    assert!(!file.bytes.is_empty());
    let exported = image::load_from_memory_with_format(&file.bytes, ImageFormat::Png)
        .expect("valid png")
        .to_rgba8();
    assert_eq!(exported, original);
}

#[test]
fn export_to_writes_file_and_clears_flag() {
    let mut editor = editor();
    editor
        .open_bytes("page.png", None, encoded(16, 16, ImageFormat::Png))
        .expect("png loads");
    drag(&mut editor, (1.0, 1.0), (8.0, 8.0));
    assert!(editor.has_unsaved_changes());

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("page_edited.png");
    editor
        .export_to(ExportMode::AsImage, None, &path)
        .expect("export written");
    assert!(!editor.has_unsaved_changes());
    let written = std::fs::read(&path).expect("read back");
    assert_eq!(image::guess_format(&written).expect("format"), ImageFormat::Png);
}

#[test]
fn delete_is_swallowed_while_text_is_being_edited() {
    let mut editor = editor();
    editor
        .open_bytes("page.png", None, encoded(200, 100, ImageFormat::Png))
        .expect("png loads");
    editor.toggle_text();
    press(&mut editor, 20.0, 20.0);
    editor.handle(InputEvent::Text("hi".into()));

    key(&mut editor, Key::Delete);
    assert!(!editor.delete_selected());
    assert_eq!(editor.canvas().len(), 1);
    assert!(editor.canvas().objects()[0].is_editing());

    key(&mut editor, Key::Escape);
    assert!(!editor.canvas().objects()[0].is_editing());
    key(&mut editor, Key::Delete);
    assert!(editor.canvas().is_empty());
}

#[test]
fn backspace_edits_text_instead_of_deleting_it() {
    let mut editor = editor();
    editor
        .open_bytes("page.png", None, encoded(200, 100, ImageFormat::Png))
        .expect("png loads");
    editor.toggle_text();
    press(&mut editor, 20.0, 20.0);
    editor.handle(InputEvent::Text("note".into()));
    key(&mut editor, Key::Backspace);

    let text = editor.canvas().objects()[0].text().expect("text object");
    assert_eq!(text.content, "not");
}

#[test]
fn empty_text_is_removed_when_editing_ends() {
    let mut editor = editor();
    editor
        .open_bytes("page.png", None, encoded(200, 100, ImageFormat::Png))
        .expect("png loads");
    drag(&mut editor, (100.0, 50.0), (150.0, 90.0));
    assert_eq!(editor.canvas().len(), 1);

    editor.toggle_text();
    press(&mut editor, 10.0, 10.0);
    assert_eq!(editor.canvas().len(), 2);
    key(&mut editor, Key::Escape);
    assert_eq!(editor.canvas().len(), 1);

    // Leaving text mode also ends the edit.
    press(&mut editor, 10.0, 10.0);
    editor.handle(InputEvent::Text("x".into()));
    key(&mut editor, Key::Backspace);
    editor.toggle_selection();
    assert_eq!(editor.canvas().len(), 1);
}

#[test]
fn switching_tools_is_exclusive_and_closes_shape_menu() {
    let mut editor = editor();
    editor.set_tool_mode(ToolMode::Draw(ShapeKind::Rectangle));
    editor.toggle_shape_menu();
    assert!(editor.tools().shape_menu_open());

    editor.toggle_text();
    let mode = editor.tool_mode();
    assert_eq!(mode, ToolMode::Text);
    let active = [mode.is_selection(), mode.is_draw(), mode.is_text()]
        .iter()
        .filter(|on| **on)
        .count();
    assert_eq!(active, 1);
    assert!(!editor.tools().shape_menu_open());

    editor.choose_shape(ShapeKind::Circle);
    editor.choose_shape(ShapeKind::Circle);
    assert_eq!(editor.tool_mode(), ToolMode::Idle);
}

#[test]
fn objects_are_locked_until_selection_mode() {
    let mut editor = editor();
    editor
        .open_bytes("page.png", None, encoded(200, 100, ImageFormat::Png))
        .expect("png loads");
    drag(&mut editor, (10.0, 10.0), (60.0, 60.0));
    drag(&mut editor, (30.0, 30.0), (90.0, 90.0));
    // The second gesture drew a new shape rather than moving the first.
    assert_eq!(editor.canvas().len(), 2);
    assert_eq!(editor.canvas().objects()[0].position(), Point::new(10.0, 10.0));

    editor.toggle_selection();
    drag(&mut editor, (15.0, 15.0), (25.0, 35.0));
    assert_eq!(editor.canvas().objects()[0].position(), Point::new(20.0, 30.0));
}

#[test]
fn cover_ignores_shape_controls() {
    let mut editor = editor();
    editor
        .open_bytes("page.png", None, encoded(100, 100, ImageFormat::Png))
        .expect("png loads");
    editor.choose_shape(ShapeKind::Cover);
    drag(&mut editor, (0.0, 0.0), (20.0, 20.0));
    editor.set_stroke_color(Color::rgb(255, 0, 0));
    editor.set_fill(Some(Color::WHITE));

    let cover = &editor.canvas().objects()[0];
    assert_eq!(cover.style.fill, Some(Color::BLACK));
    assert!(cover.style.stroke.is_transparent());
}

#[test]
fn oversized_and_view_only_uploads_are_rejected() {
    let config = EditorConfig {
        max_upload_bytes: Some(1024),
        ..EditorConfig::default()
    };
    let mut editor = Editor::new(&config);
    let err = editor
        .open_bytes("big.png", None, vec![0; 4096])
        .expect_err("too large");
    assert!(matches!(err, UploadError::TooLarge { limit: 1024, .. }));

    let err = editor
        .open_bytes("sheet.xlsx", None, vec![0; 10])
        .expect_err("view only");
    assert!(matches!(err, UploadError::NotAnnotatable(DocumentKind::Excel)));
    assert!(editor.source().is_none());
}

#[test]
fn selected_rectangle_resizes_by_its_corner() {
    let mut editor = editor();
    editor
        .open_bytes("page.png", None, encoded(200, 100, ImageFormat::Png))
        .expect("png loads");
    drag(&mut editor, (10.0, 10.0), (50.0, 50.0));
    editor.toggle_selection();
    drag(&mut editor, (50.0, 50.0), (70.0, 70.0));

    assert_eq!(editor.canvas().len(), 1);
    assert_eq!(
        editor.canvas().objects()[0].bounds(),
        Bounds {
            left: 10.0,
            top: 10.0,
            width: 60.0,
            height: 60.0
        }
    );
}

#[test]
fn cover_over_text_redacts_the_export() {
    let Some(font) = load_font(None) else {
        return;
    };
    let mut editor = editor();
    editor
        .open_bytes("page.png", None, encoded(200, 80, ImageFormat::Png))
        .expect("png loads");
    editor.toggle_text();
    press(&mut editor, 10.0, 10.0);
    editor.set_stroke_color(Color::rgb(255, 0, 0));
    editor.set_font_size(48.0);
    editor.handle(InputEvent::Text("SECRET".into()));
    key(&mut editor, Key::Escape);

    editor.choose_shape(ShapeKind::Cover);
    drag(&mut editor, (0.0, 0.0), (200.0, 80.0));

    let file = editor.export(ExportMode::AsImage, Some(&font)).expect("export");
    let exported = image::load_from_memory_with_format(&file.bytes, ImageFormat::Png)
        .expect("valid png")
        .to_rgba8();
    assert!(exported.pixels().all(|p| p.0 == [0, 0, 0, 255]));
}

