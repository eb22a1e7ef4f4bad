mod app;

use eframe::egui;
use std::path::PathBuf;

use doc_annotate::{load_font, Editor, EditorConfig};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = EditorConfig::load();
    let font = load_font(config.font_path.as_deref());
    if font.is_none() {
        log::warn!("no font available, exported text will be skipped");
    }

    let mut editor = Editor::new(&config);
    let mut startup_error = None;
    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        if let Err(err) = editor.open_path(&path) {
            log::error!("cannot open {}: {err}", path.display());
            startup_error = Some(format!("cannot open {}: {err}", path.display()));
        }
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title(app::APP_NAME),
        ..Default::default()
    };

    eframe::run_native(
        app::APP_NAME,
        options,
        Box::new(move |_cc| Ok(Box::new(app::DocAnnotateApp::new(editor, font, startup_error)))),
    )
    .map_err(|err| anyhow::anyhow!("failed to run the window: {err}"))
}
