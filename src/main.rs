mod app;
mod color;
mod state;
mod ui;

use std::path::PathBuf;

use accident_lens::config::DashboardConfig;
use app::AccidentLensApp;
use eframe::egui;
use state::AppState;

fn main() -> eframe::Result {
    env_logger::init();

    let config = DashboardConfig::load();
    let initial = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| config.data_path.clone());

    let mut state = AppState::new(config);
    if let Some(path) = initial {
        log::info!("Opening {}", path.display());
        state.open(&path);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Accident Lens – US Accidents Explorer",
        options,
        Box::new(|_cc| Ok(Box::new(AccidentLensApp::new(state)))),
    )
}
