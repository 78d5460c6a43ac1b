#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
use eframe::NativeOptions;
use env_logger::Env;

mod app;
mod palette;
mod color_match;
mod image_io;
mod render;

/// 程序入口：基于 eframe/egui 的桌面取色器
fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let native_options = NativeOptions::default();
    eframe::run_native(
        "图片取色器",
        native_options,
        Box::new(|cc| Box::new(app::ColorPickerApp::new(cc))),
    )
}
