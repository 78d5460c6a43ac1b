use std::path::{Path, PathBuf};

use eframe::egui::{self, Color32, Context, Key, Modifiers, RichText, Sense, TextureHandle};
use image::RgbaImage;
use rfd::FileDialog;

use crate::color_match::{self, MatchResult};
use crate::image_io;
use crate::palette::{self, LoadReport, Palette, PaletteSource};
use crate::render;

// 可选中文字体：项目根目录、可执行文件旁、常见系统路径
const FONT_CANDIDATES: [&str; 5] = [
    "wqy-microhei.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/System/Library/Fonts/PingFang.ttc",
    "C:\\Windows\\Fonts\\msyh.ttc",
];

pub struct ColorPickerApp {
    // 调色板在启动时加载一次，之后只会整体替换
    pub palette: Palette,
    pub palette_source: PaletteSource,
    pub skipped_rows: usize,
    // 当前图片
    pub image: Option<RgbaImage>,
    pub image_path: Option<PathBuf>,
    pub texture: Option<TextureHandle>,
    pub scale: f32,
    // 最近一次取色
    pub picked_at: Option<(u32, u32)>,
    pub result: Option<MatchResult>,
    pub distance: Option<u32>,
    pub status: String,
}

impl ColorPickerApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        setup_fonts(&cc.egui_ctx);
        setup_theme(&cc.egui_ctx);
        let (report, source) = palette::load_default();
        let mut app = Self {
            palette: Palette::default(),
            palette_source: PaletteSource::Embedded,
            skipped_rows: 0,
            image: None,
            image_path: None,
            texture: None,
            scale: 1.0,
            picked_at: None,
            result: None,
            distance: None,
            status: String::new(),
        };
        app.install_palette(report, source);
        app
    }

    fn install_palette(&mut self, report: LoadReport, source: PaletteSource) {
        self.palette = report.palette;
        self.skipped_rows = report.skipped.len();
        self.palette_source = source;
        // 换表后按同一像素重新匹配，保持结果与当前调色板一致
        if let Some((x, y)) = self.picked_at { self.pick(x, y); }
        self.status = format!("调色板: {} ({} 色，跳过 {} 行)", self.palette_source, self.palette.len(), self.skipped_rows);
    }

    fn pick(&mut self, x: u32, y: u32) {
        let Some(img) = &self.image else { return; };
        let Some((res, distance)) = color_match::pick_at(img, x, y, &self.palette) else { return; };
        self.distance = distance;
        self.picked_at = Some((x, y));
        self.status = format!("({}, {}) → {}", x, y, res.name);
        self.result = Some(res);
    }

    fn open_image(&mut self, ctx: &Context, path: &Path) {
        match image_io::load_rgba(path) {
            Ok(img) => {
                let size = [img.width() as usize, img.height() as usize];
                let color_image = egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw());
                self.texture = Some(ctx.load_texture("picked_image", color_image, egui::TextureOptions::NEAREST));
                self.image = Some(img);
                self.image_path = Some(path.to_path_buf());
                // 新图片：清除上一张的取色结果
                self.picked_at = None;
                self.result = None;
                self.distance = None;
                self.status = format!("已载入 {}，点击图片取色", path.display());
            }
            Err(e) => {
                log::warn!("{}: {e}", path.display());
                self.status = format!("打开图片失败: {}", e);
            }
        }
    }

    fn action_open_image(&mut self, ctx: &Context) {
        if let Some(path) = FileDialog::new().add_filter("图片", &image_io::IMAGE_EXTENSIONS).pick_file() {
            self.open_image(ctx, &path);
        }
    }

    fn action_open_palette(&mut self) {
        if let Some(path) = FileDialog::new().add_filter("CSV", &["csv"]).pick_file() {
            match palette::load(&path) {
                Ok(report) => self.install_palette(report, PaletteSource::File(path)),
                // 加载失败时保留当前调色板
                Err(e) => {
                    log::error!("{e}");
                    self.status = format!("加载调色板失败: {}", e);
                }
            }
        }
    }

    fn action_reset_palette(&mut self) {
        match palette::load_embedded() {
            Ok(report) => self.install_palette(report, PaletteSource::Embedded),
            Err(e) => { self.status = format!("加载内置调色板失败: {}", e); }
        }
    }

    fn action_copy_result(&mut self, ctx: &Context, as_html: bool) {
        if let Some(res) = &self.result {
            let text = if as_html { render::swatch_html(res) } else { render::summary_markdown(res) };
            ctx.output_mut(|o| o.copied_text = text);
            self.status = "已复制结果".to_owned();
        } else {
            self.status = "还没有取色结果".into();
        }
    }

    pub fn ui_menu(&mut self, ui: &mut egui::Ui, ctx: &Context) {
        ui.menu_button("文件", |ui| {
            if ui.button("打开图片... (Ctrl+O)").clicked() {
                ui.close_menu();
                self.action_open_image(ctx);
            }
            ui.separator();
            if ui.button("打开调色板 CSV... (Ctrl+P)").clicked() {
                ui.close_menu();
                self.action_open_palette();
            }
            if ui.button("恢复内置调色板").clicked() {
                ui.close_menu();
                self.action_reset_palette();
            }
            ui.separator();
            if ui.add_enabled(self.result.is_some(), egui::Button::new("复制结果")).clicked() {
                ui.close_menu();
                self.action_copy_result(ctx, false);
            }
            if ui.add_enabled(self.result.is_some(), egui::Button::new("复制 HTML 色块")).clicked() {
                ui.close_menu();
                self.action_copy_result(ctx, true);
            }
        });

        ui.separator();
        ui.label(RichText::new(&self.status).color(Color32::LIGHT_GRAY));
    }

    fn ui_result(&mut self, ui: &mut egui::Ui, ctx: &Context) {
        ui.heading("检测结果");
        let mut copy = false;
        match &self.result {
            Some(res) => {
                ui.label(RichText::new(&res.name).size(20.0).strong());
                ui.label(format!("RGB: {}", render::rgb_label(res)));
                ui.label(format!("HEX: {}", res.hex));
                if let Some(d) = self.distance { ui.label(format!("距离: {}", d)); }
                let (rect, _) = ui.allocate_exact_size(egui::vec2(100.0, 50.0), Sense::hover());
                ui.painter().rect_filled(rect, 0.0, render::swatch_color(res));
                ui.painter().rect_stroke(rect, 0.0, egui::Stroke::new(1.0, Color32::BLACK));
                // 像素原色，便于与命名颜色对照
                let (rect, _) = ui.allocate_exact_size(egui::vec2(100.0, 20.0), Sense::hover());
                ui.painter().rect_filled(rect, 0.0, Color32::from_rgb(res.r, res.g, res.b));
                copy = ui.button("复制结果").clicked();
            }
            None => { ui.label("点击图片任意位置取色"); }
        }
        if copy { self.action_copy_result(ctx, false); }

        ui.separator();
        ui.heading("调色板");
        ui.label(format!("来源: {}", self.palette_source));
        ui.label(format!("颜色数: {}", self.palette.len()));
        if self.skipped_rows > 0 {
            ui.label(RichText::new(format!("跳过无效行: {}", self.skipped_rows)).color(Color32::YELLOW));
        }
        if self.palette.is_empty() {
            ui.label(RichText::new("调色板为空，所有结果均为 Unknown").color(Color32::YELLOW));
            return;
        }
        egui::CollapsingHeader::new("全部颜色").show(ui, |ui| {
            egui::ScrollArea::vertical().max_height(320.0).show(ui, |ui| {
                for e in self.palette.entries() {
                    ui.horizontal(|ui| {
                        let (rect, _) = ui.allocate_exact_size(egui::vec2(14.0, 14.0), Sense::hover());
                        ui.painter().rect_filled(rect, 2.0, Color32::from_rgb(e.r, e.g, e.b));
                        ui.label(format!("{}  {}", e.name, e.hex));
                    });
                }
            });
        });
    }
}

fn setup_fonts(ctx: &egui::Context) {
    let mut fonts = egui::FontDefinitions::default();

    let mut candidates: Vec<PathBuf> = FONT_CANDIDATES.into_iter().map(PathBuf::from).collect();
    if let Some(dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        candidates.insert(1, dir.join(FONT_CANDIDATES[0]));
    }
    let Some(bytes) = candidates.iter().find_map(|p| std::fs::read(p).ok()) else {
        log::warn!("未找到中文字体，界面文字可能无法显示");
        return;
    };

    fonts.font_data.insert("cjk".to_owned(), egui::FontData::from_owned(bytes));
    // 将中文字体置于优先位置
    fonts.families.entry(egui::FontFamily::Proportional).or_default().insert(0, "cjk".to_owned());
    fonts.families.entry(egui::FontFamily::Monospace).or_default().insert(0, "cjk".to_owned());
    ctx.set_fonts(fonts);
}

fn setup_theme(ctx: &egui::Context) {
    ctx.set_visuals(egui::Visuals::dark());
}

impl eframe::App for ColorPickerApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        // 顶部菜单栏
        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| { self.ui_menu(ui, ctx); });
        });

        // 右侧：结果与调色板信息
        egui::SidePanel::right("result").resizable(true).default_width(240.0).show(ctx, |ui| {
            self.ui_result(ui, ctx);
        });

        // 底部：缩放
        egui::TopBottomPanel::bottom("bottom").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("缩放");
                ui.add(egui::Slider::new(&mut self.scale, 0.1..=12.0).logarithmic(true));
                if let Some(img) = &self.image {
                    ui.separator();
                    ui.label(format!("{}x{}", img.width(), img.height()));
                }
                if let Some(p) = &self.image_path {
                    ui.separator();
                    ui.label(p.display().to_string());
                }
            });
        });

        // 中央：图片画布
        let mut clicked_px: Option<(u32, u32)> = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(tex) = &self.texture else {
                ui.centered_and_justified(|ui| { ui.label("打开或拖入一张图片开始取色"); });
                return;
            };
            egui::ScrollArea::both().show(ui, |ui| {
                let size = tex.size_vec2() * self.scale;
                let (rect, response) = ui.allocate_exact_size(size, Sense::click());
                let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                ui.painter().image(tex.id(), rect, uv, Color32::WHITE);

                if response.clicked() {
                    if let Some(pos) = response.interact_pointer_pos() {
                        let local = (pos - rect.min) / self.scale;
                        if local.x >= 0.0 && local.y >= 0.0 {
                            clicked_px = Some((local.x.floor() as u32, local.y.floor() as u32));
                        }
                    }
                }
                // 标出上次取色的像素
                if let Some((x, y)) = self.picked_at {
                    let min = rect.min + egui::vec2(x as f32, y as f32) * self.scale;
                    let marker = egui::Rect::from_min_size(min, egui::vec2(self.scale, self.scale)).expand(2.0);
                    ui.painter().rect_stroke(marker, 0.0, egui::Stroke::new(1.5, Color32::WHITE));
                }
            });
        });
        if let Some((x, y)) = clicked_px { self.pick(x, y); }

        // 拖入文件即打开
        let dropped: Vec<PathBuf> = ctx.input(|i| i.raw.dropped_files.iter().filter_map(|f| f.path.clone()).collect());
        if let Some(path) = dropped.first() {
            let is_csv = path.extension().and_then(|s| s.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("csv"));
            if is_csv {
                match palette::load(path) {
                    Ok(report) => self.install_palette(report, PaletteSource::File(path.clone())),
                    Err(e) => { self.status = format!("加载调色板失败: {}", e); }
                }
            } else {
                self.open_image(ctx, path);
            }
        }

        // 快捷键
        if ctx.input(|i| i.modifiers == Modifiers::CTRL && i.key_pressed(Key::O)) { self.action_open_image(ctx); }
        if ctx.input(|i| i.modifiers == Modifiers::CTRL && i.key_pressed(Key::P)) { self.action_open_palette(); }
        // Ctrl+C 在 egui 中以 Copy 事件送达
        if ctx.input(|i| i.events.iter().any(|e| matches!(e, egui::Event::Copy))) { self.action_copy_result(ctx, false); }
    }
}
