use std::path::Path;

use image::RgbaImage;
use thiserror::Error;

use crate::color_match::QueryColor;

/// 可打开的图片扩展名（文件对话框过滤器同此）
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// 像素上限约 64M（~256MB RGBA），超过则拒绝载入
pub const MAX_PIXELS: u64 = 64_000_000;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("读取文件失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("图片解码失败: {0}")]
    Decode(#[from] image::ImageError),
    #[error("GIF解码失败: {0}")]
    Gif(#[from] gif::DecodingError),
    #[error("不支持的图片扩展名: {0:?}")]
    UnsupportedFormat(String),
    #[error("GIF没有帧")]
    NoFrames,
    #[error("图片尺寸异常: {width}x{height}")]
    TooLarge { width: u32, height: u32 },
}

/// 从磁盘加载图片为 RGBA8
/// - png/jpg/jpeg：直接解码
/// - gif：仅取首帧
pub fn load_rgba(path: &Path) -> Result<RgbaImage, ImageError> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let img = match ext.as_str() {
        "png" | "jpg" | "jpeg" => image::open(path)?.to_rgba8(),
        "gif" => first_gif_frame(path)?,
        _ => return Err(ImageError::UnsupportedFormat(ext)),
    };
    check_size(&img)?;
    log::info!("已载入图片 {}: {}x{}", path.display(), img.width(), img.height());
    Ok(img)
}

fn first_gif_frame(path: &Path) -> Result<RgbaImage, ImageError> {
    let file = std::fs::File::open(path)?;
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options.read_info(file)?;
    let (screen_w, screen_h) = (u32::from(decoder.width()), u32::from(decoder.height()));
    let frame = decoder.read_next_frame()?.ok_or(ImageError::NoFrames)?;
    // 帧可能小于逻辑屏幕，按 left/top 偏移贴到透明画布上
    let (w, h) = (u32::from(frame.width), u32::from(frame.height));
    let tile = RgbaImage::from_raw(w, h, frame.buffer.to_vec()).ok_or(ImageError::NoFrames)?;
    let mut canvas = RgbaImage::new(screen_w, screen_h);
    image::imageops::replace(&mut canvas, &tile, i64::from(frame.left), i64::from(frame.top));
    Ok(canvas)
}

/// 尺寸保护：空图或超大图都拒绝
pub fn check_size(img: &RgbaImage) -> Result<(), ImageError> {
    let (width, height) = img.dimensions();
    let pixels = u64::from(width) * u64::from(height);
    if pixels == 0 || pixels > MAX_PIXELS {
        return Err(ImageError::TooLarge { width, height });
    }
    Ok(())
}

/// 读取 (x, y) 处的颜色，忽略 alpha；越界返回 None
pub fn sample(img: &RgbaImage, x: u32, y: u32) -> Option<QueryColor> {
    let px = img.get_pixel_checked(x, y)?;
    let [r, g, b, _] = px.0;
    Some(QueryColor::new(r, g, b))
}
