use eframe::egui::Color32;

use crate::color_match::{MatchResult, UNKNOWN_HEX};
use crate::palette::is_safe_hex;

// 结果展示：文字摘要 + 色块。hex 只有通过校验才原样嵌入，否则用 #000000

fn display_hex(res: &MatchResult) -> &str {
    if is_safe_hex(&res.hex) { &res.hex } else { UNKNOWN_HEX }
}

pub fn rgb_label(res: &MatchResult) -> String {
    format!("({}, {}, {})", res.r, res.g, res.b)
}

/// 文字摘要，复制到剪贴板时使用。纯文本，名称原样输出，不做 HTML 转义。
pub fn summary_markdown(res: &MatchResult) -> String {
    format!(
        "### Detected Color: {}\n- RGB: {}\n- HEX: {}\n",
        res.name,
        rgb_label(res),
        display_hex(res)
    )
}

/// 100x50 的色块 HTML 片段
pub fn swatch_html(res: &MatchResult) -> String {
    format!(
        "<div style=\"width:100px; height:50px; background-color:{}; border:1px solid #000;\"></div>",
        display_hex(res)
    )
}

/// 色块在画布上的颜色
pub fn swatch_color(res: &MatchResult) -> Color32 {
    let hex = display_hex(res);
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
    Color32::from_rgb(channel(1), channel(3), channel(5))
}
