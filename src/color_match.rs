use image::RgbaImage;

use crate::image_io;
use crate::palette::{is_safe_hex, Palette, PaletteEntry};

// 颜色匹配：在命名调色板中寻找与目标 RGB 最接近的颜色
// 距离使用曼哈顿距离（各通道差的绝对值之和），不是感知距离

/// 无可用颜色时的占位名称
pub const UNKNOWN_NAME: &str = "Unknown";
/// 无可用颜色时的占位 hex
pub const UNKNOWN_HEX: &str = "#000000";

/// 用户点选像素得到的查询颜色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueryColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl QueryColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[inline]
    pub fn rgb(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[u8; 3]> for QueryColor {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

/// 匹配结果：名称与 hex 来自调色板，RGB 保留查询像素的原值
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchResult {
    pub name: String,
    pub hex: String,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl MatchResult {
    /// 兜底结果：Unknown / #000000
    pub fn unknown(q: QueryColor) -> Self {
        Self { name: UNKNOWN_NAME.to_owned(), hex: UNKNOWN_HEX.to_owned(), r: q.r, g: q.g, b: q.b }
    }

    fn from_entry(e: &PaletteEntry, q: QueryColor) -> Self {
        Self { name: e.name.clone(), hex: e.hex.clone(), r: q.r, g: q.g, b: q.b }
    }
}

/// 曼哈顿距离，对称且非负，最大 765
#[inline]
pub fn manhattan(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter().zip(b.iter()).map(|(&x, &y)| u32::from(x.abs_diff(y))).sum()
}

/// 返回距离最小的条目及其距离；距离相同时保留先出现的条目。空表返回 None。
pub fn nearest_entry(q: QueryColor, palette: &Palette) -> Option<(&PaletteEntry, u32)> {
    let mut best: Option<(&PaletteEntry, u32)> = None;
    for e in palette.iter() {
        let d = manhattan(q.rgb(), e.rgb());
        // 严格小于：并列时先到先得
        if best.map_or(true, |(_, best_d)| d < best_d) {
            best = Some((e, d));
            if d == 0 { break; }
        }
    }
    best
}

/// 在 `palette` 中查找与 `q` 最接近的命名颜色，并给出距离。
/// 空表，或命中条目的 hex 不能安全嵌入时，返回 Unknown 兜底结果且没有距离。
pub fn nearest_with_distance(q: QueryColor, palette: &Palette) -> (MatchResult, Option<u32>) {
    match nearest_entry(q, palette) {
        Some((e, d)) if is_safe_hex(&e.hex) => (MatchResult::from_entry(e, q), Some(d)),
        Some((e, _)) => {
            log::warn!("调色板条目 {:?} 的 hex {:?} 无效，使用兜底结果", e.name, e.hex);
            (MatchResult::unknown(q), None)
        }
        None => (MatchResult::unknown(q), None),
    }
}

pub fn nearest(q: QueryColor, palette: &Palette) -> MatchResult {
    nearest_with_distance(q, palette).0
}

/// 图片坐标 (x, y) 取色并匹配；坐标越界返回 None
pub fn pick_at(img: &RgbaImage, x: u32, y: u32, palette: &Palette) -> Option<(MatchResult, Option<u32>)> {
    let q = image_io::sample(img, x, y)?;
    let (res, distance) = nearest_with_distance(q, palette);
    log::debug!("({x}, {y}) rgb{:?} -> {} {}", q.rgb(), res.name, res.hex);
    Some((res, distance))
}
