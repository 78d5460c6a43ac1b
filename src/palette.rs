use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use rust_embed::RustEmbed;
use thiserror::Error;

/// 环境变量：指定启动时使用的调色板 CSV
pub const ENV_PALETTE: &str = "COLOR_PICKER_PALETTE";
/// 默认调色板文件名（工作目录、可执行文件旁、内置资源均使用此名）
pub const DEFAULT_FILE: &str = "colors.csv";

const COL_NAME: &str = "color_name";
const COL_HEX: &str = "hex";
const COL_R: &str = "R";
const COL_G: &str = "G";
const COL_B: &str = "B";

/// 调色板中的一条命名颜色。`hex` 与 RGB 各自独立读取，不互相推导。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaletteEntry {
    pub name: String,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub hex: String,
}

impl PaletteEntry {
    pub fn new(name: impl Into<String>, r: u8, g: u8, b: u8, hex: impl Into<String>) -> Self {
        Self { name: name.into(), r, g, b, hex: hex.into() }
    }

    #[inline]
    pub fn rgb(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// 有序、只读的命名颜色表。加载后整体替换，不在原地修改。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Palette {
    pub fn new(entries: Vec<PaletteEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PaletteEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<PaletteEntry> for Palette {
    fn from_iter<I: IntoIterator<Item = PaletteEntry>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

/// 表级错误，全部属于 DataUnavailable 类：当前来源无法提供任何颜色，
/// 调用方记录日志后改用下一个来源或保留原调色板
#[derive(Debug, Error)]
pub enum PaletteError {
    #[error("无法读取调色板 {}: {source}", path.display())]
    Unreadable { path: PathBuf, source: io::Error },
    #[error("调色板缺少表头")]
    MissingHeader,
    #[error("调色板表头无效: {0}")]
    BadHeader(#[source] csv::Error),
    #[error("调色板缺少列 `{0}`")]
    MissingColumn(&'static str),
    #[error("内置调色板资源缺失")]
    EmbeddedMissing,
}

/// 行级错误：该行被跳过，不影响其余行
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("第 {line} 行无效: {reason}")]
pub struct MalformedEntry {
    pub line: usize,
    pub reason: String,
}

/// 一次加载的结果：有效颜色 + 被跳过的行
#[derive(Clone, Debug, Default)]
pub struct LoadReport {
    pub palette: Palette,
    pub skipped: Vec<MalformedEntry>,
}

/// 当前调色板的来源，用于状态栏展示
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaletteSource {
    Embedded,
    File(PathBuf),
    /// 所有来源都不可用
    Empty,
}

impl fmt::Display for PaletteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaletteSource::Embedded => f.write_str("内置"),
            PaletteSource::File(p) => write!(f, "{}", p.display()),
            PaletteSource::Empty => f.write_str("无"),
        }
    }
}

/// `#RRGGBB` 校验：只有通过的字符串才能原样嵌入 HTML/CSS
pub fn is_safe_hex(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 7 && b[0] == b'#' && b[1..].iter().all(u8::is_ascii_hexdigit)
}

// 表头中各必需列的位置；列顺序任意，多余列忽略
struct Columns {
    name: usize,
    hex: usize,
    r: usize,
    g: usize,
    b: usize,
}

impl Columns {
    fn from_header(header: &StringRecord) -> Result<Self, PaletteError> {
        // 列名大小写敏感；首列可能带 UTF-8 BOM
        let find = |col: &'static str| {
            header
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}') == col)
                .ok_or(PaletteError::MissingColumn(col))
        };
        Ok(Self { name: find(COL_NAME)?, hex: find(COL_HEX)?, r: find(COL_R)?, g: find(COL_G)?, b: find(COL_B)? })
    }

    fn width(&self) -> usize {
        [self.name, self.hex, self.r, self.g, self.b].into_iter().max().unwrap_or(0) + 1
    }
}

fn parse_channel(raw: &str, col: &str) -> Result<u8, String> {
    let raw = raw.trim();
    raw.parse::<u8>().map_err(|_| format!("{col} 不是 0-255 的整数: {raw:?}"))
}

fn parse_row(line: usize, record: &StringRecord, cols: &Columns) -> Result<PaletteEntry, MalformedEntry> {
    let bad = |reason: String| MalformedEntry { line, reason };
    if record.len() < cols.width() {
        return Err(bad(format!("字段数不足: {} < {}", record.len(), cols.width())));
    }
    let r = parse_channel(&record[cols.r], COL_R).map_err(bad)?;
    let g = parse_channel(&record[cols.g], COL_G).map_err(bad)?;
    let b = parse_channel(&record[cols.b], COL_B).map_err(bad)?;
    // hex 原样保留；不安全的 hex 在匹配命中时退化为 Unknown
    let hex = record[cols.hex].trim();
    if !is_safe_hex(hex) {
        log::warn!("第 {line} 行 hex 不是 #RRGGBB: {hex:?}");
    }
    Ok(PaletteEntry::new(record[cols.name].trim(), r, g, b, hex))
}

fn record_line(position: Option<&csv::Position>) -> usize {
    position.map_or(0, |p| p.line() as usize)
}

/// 解析 CSV 字节流。表头不可用时整体失败；单行错误记录后跳过。
pub fn parse_bytes(bytes: &[u8]) -> Result<LoadReport, PaletteError> {
    let mut reader = ReaderBuilder::new().has_headers(true).flexible(true).from_reader(bytes);
    let header = reader.headers().map_err(PaletteError::BadHeader)?;
    if header.is_empty() {
        return Err(PaletteError::MissingHeader);
    }
    let cols = Columns::from_header(header)?;

    let mut entries = Vec::new();
    let mut skipped = Vec::new();
    for record in reader.records() {
        // 行号取记录起始行（从 1 开始，含表头），跨行字段也按起始行计
        let row = match record {
            Ok(rec) => parse_row(record_line(rec.position()), &rec, &cols),
            Err(e) => Err(MalformedEntry { line: record_line(e.position()), reason: e.to_string() }),
        };
        match row {
            Ok(e) => entries.push(e),
            Err(e) => {
                log::warn!("跳过调色板行: {e}");
                skipped.push(e);
            }
        }
    }
    Ok(LoadReport { palette: Palette::new(entries), skipped })
}

/// 解析 CSV 文本
pub fn parse_csv(text: &str) -> Result<LoadReport, PaletteError> {
    parse_bytes(text.as_bytes())
}

/// 从磁盘读取调色板 CSV
pub fn load(path: &Path) -> Result<LoadReport, PaletteError> {
    let bytes = std::fs::read(path).map_err(|source| PaletteError::Unreadable { path: path.to_path_buf(), source })?;
    let report = parse_bytes(&bytes)?;
    log::info!(
        "已加载调色板 {}: {} 色，跳过 {} 行",
        path.display(),
        report.palette.len(),
        report.skipped.len()
    );
    Ok(report)
}

#[derive(RustEmbed)]
#[folder = "assets"]
pub struct EmbeddedAssets;

/// 构建时打包进程序的默认调色板
pub fn load_embedded() -> Result<LoadReport, PaletteError> {
    let file = EmbeddedAssets::get(DEFAULT_FILE).ok_or(PaletteError::EmbeddedMissing)?;
    let report = parse_bytes(file.data.as_ref())?;
    log::info!("已加载内置调色板: {} 色", report.palette.len());
    Ok(report)
}

/// 磁盘候选，按优先级：环境变量、工作目录、可执行文件旁
pub fn default_candidates() -> Vec<PathBuf> {
    let mut v = Vec::new();
    if let Some(p) = std::env::var_os(ENV_PALETTE) {
        v.push(PathBuf::from(p));
    }
    v.push(PathBuf::from(DEFAULT_FILE));
    if let Some(dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        v.push(dir.join(DEFAULT_FILE));
    }
    v
}

/// 依次尝试 `candidates`，都不可用时调用 `fallback`。
/// 全部失败则返回空表（匹配退化为 Unknown）。
pub fn load_first(
    candidates: &[PathBuf],
    fallback: impl FnOnce() -> Result<LoadReport, PaletteError>,
) -> (LoadReport, PaletteSource) {
    for p in candidates {
        match load(p) {
            Ok(r) => return (r, PaletteSource::File(p.clone())),
            // 默认位置没有文件是常态，不必告警
            Err(PaletteError::Unreadable { ref source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                log::debug!("{} 不存在", p.display());
            }
            Err(e) => log::warn!("{e}"),
        }
    }
    match fallback() {
        Ok(r) => (r, PaletteSource::Embedded),
        Err(e) => {
            log::error!("{e}");
            (LoadReport::default(), PaletteSource::Empty)
        }
    }
}

/// 启动时的调色板：环境变量 → 工作目录 → 可执行文件旁 → 内置
pub fn load_default() -> (LoadReport, PaletteSource) {
    load_first(&default_candidates(), load_embedded)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "color,color_name,hex,R,G,B";

    #[test]
    fn parses_rows_in_order() {
        let csv = format!("{HEADER}\nred,Red,#FF0000,255,0,0\nblack,Black,#000000,0,0,0\n");
        let report = parse_csv(&csv).unwrap();
        assert!(report.skipped.is_empty());
        let names: Vec<_> = report.palette.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Red", "Black"]);
        assert_eq!(report.palette.entries()[0], PaletteEntry::new("Red", 255, 0, 0, "#FF0000"));
    }

    #[test]
    fn malformed_row_is_skipped_not_fatal() {
        let csv = format!("{HEADER}\nbad,Bad,#123456,abc,0,0\nteal,Teal,#008080,0,128,128\n");
        let report = parse_csv(&csv).unwrap();
        assert_eq!(report.palette.len(), 1);
        assert_eq!(report.palette.entries()[0].name, "Teal");
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].line, 2);
    }

    #[test]
    fn out_of_range_and_short_rows_are_skipped() {
        let csv = format!("{HEADER}\nx,X,#FFFFFF,256,0,0\ny,Y,#FFFFFF,-1,0,0\nz,Z,#FFFFFF\nok,Ok,#010203,1,2,3\n");
        let report = parse_csv(&csv).unwrap();
        assert_eq!(report.palette.len(), 1);
        assert_eq!(report.skipped.iter().map(|m| m.line).collect::<Vec<_>>(), [2, 3, 4]);
    }

    #[test]
    fn unsafe_hex_rows_are_kept() {
        let csv = format!("{HEADER}\nevil,Evil,red;x:y,255,0,0\nshort,Short,#FFF,255,255,255\n");
        let report = parse_csv(&csv).unwrap();
        assert!(report.skipped.is_empty());
        let hexes: Vec<_> = report.palette.iter().map(|e| e.hex.as_str()).collect();
        assert_eq!(hexes, ["red;x:y", "#FFF"]);
    }

    #[test]
    fn quoted_field_may_span_lines() {
        let csv = format!("{HEADER}\nx,\"Two\nLines\",#010203,1,2,3\nred,Red,#FF0000,255,0,0\nbad,Bad,#000000,x,0,0\n");
        let report = parse_csv(&csv).unwrap();
        let names: Vec<_> = report.palette.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Two\nLines", "Red"]);
        // 行号按记录起始行计算
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].line, 5);
    }

    #[test]
    fn hex_is_kept_even_if_it_disagrees_with_rgb() {
        let csv = format!("{HEADER}\nodd,Odd,#00FF00,255,0,0\n");
        let report = parse_csv(&csv).unwrap();
        let e = &report.palette.entries()[0];
        assert_eq!(e.rgb(), [255, 0, 0]);
        assert_eq!(e.hex, "#00FF00");
    }

    #[test]
    fn quoted_fields_and_column_order() {
        let csv = "R,G,B,hex,color_name\n93,138,168,#5d8aa8,\"Air Force Blue, \"\"Raf\"\"\"\n";
        let report = parse_csv(csv).unwrap();
        assert_eq!(report.palette.entries()[0].name, "Air Force Blue, \"Raf\"");
        assert_eq!(report.palette.entries()[0].rgb(), [93, 138, 168]);
    }

    #[test]
    fn blank_lines_and_crlf_are_tolerated() {
        let csv = format!("\u{feff}{HEADER}\r\n\r\nred,Red,#FF0000,255,0,0\r\n\r\n");
        let report = parse_csv(&csv).unwrap();
        assert_eq!(report.palette.len(), 1);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn header_problems_are_fatal() {
        assert!(matches!(parse_csv(""), Err(PaletteError::MissingHeader)));
        assert!(matches!(parse_csv("name,hex,R,G,B\n"), Err(PaletteError::MissingColumn("color_name"))));
        // 列名大小写敏感
        assert!(matches!(parse_csv("color_name,hex,r,g,b\n"), Err(PaletteError::MissingColumn("R"))));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = load(Path::new("definitely/not/here/colors.csv")).unwrap_err();
        assert!(matches!(err, PaletteError::Unreadable { .. }));
    }

    fn temp_csv(tag: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("color_picker_{}_{tag}.csv", std::process::id()));
        std::fs::write(&path, body).unwrap();
        path
    }

    fn one_color(name: &str) -> Result<LoadReport, PaletteError> {
        parse_csv(&format!("{HEADER}\nx,{name},#010203,1,2,3\n"))
    }

    #[test]
    fn readable_file_wins_over_fallback() {
        let path = temp_csv("wins", &format!("{HEADER}\nred,Red,#FF0000,255,0,0\n"));
        let (report, source) = load_first(std::slice::from_ref(&path), || one_color("Fallback"));
        let _ = std::fs::remove_file(&path);
        assert_eq!(source, PaletteSource::File(path));
        assert_eq!(report.palette.entries()[0].name, "Red");
    }

    #[test]
    fn broken_candidates_fall_through() {
        let missing = PathBuf::from("definitely/not/here/colors.csv");
        let headerless = temp_csv("headerless", "name,hex\nRed,#FF0000\n");
        let good = temp_csv("good", &format!("{HEADER}\nteal,Teal,#008080,0,128,128\n"));
        let candidates = [missing, headerless.clone(), good.clone()];
        let (report, source) = load_first(&candidates, || one_color("Fallback"));
        let _ = std::fs::remove_file(&headerless);
        let _ = std::fs::remove_file(&good);
        assert_eq!(source, PaletteSource::File(good));
        assert_eq!(report.palette.entries()[0].name, "Teal");

        let (report, source) = load_first(&candidates[..1], || one_color("Fallback"));
        assert_eq!(source, PaletteSource::Embedded);
        assert_eq!(report.palette.entries()[0].name, "Fallback");
    }

    #[test]
    fn all_sources_failing_gives_empty_palette() {
        let candidates = [PathBuf::from("definitely/not/here/colors.csv")];
        let (report, source) = load_first(&candidates, || Err(PaletteError::EmbeddedMissing));
        assert_eq!(source, PaletteSource::Empty);
        assert!(report.palette.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn embedded_palette_is_clean() {
        let report = load_embedded().unwrap();
        assert!(report.palette.len() > 50);
        assert!(report.skipped.is_empty());
        assert!(report.palette.iter().all(|e| is_safe_hex(&e.hex)));
    }

    #[test]
    fn safe_hex_check() {
        assert!(is_safe_hex("#a1B2c3"));
        assert!(!is_safe_hex("a1B2c3"));
        assert!(!is_safe_hex("#a1B2c"));
        assert!(!is_safe_hex("#a1B2cg"));
        assert!(!is_safe_hex("#a1B2c3\""));
    }
}
