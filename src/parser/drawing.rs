//! Image Anchor Resolver
//!
//! XLSXファイル（ZIPアーカイブ）の描画レイヤーから埋め込み画像を取り出し、
//! 各画像がアンカーされているシート行を特定するモジュール。
//!
//! 処理の流れ:
//!
//! 1. 最初のシートに関連付けられた描画パート（`xl/drawings/drawingN.xml`）を特定
//! 2. 描画XMLから画像アンカー（`from`マーカーの行・列とオフセット、`r:embed`）を抽出
//! 3. 描画パートのリレーションシップから画像パート（`xl/media/*`）を解決
//! 4. 行ごとに1枚を選び、スコープ付きの一時ディレクトリへ書き出す
//!
//! 失敗はすべて内部で吸収され、空のマップになります。写真のない名簿と、
//! 描画レイヤーが壊れた名簿は同じように扱われます。

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::escape::unescape;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::RosterError;
use crate::parser::workbook::read_source;
use crate::security::{validate_zip_path, SecurityConfig};
use crate::types::{ImageFormat, SheetRow};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const FIRST_SHEET_PART: &str = "xl/worksheets/sheet1.xml";
const CONVENTIONAL_DRAWING_PART: &str = "xl/drawings/drawing1.xml";
const DRAWINGS_DIR: &str = "xl/drawings/";

const REL_TYPE_DRAWING: &str = "/drawing";
const REL_TYPE_IMAGE: &str = "/image";

/// 一時ディレクトリに書き出された画像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedImage {
    path: PathBuf,
    format: ImageFormat,
}

impl StagedImage {
    /// 書き出し先のパス
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 画像形式
    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

/// シート行番号（1始まり）から画像への対応表
///
/// 同意の有無に関係なく、アンカーされたすべての行を記録します。
/// 写真の同意判定は抽出処理側で行われます。
///
/// 書き出された画像ファイルはこのマップが所有する一時ディレクトリに置かれ、
/// マップの破棄時にディレクトリごと削除されます。
#[derive(Debug, Default)]
pub struct ImageAnchorMap {
    images: BTreeMap<SheetRow, StagedImage>,
    staging: Option<TempDir>,
}

impl ImageAnchorMap {
    /// 空のマップを作成
    pub fn empty() -> Self {
        Self::default()
    }

    /// メモリ上のXLSXバイト列から画像アンカーを解決する
    ///
    /// 失敗した場合は空のマップを返します（エラーにはなりません）。
    pub fn from_bytes(bytes: &[u8], security: &SecurityConfig) -> Self {
        let images = match read_anchored_images(Cursor::new(bytes), security) {
            Ok(images) => images,
            Err(e) => {
                debug!(error = %e, "drawing layer unavailable; no photos resolved");
                return Self::empty();
            }
        };

        if images.is_empty() {
            return Self::empty();
        }

        let staging = match tempfile::Builder::new().prefix("kontaktliste_").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "failed to create image staging directory");
                return Self::empty();
            }
        };

        let mut staged = BTreeMap::new();
        for (row, image) in images {
            let path = staging
                .path()
                .join(format!("row_{}.{}", row, image.format.extension()));
            match fs::write(&path, &image.bytes) {
                Ok(()) => {
                    staged.insert(
                        row,
                        StagedImage {
                            path,
                            format: image.format,
                        },
                    );
                }
                Err(e) => warn!(row, error = %e, "failed to stage anchored image"),
            }
        }

        Self {
            images: staged,
            staging: Some(staging),
        }
    }

    /// 指定された行にアンカーされた画像を取得
    pub fn get(&self, row: SheetRow) -> Option<&StagedImage> {
        self.images.get(&row)
    }

    /// 画像がアンカーされている行番号（昇順）
    pub fn rows(&self) -> impl Iterator<Item = SheetRow> + '_ {
        self.images.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// 一時ディレクトリのパス（画像が1枚もない場合は`None`）
    pub fn staging_dir(&self) -> Option<&Path> {
        self.staging.as_ref().map(|dir| dir.path())
    }
}

/// XLSXファイルのパスから画像アンカーを解決する
///
/// ファイルが開けない場合も含め、あらゆる失敗は空のマップになります。
pub fn resolve_image_anchors(path: impl AsRef<Path>) -> ImageAnchorMap {
    let security = SecurityConfig::default();
    match read_source(path.as_ref(), &security) {
        Ok(bytes) => ImageAnchorMap::from_bytes(&bytes, &security),
        Err(e) => {
            debug!(error = %e, "cannot read spreadsheet for image anchors");
            ImageAnchorMap::empty()
        }
    }
}

/// アーカイブから取り出した画像
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AnchoredImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

/// 描画XML内の画像アンカー
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PictureAnchor {
    /// `from`マーカーの行（0始まり）
    pub row: u32,
    pub row_off: i64,
    pub col: u32,
    pub col_off: i64,
    /// 画像パートへのリレーションシップID（`r:embed`）
    pub embed: String,
    /// 描画XML内での出現順
    pub order: usize,
}

impl PictureAnchor {
    /// アンカーが指すシート行番号（1始まり）
    pub fn sheet_row(&self) -> SheetRow {
        self.row + 1
    }

    /// 同じ行に複数の画像がある場合の優先順位（小さいほど優先）
    fn placement_key(&self) -> (i64, u32, i64, usize) {
        (self.row_off, self.col, self.col_off, self.order)
    }
}

/// リレーションシップ（`_rels/*.rels`の`Relationship`要素）
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// アーカイブから行ごとの画像を読み出す
///
/// 描画パートが存在しない場合は空のマップを返します。個々の画像の読み出しに
/// 失敗した場合、その行はスキップされます。
pub(crate) fn read_anchored_images<R: Read + Seek>(
    reader: R,
    security: &SecurityConfig,
) -> Result<BTreeMap<SheetRow, AnchoredImage>, RosterError> {
    let mut archive = ZipArchive::new(reader)?;

    if archive.len() > security.max_file_count {
        return Err(RosterError::SecurityViolation(format!(
            "ZIP archive contains too many files: {} (max: {})",
            archive.len(),
            security.max_file_count
        )));
    }

    let drawing_part = match locate_drawing_part(&mut archive, security)? {
        Some(part) => part,
        None => return Ok(BTreeMap::new()),
    };
    debug!(part = %drawing_part, "reading drawing part");

    let drawing_xml = read_entry(&mut archive, &drawing_part, security)?
        .ok_or_else(|| RosterError::Zip(format!("missing drawing part {}", drawing_part)))?;
    let anchors = select_topmost(parse_drawing_xml(&drawing_xml)?);
    if anchors.is_empty() {
        return Ok(BTreeMap::new());
    }

    let relationships = match read_entry(&mut archive, &rels_part_for(&drawing_part), security)? {
        Some(xml) => parse_relationships(&xml)?,
        None => Vec::new(),
    };
    let base_dir = parent_dir(&drawing_part);

    let mut images = BTreeMap::new();
    for (row, anchor) in anchors {
        let Some(rel) = relationships
            .iter()
            .find(|rel| rel.id == anchor.embed && !rel.external)
        else {
            warn!(row, embed = %anchor.embed, "picture relationship not found");
            continue;
        };
        if !rel.rel_type.ends_with(REL_TYPE_IMAGE) {
            debug!(row, rel_type = %rel.rel_type, "anchored relationship is not an image");
            continue;
        }
        let Some(media_part) = resolve_target(base_dir, &rel.target) else {
            warn!(row, target = %rel.target, "rejected picture target");
            continue;
        };

        match read_entry(&mut archive, &media_part, security) {
            Ok(Some(bytes)) => {
                let format = ImageFormat::detect(extension_of(&media_part), &bytes);
                images.insert(row, AnchoredImage { bytes, format });
            }
            Ok(None) => warn!(row, part = %media_part, "picture part missing from archive"),
            Err(e) => warn!(row, part = %media_part, error = %e, "failed to read picture"),
        }
    }

    Ok(images)
}

/// 最初のシートの描画パートを特定する
///
/// 1. ワークブックの最初のシートのリレーションシップにある描画
/// 2. 慣例名 `xl/drawings/drawing1.xml`
/// 3. `xl/drawings/`配下で辞書順最初のXML
fn locate_drawing_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    security: &SecurityConfig,
) -> Result<Option<String>, RosterError> {
    let sheet_part = first_sheet_part(archive, security)
        .unwrap_or_else(|| FIRST_SHEET_PART.to_string());

    if let Some(xml) = read_entry(archive, &rels_part_for(&sheet_part), security)? {
        let base_dir = parent_dir(&sheet_part);
        let drawing = parse_relationships(&xml)?
            .into_iter()
            .filter(|rel| !rel.external && rel.rel_type.ends_with(REL_TYPE_DRAWING))
            .find_map(|rel| resolve_target(base_dir, &rel.target));
        if let Some(part) = drawing {
            if archive.file_names().any(|name| name == part) {
                return Ok(Some(part));
            }
        }
    }

    let mut drawing_parts: Vec<String> = archive
        .file_names()
        .filter(|name| {
            name.starts_with(DRAWINGS_DIR) && name.ends_with(".xml") && !name.contains("_rels")
        })
        .map(|name| name.to_string())
        .collect();

    if drawing_parts.iter().any(|name| name == CONVENTIONAL_DRAWING_PART) {
        return Ok(Some(CONVENTIONAL_DRAWING_PART.to_string()));
    }

    drawing_parts.sort();
    Ok(drawing_parts.into_iter().next())
}

/// ワークブックの最初のシートのパートパスを取得する（取得できない場合は`None`）
fn first_sheet_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    security: &SecurityConfig,
) -> Option<String> {
    let workbook_xml = read_entry(archive, WORKBOOK_PART, security).ok()??;
    let rel_id = parse_first_sheet_rel_id(&workbook_xml).ok()??;
    let rels_xml = read_entry(archive, &rels_part_for(WORKBOOK_PART), security).ok()??;
    let rel = parse_relationships(&rels_xml)
        .ok()?
        .into_iter()
        .find(|rel| rel.id == rel_id)?;
    resolve_target(parent_dir(WORKBOOK_PART), &rel.target)
}

/// アーカイブ内のエントリを読み込む
///
/// エントリが存在しない場合は`Ok(None)`を返します。
fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    security: &SecurityConfig,
) -> Result<Option<Vec<u8>>, RosterError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if file.size() > security.max_image_size {
        return Err(RosterError::SecurityViolation(format!(
            "Entry '{}' exceeds maximum size: {} bytes (max: {} bytes)",
            name,
            file.size(),
            security.max_image_size
        )));
    }

    let mut content = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut content)?;
    Ok(Some(content))
}

/// パートに対応するリレーションシップパートのパス
/// （例: `xl/drawings/drawing1.xml` -> `xl/drawings/_rels/drawing1.xml.rels`）
fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

fn parent_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn extension_of(part: &str) -> Option<&str> {
    let file = part.rsplit('/').next()?;
    file.rsplit_once('.').map(|(_, ext)| ext)
}

/// リレーションシップのターゲットをアーカイブ内のパスに解決する
///
/// 相対パスはパートのディレクトリ基準で解決し、`/`始まりはアーカイブのルート基準とします。
/// ルートより上を指すパスなど、安全でない結果は`None`になります。
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> Option<String> {
    let (mut segments, relative) = match target.strip_prefix('/') {
        Some(absolute) => (Vec::new(), absolute),
        None => (
            base_dir
                .split('/')
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>(),
            target,
        ),
    };

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    segments.push("..");
                    break;
                }
            }
            other => segments.push(other),
        }
    }

    let resolved = segments.join("/");
    validate_zip_path(&resolved).ok()?;
    Some(resolved)
}

/// 行ごとに1つのアンカーを選択する
///
/// 同じ行に複数の画像がある場合は、行内オフセットが最も小さい（上にある）もの、
/// 次に列・列オフセットが最も小さい（左にある）もの、最後に描画XML内で先に
/// 現れたものを採用します。
pub(crate) fn select_topmost(anchors: Vec<PictureAnchor>) -> BTreeMap<SheetRow, PictureAnchor> {
    let mut selected: BTreeMap<SheetRow, PictureAnchor> = BTreeMap::new();
    for anchor in anchors {
        let row = anchor.sheet_row();
        match selected.get(&row) {
            Some(current) if current.placement_key() <= anchor.placement_key() => {
                debug!(row, embed = %anchor.embed, "discarding additional picture on row");
            }
            _ => {
                selected.insert(row, anchor);
            }
        }
    }
    selected
}

/// アンカーの`from`マーカー内で読み取り中の要素
#[derive(Debug, Clone, Copy)]
enum MarkerField {
    Col,
    ColOff,
    Row,
    RowOff,
}

/// 描画XMLから画像アンカーを抽出する
///
/// `twoCellAnchor`と`oneCellAnchor`のうち、`pic`要素（画像）を含むものだけを対象とします。
/// 位置が行に結び付かない`absoluteAnchor`や、グラフ・図形のアンカーは無視されます。
pub(crate) fn parse_drawing_xml(xml: &[u8]) -> Result<Vec<PictureAnchor>, RosterError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut anchors = Vec::new();

    let mut in_anchor = false;
    let mut in_from = false;
    let mut in_pic = false;
    let mut field: Option<MarkerField> = None;

    let mut row: Option<u32> = None;
    let mut row_off: i64 = 0;
    let mut col: u32 = 0;
    let mut col_off: i64 = 0;
    let mut embed: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"twoCellAnchor" | b"oneCellAnchor" => {
                    in_anchor = true;
                    row = None;
                    row_off = 0;
                    col = 0;
                    col_off = 0;
                    embed = None;
                }
                b"from" if in_anchor => in_from = true,
                b"col" if in_from => field = Some(MarkerField::Col),
                b"colOff" if in_from => field = Some(MarkerField::ColOff),
                b"row" if in_from => field = Some(MarkerField::Row),
                b"rowOff" if in_from => field = Some(MarkerField::RowOff),
                b"pic" if in_anchor => in_pic = true,
                b"blip" if in_pic => embed = embed.or(blip_embed(&e)?),
                _ => {}
            },
            Event::Empty(e) => {
                if in_pic && e.local_name().as_ref() == b"blip" {
                    embed = embed.or(blip_embed(&e)?);
                }
            }
            Event::Text(e) => {
                if let Some(current) = field {
                    let text = e.unescape()?;
                    let text = text.trim();
                    match current {
                        MarkerField::Row => row = text.parse().ok(),
                        MarkerField::RowOff => row_off = text.parse().unwrap_or(0),
                        MarkerField::Col => col = text.parse().unwrap_or(0),
                        MarkerField::ColOff => col_off = text.parse().unwrap_or(0),
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"col" | b"colOff" | b"row" | b"rowOff" => field = None,
                b"from" => in_from = false,
                b"pic" => in_pic = false,
                b"twoCellAnchor" | b"oneCellAnchor" if in_anchor => {
                    // 行番号+1がu32に収まらないアンカーは対応する行がないため捨てる
                    let row = row.filter(|row| row.checked_add(1).is_some());
                    if let (Some(row), Some(embed)) = (row, embed.take()) {
                        let order = anchors.len();
                        anchors.push(PictureAnchor {
                            row,
                            row_off,
                            col,
                            col_off,
                            embed,
                            order,
                        });
                    }
                    in_anchor = false;
                    in_from = false;
                    in_pic = false;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(anchors)
}

/// 属性値をUTF-8として読み、実体参照を展開する
fn attribute_value(attr: &Attribute<'_>) -> Result<String, RosterError> {
    let raw = std::str::from_utf8(&attr.value)
        .map_err(|e| RosterError::Xml(format!("XML attribute is not UTF-8: {}", e)))?;
    let value =
        unescape(raw).map_err(|e| RosterError::Xml(format!("XML attribute escape error: {}", e)))?;
    Ok(value.into_owned())
}

/// `blip`要素の`r:embed`属性を取得する
fn blip_embed(e: &BytesStart<'_>) -> Result<Option<String>, RosterError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| RosterError::Xml(format!("XML attribute error: {}", e)))?;
        if attr.key.local_name().as_ref() == b"embed" {
            return Ok(Some(attribute_value(&attr)?));
        }
    }
    Ok(None)
}

/// リレーションシップファイルを解析する
pub(crate) fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>, RosterError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut rel_type = String::new();
                let mut target = None;
                let mut external = false;

                for attr in e.attributes() {
                    let attr =
                        attr.map_err(|e| RosterError::Xml(format!("XML attribute error: {}", e)))?;
                    let value = attribute_value(&attr)?;
                    match attr.key.as_ref() {
                        b"Id" => id = Some(value),
                        b"Type" => rel_type = value,
                        b"Target" => target = Some(value),
                        b"TargetMode" => external = value.eq_ignore_ascii_case("External"),
                        _ => {}
                    }
                }

                // IDまたはターゲットが欠落しているものはスキップ
                if let (Some(id), Some(target)) = (id, target) {
                    relationships.push(Relationship {
                        id,
                        rel_type,
                        target,
                        external,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// `xl/workbook.xml`から最初の`sheet`要素の`r:id`を取得する
fn parse_first_sheet_rel_id(xml: &[u8]) -> Result<Option<String>, RosterError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                for attr in e.attributes() {
                    let attr =
                        attr.map_err(|e| RosterError::Xml(format!("XML attribute error: {}", e)))?;
                    if attr.key.prefix().is_some() && attr.key.local_name().as_ref() == b"id" {
                        return Ok(Some(attribute_value(&attr)?));
                    }
                }
                return Ok(None);
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}
