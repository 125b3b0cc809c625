//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use calamine::Data;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// シート上の行番号（1始まり、ヘッダーは1行目、データは2行目から）
pub type SheetRow = u32;

/// セルの値を表す列挙型
///
/// calamineの`Data`をスプレッドシート非依存の形に変換したもの。
/// 列の型は強制されないため、同じ列に論理値・数値・文字列が混在し得ます。
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// 数値（f64）
    Number(f64),

    /// 文字列
    String(String),

    /// 論理値
    Bool(bool),

    /// 日時
    DateTime(NaiveDateTime),

    /// エラー値（例: #N/A）
    Error(String),

    /// 空セル
    Empty,
}

impl CellValue {
    /// 値が空かどうかを判定
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// 値を文字列として取得（トリム前）
    ///
    /// 整数値の数値は小数部なしで出力されます（`41791234567.0` -> `"41791234567"`）。
    pub fn as_raw_string(&self) -> String {
        match self {
            CellValue::Number(n) => n.to_string(),
            CellValue::String(s) => s.clone(),
            // スプレッドシートの表記に合わせて大文字で出力する
            CellValue::Bool(true) => "TRUE".to_string(),
            CellValue::Bool(false) => "FALSE".to_string(),
            CellValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            CellValue::Error(e) => e.clone(),
            CellValue::Empty => String::new(),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) => CellValue::String(s.clone()),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
                Some(datetime) => CellValue::DateTime(datetime),
                None => CellValue::Number(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
            Data::Error(e) => CellValue::Error(e.to_string()),
            Data::Empty => CellValue::Empty,
        }
    }
}

/// Excelのシリアル値（1900年エポック）を日時に変換
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

/// 埋め込み画像のラスター形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    /// PNG（判定できない場合のデフォルト）
    #[default]
    Png,
    /// JPEG
    Jpeg,
    /// GIF
    Gif,
}

impl ImageFormat {
    /// ファイル拡張子から形式を判定する（大文字小文字は区別しない）
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "gif" => Some(ImageFormat::Gif),
            _ => None,
        }
    }

    /// 先頭のマジックバイトから形式を判定する
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF8") {
            Some(ImageFormat::Gif)
        } else {
            None
        }
    }

    /// 宣言された拡張子、マジックバイト、PNGの順で形式を決定する
    pub fn detect(declared_ext: Option<&str>, bytes: &[u8]) -> Self {
        declared_ext
            .and_then(Self::from_extension)
            .or_else(|| Self::sniff(bytes))
            .unwrap_or_default()
    }

    /// 出力ファイルに使用する拡張子（ドットなし）
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
        }
    }
}

/// 写真の出所
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSource {
    /// 参加者の行にアンカーされた埋め込み画像
    Anchored,
    /// プレースホルダー画像
    Placeholder,
}

/// 参加者レコード（出力単位）
///
/// `country`、`alias`、`couch`、`photo`は常に存在します。
/// 条件付きフィールド（`email`、`phone`、`family_name`、`given_name`）は、
/// 対応する同意フラグが真の場合にのみ`Some`になります。`None`は「同意なし」、
/// `Some(String::new())`は「同意ありだが値が空」を意味し、両者は区別されます。
///
/// シリアライズ時、`None`のフィールドはキーごと省略されます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// 国
    #[serde(rename = "land")]
    pub country: String,

    /// 呼び名・ペンネーム
    #[serde(rename = "rufname")]
    pub alias: String,

    /// カウチ（宿泊提供）欄
    pub couch: String,

    /// メールアドレス（同意がある場合のみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// 電話番号（同意がある場合のみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// 姓（同意がある場合のみ）
    #[serde(rename = "nachname", default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    /// 名（同意がある場合のみ）
    #[serde(rename = "vorname", default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    /// 写真ファイルのパス（常に読み取り可能な画像を指す）
    #[serde(rename = "image_path")]
    pub photo: PathBuf,

    /// 写真の出所
    #[serde(skip, default = "placeholder_source")]
    pub photo_source: PhotoSource,
}

fn placeholder_source() -> PhotoSource {
    PhotoSource::Placeholder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_from_data() {
        assert_eq!(CellValue::from(&Data::Int(3)), CellValue::Number(3.0));
        assert_eq!(CellValue::from(&Data::Float(0.5)), CellValue::Number(0.5));
        assert_eq!(CellValue::from(&Data::Bool(true)), CellValue::Bool(true));
        assert_eq!(
            CellValue::from(&Data::String("Ja".to_string())),
            CellValue::String("Ja".to_string())
        );
        assert_eq!(CellValue::from(&Data::Empty), CellValue::Empty);
    }

    #[test]
    fn test_as_raw_string_integral_number() {
        assert_eq!(CellValue::Number(41791234567.0).as_raw_string(), "41791234567");
        assert_eq!(CellValue::Number(1.5).as_raw_string(), "1.5");
    }

    #[test]
    fn test_as_raw_string_bool() {
        assert_eq!(CellValue::Bool(true).as_raw_string(), "TRUE");
        assert_eq!(CellValue::Bool(false).as_raw_string(), "FALSE");
    }

    #[test]
    fn test_as_raw_string_datetime() {
        let dt = excel_serial_to_datetime(45413.5).unwrap();
        assert_eq!(CellValue::DateTime(dt).as_raw_string(), "2024-05-01 12:00:00");
    }

    #[test]
    fn test_image_format_from_extension() {
        assert_eq!(ImageFormat::from_extension("PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_extension("jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("gif"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::from_extension("emf"), None);
    }

    #[test]
    fn test_image_format_detect_defaults_to_png() {
        assert_eq!(ImageFormat::detect(Some("emf"), b"\x01\x00\x00\x00"), ImageFormat::Png);
        assert_eq!(ImageFormat::detect(None, b""), ImageFormat::Png);
    }

    #[test]
    fn test_image_format_detect_sniffs_unknown_extension() {
        assert_eq!(ImageFormat::detect(Some("bin"), b"GIF89a...."), ImageFormat::Gif);
        assert_eq!(
            ImageFormat::detect(None, &[0xFF, 0xD8, 0xFF, 0xE0]),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_participant_serialization_omits_absent_fields() {
        let participant = Participant {
            country: "CH".to_string(),
            alias: "Alias".to_string(),
            couch: String::new(),
            email: Some("a@b.ch".to_string()),
            phone: None,
            family_name: None,
            given_name: Some(String::new()),
            photo: PathBuf::from("teilnehmer_0.png"),
            photo_source: PhotoSource::Placeholder,
        };

        let value = serde_json::to_value(&participant).unwrap();
        let object = value.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();

        assert_eq!(
            keys,
            vec!["couch", "email", "image_path", "land", "rufname", "vorname"]
        );
        assert_eq!(object["vorname"], "");
    }
}
