//! Consent Normalization Module
//!
//! 手入力された同意欄（`x`、`Ja`、`TRUE`、`1`など）を厳密な論理値に変換し、
//! テキスト欄を出力用の文字列に変換する純粋関数を提供するモジュール。
//! 同意フラグの判定はすべてこのモジュールを経由します。

use crate::types::CellValue;

/// 真と見なされる文字列（トリム・小文字化後に比較）
const TRUTHY_TOKENS: [&str; 5] = ["true", "1", "yes", "ja", "x"];

/// 同意セルの値を論理値に正規化する
///
/// | 入力 | 結果 |
/// | --- | --- |
/// | 列なし / 空セル | `false` |
/// | 論理値 | その値 |
/// | 数値 | 0以外なら`true` |
/// | その他 | トリム・小文字化した文字列が `true` `1` `yes` `ja` `x` のいずれかなら`true` |
pub fn is_truthy(value: Option<&CellValue>) -> bool {
    match value {
        None | Some(CellValue::Empty) => false,
        Some(CellValue::Bool(b)) => *b,
        Some(CellValue::Number(n)) => *n != 0.0,
        Some(other) => {
            let text = other.as_raw_string();
            let normalized = text.trim().to_lowercase();
            TRUTHY_TOKENS.contains(&normalized.as_str())
        }
    }
}

/// セルの値をトリム済みの文字列に変換する
///
/// 列なし・空セルは空文字列になります（省略はされません）。
pub fn cell_text(value: Option<&CellValue>) -> String {
    match value {
        None | Some(CellValue::Empty) => String::new(),
        Some(v) => v.as_raw_string().trim().to_string(),
    }
}
