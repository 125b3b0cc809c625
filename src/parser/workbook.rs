//! Roster Sheet Parser
//!
//! calamineを使用して名簿シートを読み込み、ヘッダー行から列マッピングを構築します。
//! 行番号はシート上の1始まりの番号で扱います（ヘッダーは1行目）。

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read};
use std::path::Path;
use tracing::debug;

use crate::consent::cell_text;
use crate::error::RosterError;
use crate::security::SecurityConfig;
use crate::types::{CellValue, SheetRow};

/// ヘッダー行の行番号
const HEADER_ROW: SheetRow = 1;

/// 論理列名（ヘッダー文字列）から0始まりの列インデックスへの不変マッピング
///
/// ヘッダーに存在しない名前の検索は`None`を返し、エラーにはなりません。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    indices: HashMap<String, usize>,
}

impl ColumnMapping {
    /// ヘッダーセルの並びからマッピングを構築する
    ///
    /// 空でないトリム済みの値がキーになります。大文字小文字や内部の空白は正規化しません。
    /// 同じヘッダーが複数ある場合は、後の列が優先されます。
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a CellValue>>,
    {
        let mut indices = HashMap::new();
        for (col, header) in headers.into_iter().enumerate() {
            let name = cell_text(header);
            if !name.is_empty() {
                indices.insert(name, col);
            }
        }
        Self { indices }
    }

    /// 列名から列インデックスを取得
    pub fn index(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    /// マッピングされた列の数
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// マッピングが空かどうか
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// 名簿シート（Tabular Loader）
///
/// 最初のシートのセル範囲と、ヘッダー行から構築した`ColumnMapping`を保持します。
#[derive(Debug, Clone)]
pub struct RosterSheet {
    columns: ColumnMapping,
    range: Range<Data>,
}

impl RosterSheet {
    /// パスから名簿を開く
    ///
    /// # 戻り値
    ///
    /// * `Err(RosterError::SourceNotFound)` - パスが存在しない場合
    /// * `Err(RosterError::Parse)` - スプレッドシートとして読み込めない場合
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RosterError> {
        let bytes = read_source(path.as_ref(), &SecurityConfig::default())?;
        Self::from_bytes(&bytes)
    }

    /// メモリ上のバイト列から名簿を開く
    ///
    /// シートが1枚も存在しない場合は、列もデータ行も持たない空の名簿を返します。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RosterError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

        let range = match workbook.worksheet_range_at(0) {
            Some(range) => range?,
            None => {
                debug!("workbook has no sheets; treating roster as empty");
                Range::empty()
            }
        };

        Ok(Self::from_range(range))
    }

    /// セル範囲から名簿を構築する
    pub(crate) fn from_range(range: Range<Data>) -> Self {
        let header_cells: Vec<Option<CellValue>> = match range.end() {
            Some((_, last_col)) => (0..=last_col)
                .map(|col| range.get_value((HEADER_ROW - 1, col)).map(CellValue::from))
                .collect(),
            None => Vec::new(),
        };
        let columns = ColumnMapping::from_headers(header_cells.iter().map(Option::as_ref));
        debug!(columns = columns.len(), "resolved roster header");

        Self { columns, range }
    }

    /// 列マッピングを取得
    pub fn columns(&self) -> &ColumnMapping {
        &self.columns
    }

    /// セルの値を取得する
    ///
    /// # 戻り値
    ///
    /// * `None` - 列名がマッピングされていない、またはセルが使用範囲外の場合
    /// * `Some(CellValue::Empty)` - 列は存在するがセルが空の場合
    pub fn cell(&self, row: SheetRow, name: &str) -> Option<CellValue> {
        let col = self.columns.index(name)?;
        let row0 = row.checked_sub(1)?;
        let col = u32::try_from(col).ok()?;
        self.range.get_value((row0, col)).map(CellValue::from)
    }

    /// 最後のデータが存在する行番号（1始まり）
    pub fn last_row(&self) -> SheetRow {
        self.range.end().map(|(row, _)| row + 1).unwrap_or(0)
    }

    /// データ行（2行目から最終行まで）をシート上の順序で列挙する
    pub fn data_rows(&self) -> impl Iterator<Item = SheetRow> {
        (HEADER_ROW + 1)..=self.last_row()
    }
}

/// 名簿ファイルをメモリに読み込む
///
/// ファイルハンドルはこの関数内でのみ保持され、戻る前に閉じられます。
pub(crate) fn read_source(path: &Path, security: &SecurityConfig) -> Result<Vec<u8>, RosterError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(RosterError::SourceNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    if let Ok(meta) = file.metadata() {
        security
            .check_input_size(meta.len())
            .map_err(RosterError::SecurityViolation)?;
    }

    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    fn range_from_rows(rows: Vec<Vec<Data>>) -> Range<Data> {
        let height = rows.len() as u32;
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                range.set_value((r as u32, c as u32), value);
            }
        }
        range
    }

    #[test]
    fn test_column_mapping_trims_headers() {
        let headers = [
            Some(CellValue::String("  Land ".to_string())),
            None,
            Some(CellValue::String("   ".to_string())),
            Some(CellValue::String("Vorname".to_string())),
        ];
        let mapping = ColumnMapping::from_headers(headers.iter().map(Option::as_ref));

        assert_eq!(mapping.index("Land"), Some(0));
        assert_eq!(mapping.index("Vorname"), Some(3));
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_column_mapping_is_case_sensitive() {
        let headers = [Some(CellValue::String("Land".to_string()))];
        let mapping = ColumnMapping::from_headers(headers.iter().map(Option::as_ref));

        assert_eq!(mapping.index("land"), None);
        assert_eq!(mapping.index("LAND"), None);
    }

    #[test]
    fn test_column_mapping_last_duplicate_wins() {
        let headers = [
            Some(CellValue::String("Land".to_string())),
            Some(CellValue::String("Land".to_string())),
        ];
        let mapping = ColumnMapping::from_headers(headers.iter().map(Option::as_ref));

        assert_eq!(mapping.index("Land"), Some(1));
    }

    #[test]
    fn test_cell_lookup() {
        let sheet = RosterSheet::from_range(range_from_rows(vec![
            vec![s("Land"), s("Rufname/Pseudonym")],
            vec![s("DE"), Data::Empty],
        ]));

        assert_eq!(sheet.cell(2, "Land"), Some(CellValue::String("DE".to_string())));
        assert_eq!(sheet.cell(2, "Rufname/Pseudonym"), Some(CellValue::Empty));
        assert_eq!(sheet.cell(2, "Vorname"), None);
        assert_eq!(sheet.cell(3, "Land"), None);
    }

    #[test]
    fn test_data_rows_start_after_header() {
        let sheet = RosterSheet::from_range(range_from_rows(vec![
            vec![s("Land")],
            vec![s("DE")],
            vec![s("AT")],
        ]));

        assert_eq!(sheet.data_rows().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_header_only_sheet_has_no_data_rows() {
        let sheet = RosterSheet::from_range(range_from_rows(vec![vec![s("Land")]]));
        assert_eq!(sheet.data_rows().count(), 0);
    }

    #[test]
    fn test_empty_range() {
        let sheet = RosterSheet::from_range(Range::empty());

        assert!(sheet.columns().is_empty());
        assert_eq!(sheet.last_row(), 0);
        assert_eq!(sheet.data_rows().count(), 0);
    }

    #[test]
    fn test_open_missing_file() {
        let result = RosterSheet::open("definitely/not/here.xlsx");
        assert!(matches!(result, Err(RosterError::SourceNotFound(_))));
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let result = RosterSheet::from_bytes(b"not a spreadsheet");
        assert!(matches!(result, Err(RosterError::Parse(_))));
    }
}
