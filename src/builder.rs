//! Builder Module
//!
//! Fluent Builder APIを提供し、`Extractor`インスタンスを段階的に構築する。

use std::fs;
use std::path::Path;
use tracing::debug;

use crate::api::RosterColumns;
use crate::error::RosterError;
use crate::extractor::ExtractionPass;
use crate::parser::{read_source, ImageAnchorMap, RosterSheet};
use crate::security::SecurityConfig;
use crate::types::Participant;

/// 写真ファイル名の既定の接頭辞
const DEFAULT_IMAGE_PREFIX: &str = "teilnehmer";

/// 抽出処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct ExtractionConfig {
    /// ヘッダー文字列
    pub columns: RosterColumns,

    /// 出力する写真ファイル名の接頭辞
    pub image_prefix: String,

    /// セキュリティ制限
    pub security: SecurityConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            columns: RosterColumns::default(),
            image_prefix: DEFAULT_IMAGE_PREFIX.to_string(),
            security: SecurityConfig::default(),
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use kontaktliste::{ExtractorBuilder, RosterColumns};
///
/// # fn main() -> Result<(), kontaktliste::RosterError> {
/// let extractor = ExtractorBuilder::new()
///     .with_image_prefix("participant")
///     .build()?;
/// let participants = extractor.extract("anmeldung.xlsx", "data/placeholder.png", "build")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ExtractorBuilder {
    /// 内部設定（構築中）
    config: ExtractionConfig,
}

impl ExtractorBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - ヘッダー: `RosterColumns::default()`（申込フォームの列名）
    /// - 写真ファイル名の接頭辞: `teilnehmer`
    /// - セキュリティ制限: `SecurityConfig::default()`
    pub fn new() -> Self {
        Self {
            config: ExtractionConfig::default(),
        }
    }

    /// ヘッダー文字列を指定する
    pub fn with_columns(mut self, columns: RosterColumns) -> Self {
        self.config.columns = columns;
        self
    }

    /// 出力する写真ファイル名の接頭辞を指定する
    ///
    /// ファイル名は `{prefix}_{出力位置}.{拡張子}` になります。
    pub fn with_image_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.image_prefix = prefix.into();
        self
    }

    /// セキュリティ制限を指定する
    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.config.security = security;
        self
    }

    /// 設定を検証し、`Extractor`インスタンスを生成する
    ///
    /// # 戻り値
    ///
    /// * `Err(RosterError::Config)` - ヘッダー名が空、または接頭辞が空・パス区切りを含む場合
    pub fn build(self) -> Result<Extractor, RosterError> {
        for (field, header) in self.config.columns.entries() {
            if header.trim().is_empty() {
                return Err(RosterError::Config(format!(
                    "Header for '{}' must not be empty",
                    field
                )));
            }
            if header.trim() != header {
                return Err(RosterError::Config(format!(
                    "Header for '{}' must not have surrounding whitespace: {:?}",
                    field, header
                )));
            }
        }

        let prefix = &self.config.image_prefix;
        if prefix.is_empty() {
            return Err(RosterError::Config(
                "Image prefix must not be empty".to_string(),
            ));
        }
        if prefix.contains(['/', '\\']) || prefix.contains("..") {
            return Err(RosterError::Config(format!(
                "Image prefix must be a plain file name: {:?}",
                prefix
            )));
        }

        Ok(Extractor::new(self.config))
    }
}

/// 名簿から参加者リストを抽出する構造体
///
/// `ExtractorBuilder`を使用して構築します。
#[derive(Debug, Clone)]
pub struct Extractor {
    config: ExtractionConfig,
}

impl Extractor {
    pub(crate) fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// 名簿ファイルから参加者リストを抽出する
    ///
    /// # 引数
    ///
    /// * `xlsx_path` - 名簿ファイルのパス
    /// * `placeholder` - 写真がない場合に使用するプレースホルダー画像
    /// * `output_dir` - 写真のコピー先（存在しない場合は作成される）
    ///
    /// # 戻り値
    ///
    /// * `Ok(Vec<Participant>)` - シート上の順序で、包括同意のある参加者のみ
    /// * `Err(RosterError::SourceNotFound)` - 名簿ファイルが存在しない場合
    /// * `Err(RosterError::PlaceholderNotFound)` - プレースホルダー画像が存在しない場合
    /// * `Err(RosterError::Parse)` - 名簿ファイルがスプレッドシートとして読めない場合
    ///
    /// 行単位・画像単位の異常はエラーにならず、「同意なし」「プレースホルダー」として扱われます。
    pub fn extract(
        &self,
        xlsx_path: impl AsRef<Path>,
        placeholder: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> Result<Vec<Participant>, RosterError> {
        let xlsx_path = xlsx_path.as_ref();
        let placeholder = placeholder.as_ref();
        let output_dir = output_dir.as_ref();

        if !placeholder.is_file() {
            return Err(RosterError::PlaceholderNotFound(placeholder.to_path_buf()));
        }

        let bytes = read_source(xlsx_path, &self.config.security)?;
        debug!(path = %xlsx_path.display(), size = bytes.len(), "roster loaded");

        // 表として読めない名簿からは画像を書き出さない
        let sheet = RosterSheet::from_bytes(&bytes)?;
        let anchors = ImageAnchorMap::from_bytes(&bytes, &self.config.security);

        fs::create_dir_all(output_dir)?;
        Ok(self.extract_from_parts(&sheet, &anchors, placeholder, output_dir))
    }

    /// 読み込み済みの名簿シートと画像アンカーから参加者リストを組み立てる
    ///
    /// `output_dir`は存在している必要があります。
    pub fn extract_from_parts(
        &self,
        sheet: &RosterSheet,
        anchors: &ImageAnchorMap,
        placeholder: &Path,
        output_dir: &Path,
    ) -> Vec<Participant> {
        ExtractionPass {
            columns: &self.config.columns,
            image_prefix: &self.config.image_prefix,
            sheet,
            anchors,
            placeholder,
            output_dir,
        }
        .run()
    }
}

/// デフォルト設定で名簿から参加者リストを抽出する
///
/// `ExtractorBuilder::new().build()?.extract(...)`の短縮形です。
pub fn load_participants(
    xlsx_path: impl AsRef<Path>,
    placeholder: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
) -> Result<Vec<Participant>, RosterError> {
    ExtractorBuilder::new()
        .build()?
        .extract(xlsx_path, placeholder, output_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extractor_builder_new() {
        let builder = ExtractorBuilder::new();
        assert_eq!(builder.config.image_prefix, "teilnehmer");
        assert_eq!(builder.config.columns, RosterColumns::default());
    }

    #[test]
    fn test_builder_method_chaining() {
        let columns = RosterColumns {
            country: "Country".to_string(),
            ..RosterColumns::default()
        };
        let builder = ExtractorBuilder::new()
            .with_columns(columns.clone())
            .with_image_prefix("p")
            .with_security(SecurityConfig {
                max_file_count: 10,
                ..SecurityConfig::default()
            });

        assert_eq!(builder.config.columns, columns);
        assert_eq!(builder.config.image_prefix, "p");
        assert_eq!(builder.config.security.max_file_count, 10);
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_build_rejects_empty_header() {
        let result = ExtractorBuilder::new()
            .with_columns(RosterColumns {
                email: "  ".to_string(),
                ..RosterColumns::default()
            })
            .build();

        match result {
            Err(RosterError::Config(msg)) => assert!(msg.contains("email")),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_build_rejects_untrimmed_header() {
        let result = ExtractorBuilder::new()
            .with_columns(RosterColumns {
                country: " Land".to_string(),
                ..RosterColumns::default()
            })
            .build();
        assert!(matches!(result, Err(RosterError::Config(_))));
    }

    #[test]
    fn test_build_rejects_bad_prefix() {
        for prefix in ["", "../x", "a/b", "a\\b"] {
            let result = ExtractorBuilder::new().with_image_prefix(prefix).build();
            assert!(
                matches!(result, Err(RosterError::Config(_))),
                "prefix {:?} should be rejected",
                prefix
            );
        }
    }

    #[test]
    fn test_extract_missing_source() {
        let dir = TempDir::new().unwrap();
        let placeholder = dir.path().join("placeholder.png");
        fs::write(&placeholder, b"png").unwrap();

        let result = load_participants(dir.path().join("missing.xlsx"), &placeholder, dir.path());
        assert!(matches!(result, Err(RosterError::SourceNotFound(_))));
    }

    #[test]
    fn test_extract_missing_placeholder() {
        let dir = TempDir::new().unwrap();
        let result = load_participants(
            dir.path().join("roster.xlsx"),
            dir.path().join("placeholder.png"),
            dir.path(),
        );
        assert!(matches!(result, Err(RosterError::PlaceholderNotFound(_))));
    }

    #[test]
    fn test_extract_corrupt_source() {
        let dir = TempDir::new().unwrap();
        let placeholder = dir.path().join("placeholder.png");
        fs::write(&placeholder, b"png").unwrap();
        let roster = dir.path().join("roster.xlsx");
        fs::write(&roster, b"this is not a spreadsheet").unwrap();

        let result = load_participants(&roster, &placeholder, dir.path().join("out"));
        assert!(matches!(result, Err(RosterError::Parse(_))));
    }

    #[test]
    fn test_extract_corrupt_roster_with_embedded_images() {
        use std::io::{Cursor, Write};
        use zip::write::{FileOptions, ZipWriter};
        use zip::CompressionMethod;

        // 描画パートと画像はあるが、ワークブック本体がないアーカイブ
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        writer.start_file("xl/drawings/drawing1.xml", options).unwrap();
        writer.write_all(b"<xdr:wsDr/>").unwrap();
        writer.start_file("xl/media/image1.png", options).unwrap();
        writer.write_all(b"\x89PNG\r\n\x1a\n").unwrap();
        let archive = writer.finish().unwrap().into_inner();

        let dir = TempDir::new().unwrap();
        let placeholder = dir.path().join("placeholder.png");
        fs::write(&placeholder, b"png").unwrap();
        let roster = dir.path().join("roster.xlsx");
        fs::write(&roster, archive).unwrap();
        let output = dir.path().join("out");

        let result = load_participants(&roster, &placeholder, &output);
        assert!(matches!(result, Err(RosterError::Parse(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_extract_rejects_oversized_input() {
        let dir = TempDir::new().unwrap();
        let placeholder = dir.path().join("placeholder.png");
        fs::write(&placeholder, b"png").unwrap();
        let roster = dir.path().join("roster.xlsx");
        fs::write(&roster, vec![0u8; 64]).unwrap();

        let extractor = ExtractorBuilder::new()
            .with_security(SecurityConfig {
                max_input_file_size: 16,
                ..SecurityConfig::default()
            })
            .build()
            .unwrap();

        let result = extractor.extract(&roster, &placeholder, dir.path());
        assert!(matches!(result, Err(RosterError::SecurityViolation(_))));
    }
}
