//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use std::path::PathBuf;
use thiserror::Error;

/// kontaktlisteクレート全体で使用するエラー型
///
/// 呼び出し元に伝播するのは、ファイル（コンテナ）レベルの失敗のみです。
/// 行単位・画像単位の異常は抽出処理の内部で吸収され、このエラー型には現れません。
///
/// # エラーの種類
///
/// - `SourceNotFound`: 名簿ファイルのパスが存在しない
/// - `PlaceholderNotFound`: プレースホルダー画像が存在しない
/// - `Io`: I/O操作中に発生したエラー
/// - `Parse`: スプレッドシートの解析中に発生したエラー（calamine由来）
/// - `Config`: ビルダー設定の検証に失敗したエラー
///
/// # 使用例
///
/// ```rust,no_run
/// use kontaktliste::{load_participants, RosterError};
///
/// match load_participants("anmeldung.xlsx", "placeholder.png", "build") {
///     Ok(participants) => println!("{} participants", participants.len()),
///     Err(RosterError::SourceNotFound(path)) => eprintln!("missing: {}", path.display()),
///     Err(e) => eprintln!("error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum RosterError {
    /// 名簿ファイルのパスが解決できない
    #[error("Roster file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// プレースホルダー画像のパスが解決できない
    #[error("Placeholder image not found: {}", .0.display())]
    PlaceholderNotFound(PathBuf),

    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// スプレッドシートの解析中に発生したエラー
    ///
    /// 破損したファイルやサポートされていない形式が原因となります。
    #[error("Failed to parse spreadsheet: {0}")]
    Parse(#[from] calamine::Error),

    /// ZIPアーカイブの解析エラー
    ///
    /// 画像アンカー解決の内部でのみ使用され、空のマップとして吸収されます。
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// 描画XMLの解析エラー
    ///
    /// `Zip`と同様に、画像アンカー解決の内部で吸収されます。
    #[error("XML parse error: {0}")]
    Xml(String),

    /// 設定の検証に失敗したエラー
    ///
    /// `ExtractorBuilder::build()`時に発生します。
    ///
    /// # 例
    ///
    /// ```rust,no_run
    /// use kontaktliste::{ExtractorBuilder, RosterError};
    ///
    /// let result = ExtractorBuilder::new().with_image_prefix("../escape").build();
    ///
    /// match result {
    ///     Err(RosterError::Config(msg)) => println!("設定エラー: {}", msg),
    ///     _ => {}
    /// }
    /// ```
    #[error("Configuration error: {0}")]
    Config(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// 入力ファイルが上限サイズを超えた場合などに発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

impl From<zip::result::ZipError> for RosterError {
    fn from(e: zip::result::ZipError) -> Self {
        RosterError::Zip(e.to_string())
    }
}

impl From<quick_xml::Error> for RosterError {
    fn from(e: quick_xml::Error) -> Self {
        RosterError::Xml(e.to_string())
    }
}
