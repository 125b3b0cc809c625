//! Output Format Module
//!
//! 参加者リストの出力フォーマットを抽象化するモジュール。

mod formatters;

use crate::api::OutputFormat;
use crate::error::RosterError;
use crate::types::Participant;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub use formatters::{image_data_url, HtmlFormatter, JsonFormatter};

/// 出力フォーマッター
///
/// 各出力フォーマット（HTML, JSON）をenumとして表現します。
#[derive(Debug, Clone, Copy)]
pub enum OutputFormatter {
    Html,
    Json,
}

impl OutputFormatter {
    /// 出力フォーマットからフォーマッターを生成
    pub fn from_format(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Html => OutputFormatter::Html,
            OutputFormat::Json => OutputFormatter::Json,
        }
    }

    /// 参加者リストを指定されたフォーマットで出力する
    pub fn render<W: Write>(
        &self,
        participants: &[Participant],
        writer: &mut W,
    ) -> Result<(), RosterError> {
        match self {
            OutputFormatter::Html => HtmlFormatter.render(participants, writer),
            OutputFormatter::Json => JsonFormatter.render(participants, writer),
        }
    }
}

/// 参加者リストをファイルに出力する
///
/// # 戻り値
///
/// * `Ok(())` - 出力に成功した場合
/// * `Err(RosterError::Io)` - ファイルの作成・書き込みに失敗した場合
pub fn render_to_file(
    participants: &[Participant],
    path: impl AsRef<Path>,
    format: OutputFormat,
) -> Result<(), RosterError> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    OutputFormatter::from_format(format).render(participants, &mut writer)?;
    writer.flush()?;
    Ok(())
}
