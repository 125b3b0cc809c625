//! Output Formatters Implementation
//!
//! 各出力フォーマットの実装を提供するモジュール。

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::warn;

use crate::error::RosterError;
use crate::types::Participant;

const HTML_TITLE: &str = "Teilnehmendenkontaktliste";

const HTML_STYLE: &str = "\
body { font-family: sans-serif; margin: 1.5cm; }
h1 { font-size: 1.4em; }
.columns { column-count: 2; column-gap: 1cm; }
.participant { break-inside: avoid; display: flex; gap: 0.4cm; margin-bottom: 0.5cm; }
.participant img { width: 2.5cm; height: 2.5cm; object-fit: cover; }
.participant dl { margin: 0; }
.participant dt { font-weight: bold; }
.participant dd { margin: 0 0 0.1cm 0; }";

/// 画像ファイルを`data:`URLに変換する
///
/// MIMEタイプは拡張子から決定します（不明な場合は`image/png`）。
/// ファイルが読めない場合は空文字列を返します。
pub fn image_data_url(path: &Path) -> String {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "photo not readable; rendering without image");
            return String::new();
        }
    };

    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/png",
    };

    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}

/// HTMLの特殊文字をエスケープ
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// HTML形式のフォーマッター
///
/// 写真を埋め込んだ単一のHTMLファイルを出力します。
/// 同意のないフィールド（`None`）は項目ごと出力されません。
pub struct HtmlFormatter;

impl HtmlFormatter {
    pub fn render<W: Write>(
        &self,
        participants: &[Participant],
        writer: &mut W,
    ) -> Result<(), RosterError> {
        writeln!(writer, "<!DOCTYPE html>")?;
        writeln!(writer, "<html lang=\"de\">")?;
        writeln!(writer, "<head>")?;
        writeln!(writer, "  <meta charset=\"utf-8\">")?;
        writeln!(writer, "  <title>{}</title>", HTML_TITLE)?;
        writeln!(writer, "  <style>\n{}\n  </style>", HTML_STYLE)?;
        writeln!(writer, "</head>")?;
        writeln!(writer, "<body>")?;
        writeln!(writer, "  <h1>{}</h1>", HTML_TITLE)?;
        writeln!(writer, "  <div class=\"columns\">")?;

        for participant in participants {
            self.render_participant(participant, writer)?;
        }

        writeln!(writer, "  </div>")?;
        writeln!(writer, "</body>")?;
        writeln!(writer, "</html>")?;
        writer.flush()?;
        Ok(())
    }

    fn render_participant<W: Write>(
        &self,
        participant: &Participant,
        writer: &mut W,
    ) -> Result<(), RosterError> {
        writeln!(writer, "    <div class=\"participant\">")?;
        writeln!(
            writer,
            "      <img src=\"{}\" alt=\"{}\">",
            image_data_url(&participant.photo),
            escape_html(&participant.alias)
        )?;
        writeln!(writer, "      <dl>")?;

        let full_name = [&participant.given_name, &participant.family_name]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        let mut fields: Vec<(&str, &str)> = vec![
            ("Rufname", participant.alias.as_str()),
            ("Land", participant.country.as_str()),
        ];
        if !full_name.is_empty() {
            fields.push(("Name", full_name.as_str()));
        }
        if let Some(email) = &participant.email {
            fields.push(("E-Mail", email.as_str()));
        }
        if let Some(phone) = &participant.phone {
            fields.push(("Telefon", phone.as_str()));
        }
        fields.push(("Couch", participant.couch.as_str()));

        for (label, value) in fields {
            writeln!(
                writer,
                "        <dt>{}</dt><dd>{}</dd>",
                label,
                escape_html(value)
            )?;
        }

        writeln!(writer, "      </dl>")?;
        writeln!(writer, "    </div>")?;
        Ok(())
    }
}

/// JSON形式のフォーマッター
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn render<W: Write>(
        &self,
        participants: &[Participant],
        writer: &mut W,
    ) -> Result<(), RosterError> {
        serde_json::to_writer_pretty(&mut *writer, participants)
            .map_err(|e| RosterError::Io(e.into()))?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}
