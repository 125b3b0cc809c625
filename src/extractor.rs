//! Consent-Resolving Extractor
//!
//! 名簿シートを1行ずつ走査し、同意に基づいて参加者レコードを組み立てるモジュール。
//! 行の出力順はシート上の順序のまま（包括同意のある行のみ）です。

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::api::RosterColumns;
use crate::consent::{cell_text, is_truthy};
use crate::parser::{ImageAnchorMap, RosterSheet, StagedImage};
use crate::types::{Participant, PhotoSource, SheetRow};

/// 1行分の個別同意フラグ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ConsentFlags {
    pub email: bool,
    pub phone: bool,
    pub family_name: bool,
    pub given_name: bool,
    pub photo: bool,
}

impl ConsentFlags {
    fn read(sheet: &RosterSheet, row: SheetRow, columns: &RosterColumns) -> Self {
        let flag = |name: &str| is_truthy(sheet.cell(row, name).as_ref());
        Self {
            email: flag(&columns.email_consent),
            phone: flag(&columns.phone_consent),
            family_name: flag(&columns.family_name_consent),
            given_name: flag(&columns.given_name_consent),
            photo: flag(&columns.photo_consent),
        }
    }
}

/// 抽出処理の入力一式
pub(crate) struct ExtractionPass<'a> {
    pub columns: &'a RosterColumns,
    pub image_prefix: &'a str,
    pub sheet: &'a RosterSheet,
    pub anchors: &'a ImageAnchorMap,
    pub placeholder: &'a Path,
    pub output_dir: &'a Path,
}

impl ExtractionPass<'_> {
    /// シート上の順序で全データ行を処理する
    ///
    /// 行単位・画像単位の異常はすべて吸収されるため、このメソッドは失敗しません。
    pub fn run(&self) -> Vec<Participant> {
        let mut participants: Vec<Participant> = Vec::new();
        let mut rows_scanned = 0usize;
        let mut photos = 0usize;

        for row in self.sheet.data_rows() {
            rows_scanned += 1;

            if !is_truthy(self.sheet.cell(row, &self.columns.blanket_consent).as_ref()) {
                debug!(row, "no blanket consent; row skipped");
                continue;
            }

            let consent = ConsentFlags::read(self.sheet, row, self.columns);
            let position = participants.len();

            let staged = if consent.photo {
                self.anchors.get(row)
            } else {
                None
            };
            let (photo, photo_source) = self.resolve_photo(position, staged);
            if photo_source == PhotoSource::Anchored {
                photos += 1;
            }

            participants.push(Participant {
                country: self.text(row, &self.columns.country),
                alias: self.text(row, &self.columns.alias),
                couch: self.text(row, &self.columns.couch),
                email: consent.email.then(|| self.text(row, &self.columns.email)),
                phone: consent.phone.then(|| self.text(row, &self.columns.phone)),
                family_name: consent
                    .family_name
                    .then(|| self.text(row, &self.columns.family_name)),
                given_name: consent
                    .given_name
                    .then(|| self.text(row, &self.columns.given_name)),
                photo,
                photo_source,
            });
        }

        info!(
            rows = rows_scanned,
            participants = participants.len(),
            photos,
            "roster extracted"
        );
        participants
    }

    fn text(&self, row: SheetRow, name: &str) -> String {
        cell_text(self.sheet.cell(row, name).as_ref())
    }

    /// 出力位置に基づく写真ファイル名を作る（例: `teilnehmer_3.png`）
    fn destination(&self, position: usize, extension: Option<&str>) -> PathBuf {
        let file_name = match extension {
            Some(ext) if !ext.is_empty() => format!("{}_{}.{}", self.image_prefix, position, ext),
            _ => format!("{}_{}", self.image_prefix, position),
        };
        self.output_dir.join(file_name)
    }

    /// 写真を解決する
    ///
    /// アンカー画像があればそれを出力先にコピーし、一時ファイルを削除します。
    /// それ以外（またはコピー失敗時）はプレースホルダーのコピーを使用します。
    fn resolve_photo(
        &self,
        position: usize,
        staged: Option<&StagedImage>,
    ) -> (PathBuf, PhotoSource) {
        if let Some(staged) = staged {
            let dest = self.destination(position, Some(staged.format().extension()));
            match fs::copy(staged.path(), &dest) {
                Ok(_) => {
                    if let Err(e) = fs::remove_file(staged.path()) {
                        debug!(path = %staged.path().display(), error = %e, "staged image not removed");
                    }
                    return (dest, PhotoSource::Anchored);
                }
                Err(e) => {
                    warn!(position, error = %e, "failed to copy anchored image; using placeholder");
                }
            }
        }

        let extension = self.placeholder.extension().and_then(|ext| ext.to_str());
        let dest = self.destination(position, extension);
        match fs::copy(self.placeholder, &dest) {
            Ok(_) => (dest, PhotoSource::Placeholder),
            Err(e) => {
                warn!(position, error = %e, "failed to copy placeholder; referencing it directly");
                (self.placeholder.to_path_buf(), PhotoSource::Placeholder)
            }
        }
    }
}
