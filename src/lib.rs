//! kontaktliste - Consent-aware contact list extraction from sign-up spreadsheets
//!
//! イベント申込の名簿（XLSX）から、参加者ごとの掲載同意に従って
//! 連絡先リストを作成するクレートです。
//!
//! - 包括同意（`Teilnehmyliste`）のない行は出力されません
//! - メール・電話・姓・名は、それぞれの同意がある場合のみレコードに含まれます
//! - 写真は、同意があり行に画像がアンカーされている場合はその画像、
//!   それ以外はプレースホルダー画像になります
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kontaktliste::{load_participants, render_to_file, OutputFormat};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let participants = load_participants("anmeldung.xlsx", "data/placeholder.png", "build")?;
//!     if participants.is_empty() {
//!         println!("no participants");
//!         return Ok(());
//!     }
//!     render_to_file(&participants, "kontaktliste.html", OutputFormat::Html)?;
//!     Ok(())
//! }
//! ```
//!
//! # Custom Configuration
//!
//! ```rust,no_run
//! use kontaktliste::{ExtractorBuilder, RosterColumns};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let extractor = ExtractorBuilder::new()
//!         .with_columns(RosterColumns {
//!             country: "Country".to_string(),
//!             ..RosterColumns::default()
//!         })
//!         .with_image_prefix("participant")
//!         .build()?;
//!
//!     let participants = extractor.extract("signup.xlsx", "placeholder.png", "build")?;
//!     println!("{} participants", participants.len());
//!     Ok(())
//! }
//! ```

mod api;
mod builder;
mod consent;
mod error;
mod extractor;
mod output;
mod parser;
mod security;
mod types;

// 公開API
pub use api::{OutputFormat, RosterColumns};
pub use builder::{load_participants, Extractor, ExtractorBuilder};
pub use consent::{cell_text, is_truthy};
pub use error::RosterError;
pub use output::{image_data_url, render_to_file, OutputFormatter};
pub use parser::{resolve_image_anchors, ColumnMapping, ImageAnchorMap, RosterSheet, StagedImage};
pub use security::SecurityConfig;
pub use types::{CellValue, ImageFormat, Participant, PhotoSource, SheetRow};
