//! Parser Module
//!
//! 名簿シート（calamine）と描画レイヤー（zip + quick-xml）の解析を提供します。
//! 2つのパーサーは互いに独立しており、抽出処理が両方の結果を組み合わせます。

mod drawing;
mod workbook;

pub use drawing::{resolve_image_anchors, ImageAnchorMap, StagedImage};
pub use workbook::{ColumnMapping, RosterSheet};

pub(crate) use workbook::read_source;
