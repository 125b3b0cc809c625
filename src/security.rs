//! Security Module
//!
//! 名簿ファイル（ZIPアーカイブ）を扱う際のセキュリティ制限を定義するモジュール。
//! ZIP bomb攻撃、パストラバーサル攻撃への対策を提供します。

/// セキュリティ設定
///
/// ファイル処理時のセキュリティ制限を定義します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    /// 入力ファイルの最大サイズ（バイト）
    /// デフォルト: 512MB
    pub max_input_file_size: u64,
    /// ZIPアーカイブ内の最大ファイル数
    /// デフォルト: 10000
    pub max_file_count: usize,
    /// 埋め込み画像1枚あたりの展開後の最大サイズ（バイト）
    /// デフォルト: 50MB
    pub max_image_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_input_file_size: 536_870_912, // 512MB
            max_file_count: 10_000,
            max_image_size: 52_428_800, // 50MB
        }
    }
}

impl SecurityConfig {
    /// デフォルトのセキュリティ設定を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 入力ファイルサイズを検証する
    pub(crate) fn check_input_size(&self, size: u64) -> Result<(), String> {
        if size > self.max_input_file_size {
            return Err(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                size, self.max_input_file_size
            ));
        }
        Ok(())
    }
}

/// アーカイブ内パスの検証
///
/// リレーションシップのターゲットを解決した結果に対して使用します。
///
/// # 戻り値
///
/// * `Ok(())` - パスが安全な場合
/// * `Err(String)` - パスが危険な場合（`..`や絶対パスを含む）
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    // 絶対パスを拒否（Windows形式の`C:\`やUnix形式の`/`で始まるパス）
    if path.starts_with('/') || path.starts_with("C:\\") || path.starts_with("c:\\") {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}
