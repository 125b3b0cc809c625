//! Public API Types
//!
//! 公開APIで使用する設定型・列挙型を定義するモジュール。

/// 名簿のヘッダー文字列（完全一致、前後の空白のみトリム）
///
/// 既定値はイベント申込フォームの列名です。列の並び順は任意で、
/// ここに含まれない列は無視されます。同意列がヘッダーに存在しない場合、
/// その同意は「なし」として扱われます。
///
/// # 使用例
///
/// ```rust
/// use kontaktliste::RosterColumns;
///
/// let columns = RosterColumns {
///     country: "Country".to_string(),
///     ..RosterColumns::default()
/// };
/// assert_eq!(columns.blanket_consent, "Teilnehmyliste");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterColumns {
    /// 名簿掲載への包括同意（偽の場合、行全体が除外される）
    pub blanket_consent: String,
    /// メールアドレス掲載への同意
    pub email_consent: String,
    /// 電話番号掲載への同意
    pub phone_consent: String,
    /// 姓の掲載への同意
    pub family_name_consent: String,
    /// 名の掲載への同意
    pub given_name_consent: String,
    /// 写真掲載への同意
    pub photo_consent: String,

    /// 国
    pub country: String,
    /// 呼び名・ペンネーム
    pub alias: String,
    /// カウチ欄
    pub couch: String,
    /// メールアドレス
    pub email: String,
    /// 電話番号
    pub phone: String,
    /// 姓
    pub family_name: String,
    /// 名
    pub given_name: String,
    /// 写真列（値は使用しない。写真は描画レイヤーから取得する）
    pub photo: String,
}

impl Default for RosterColumns {
    fn default() -> Self {
        Self {
            blanket_consent: "Teilnehmyliste".to_string(),
            email_consent: "Teilnehmyliste E-Mail".to_string(),
            phone_consent: "Teilnehmyliste Telefonnummer".to_string(),
            family_name_consent: "Teilnehmyliste Nachname".to_string(),
            // フォーム側の表記が「Teilnehmerliste」になっている
            given_name_consent: "Teilnehmerliste Vorname".to_string(),
            photo_consent: "Teilnehmyliste Bild".to_string(),
            country: "Land".to_string(),
            alias: "Rufname/Pseudonym".to_string(),
            couch: "Teilnehmyliste_Couch".to_string(),
            email: "E-Mail Adresse".to_string(),
            phone: "Telefonnummer (mit Ländercode!)".to_string(),
            family_name: "Familiename".to_string(),
            given_name: "Vorname".to_string(),
            photo: "Bild".to_string(),
        }
    }
}

impl RosterColumns {
    /// すべてのヘッダー名を（フィールド名, ヘッダー名）の組で列挙する
    pub(crate) fn entries(&self) -> [(&'static str, &str); 14] {
        [
            ("blanket_consent", &self.blanket_consent),
            ("email_consent", &self.email_consent),
            ("phone_consent", &self.phone_consent),
            ("family_name_consent", &self.family_name_consent),
            ("given_name_consent", &self.given_name_consent),
            ("photo_consent", &self.photo_consent),
            ("country", &self.country),
            ("alias", &self.alias),
            ("couch", &self.couch),
            ("email", &self.email),
            ("phone", &self.phone),
            ("family_name", &self.family_name),
            ("given_name", &self.given_name),
            ("photo", &self.photo),
        ]
    }
}

/// 出力フォーマット
///
/// 参加者リストを描画する際の出力形式を指定します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum OutputFormat {
    /// HTML形式（デフォルト）
    ///
    /// 写真は`data:`URLとして埋め込まれ、1つのHTMLファイルで完結します。
    /// ブラウザの印刷機能でPDFに変換できます。
    #[default]
    Html,

    /// JSON形式
    ///
    /// 参加者レコードの配列を出力します。同意のないフィールドはキーごと省略されます。
    ///
    /// # 出力例
    ///
    /// ```json
    /// [
    ///   {"land": "CH", "rufname": "Alias", "couch": "", "email": "a@b.ch", "image_path": "build/teilnehmer_0.png"}
    /// ]
    /// ```
    Json,
}
