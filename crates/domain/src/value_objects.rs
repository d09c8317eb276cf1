//! # 共通値オブジェクト
//!
//! 複数のエンティティで共有される値オブジェクトを定義する。
//!
//! ## 設計方針
//!
//! - **Newtype パターン**: プリミティブ型をラップし、型安全性を確保
//! - **バリデーション**: 生成時に検証し、不正な値の存在を型レベルで排除
//! - **不変性**: 一度作成したら変更不可
//!
//! ## 含まれる型
//!
//! | 型 | ラップ対象 | 用途 |
//! |---|-----------|------|
//! | [`Version`] | `u32` | 楽観的ロック用バージョン番号 |
//! | [`StepNumber`] | `i32` | 承認チェーン内のステップ位置（1 以上） |
//! | [`CurrencyCode`] | `String` | ISO 4217 通貨コード（3 文字） |
//! | [`UserName`] | `String` | ユーザー表示名（PII） |
//! | [`CompanyName`] | `String` | 会社名 |

use serde::{Deserialize, Serialize};

use crate::DomainError;

// =========================================================================
// Version（バージョン番号）
// =========================================================================

/// バージョン番号（値オブジェクト）
///
/// 楽観的ロックに使用する。1 から始まり、更新のたびにインクリメントされる。
/// 更新操作時はリクエストの version と DB の version を比較し、
/// 一致しない場合は競合エラーを返す。
///
/// # 不変条件
///
/// - バージョン番号は 1 以上
///
/// # 使用例
///
/// ```rust
/// use keihiflow_domain::value_objects::Version;
///
/// let v1 = Version::initial();
/// assert_eq!(v1.as_u32(), 1);
///
/// let v2 = v1.next();
/// assert_eq!(v2.as_u32(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u32);

impl Version {
    /// 初期バージョン（1）を作成する
    pub fn initial() -> Self {
        Self(1)
    }

    /// 指定した値からバージョンを作成する
    ///
    /// # エラー
    ///
    /// 0 は無効（`DomainError::Validation`）。
    pub fn new(value: u32) -> Result<Self, DomainError> {
        if value == 0 {
            return Err(DomainError::Validation(
                "バージョン番号は 1 以上である必要があります".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// 次のバージョンを返す
    ///
    /// # パニック
    ///
    /// u32 の最大値を超える場合はパニックする。実運用では到達しない想定。
    pub fn next(&self) -> Self {
        Self(
            self.0
                .checked_add(1)
                .expect("バージョン番号がオーバーフローしました"),
        )
    }

    /// 内部の u32 値を取得する
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// i32 に変換する（DB 互換用）
    ///
    /// # パニック
    ///
    /// i32 の範囲を超える場合はパニックする。
    pub fn as_i32(&self) -> i32 {
        i32::try_from(self.0).expect("バージョン番号が i32 の範囲を超えています")
    }
}

impl TryFrom<i32> for Version {
    type Error = DomainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if value <= 0 {
            return Err(DomainError::Validation(
                "バージョン番号は 1 以上である必要があります".to_string(),
            ));
        }
        Ok(Self(value as u32))
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::initial()
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// =========================================================================
// StepNumber（承認ステップ番号）
// =========================================================================

/// 承認ステップ番号（値オブジェクト）
///
/// 承認チェーン内の位置を表す。承認者設定（ApproverAssignment）の
/// `sequence` に対応し、同一経費の承認レコード間で一意。
/// 連番である必要はなく、昇順であることだけが保証される。
///
/// # 不変条件
///
/// - 1 以上の正整数
///
/// # 使用例
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use keihiflow_domain::value_objects::StepNumber;
///
/// let step = StepNumber::new(2)?;
/// assert_eq!(step.as_i32(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StepNumber(i32);

impl StepNumber {
    /// 指定した値からステップ番号を作成する
    ///
    /// # エラー
    ///
    /// 0 以下は無効（`DomainError::Validation`）。
    pub fn new(value: i32) -> Result<Self, DomainError> {
        if value <= 0 {
            return Err(DomainError::Validation(
                "ステップ番号は 1 以上である必要があります".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// 内部の i32 値を取得する
    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for StepNumber {
    type Error = DomainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::fmt::Display for StepNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =========================================================================
// CurrencyCode（通貨コード）
// =========================================================================

/// 通貨コード（値オブジェクト）
///
/// ISO 4217 の 3 文字アルファベットコード。大文字に正規化して保持する。
///
/// # 不変条件
///
/// - ASCII アルファベット 3 文字
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// 通貨コードを作成する
    ///
    /// # エラー
    ///
    /// 3 文字の ASCII アルファベットでない場合は `DomainError::Validation`。
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_ascii_uppercase();

        if value.len() != 3 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::Validation(format!(
                "不正な通貨コード: {}",
                value
            )));
        }

        Ok(Self(value))
    }

    /// 文字列参照を取得する
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =========================================================================
// UserName（ユーザー表示名）
// =========================================================================

define_validated_string! {
    /// ユーザー表示名（値オブジェクト）
    ///
    /// ユーザーの表示名を表現する。
    /// PII（個人識別情報）のため、Debug 出力はマスクされる。
    ///
    /// # バリデーション
    ///
    /// - 空文字列ではない
    /// - 最大 200 文字
    pub struct UserName {
        label: "ユーザー名",
        max_length: 200,
        pii: true,
    }
}

// =========================================================================
// CompanyName（会社名）
// =========================================================================

define_validated_string! {
    /// 会社名（値オブジェクト）
    ///
    /// # バリデーション
    ///
    /// - 空文字列ではない
    /// - 最大 200 文字
    pub struct CompanyName {
        label: "会社名",
        max_length: 200,
    }
}

// =========================================================================
// テスト
// =========================================================================

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    // Version のテスト

    #[test]
    fn test_バージョンの初期値は1() {
        let v = Version::initial();
        assert_eq!(v.as_u32(), 1);
    }

    #[test]
    fn test_バージョンのnextはインクリメントする() {
        let v1 = Version::initial();
        let v2 = v1.next();
        assert_eq!(v2.as_u32(), 2);
    }

    #[test]
    fn test_バージョン0は無効() {
        assert!(Version::new(0).is_err());
    }

    #[test]
    fn test_バージョンのi32変換() {
        let v = Version::new(42).unwrap();
        assert_eq!(v.as_i32(), 42);
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    fn test_バージョンのi32からの変換_0以下は無効(#[case] value: i32) {
        assert!(Version::try_from(value).is_err());
    }

    #[test]
    fn test_バージョンのi32からの変換_正数は有効() {
        let v = Version::try_from(42).unwrap();
        assert_eq!(v.as_u32(), 42);
    }

    // StepNumber のテスト

    #[test]
    fn test_ステップ番号1は有効() {
        let step = StepNumber::new(1).unwrap();
        assert_eq!(step.as_i32(), 1);
    }

    #[rstest]
    #[case(0)]
    #[case(-5)]
    fn test_ステップ番号0以下は無効(#[case] value: i32) {
        assert!(StepNumber::new(value).is_err());
    }

    #[test]
    fn test_ステップ番号は昇順に比較できる() {
        let step1 = StepNumber::new(1).unwrap();
        let step5 = StepNumber::new(5).unwrap();
        assert!(step1 < step5);
    }

    #[test]
    fn test_ステップ番号の表示形式は数値のみ() {
        let step = StepNumber::new(3).unwrap();
        assert_eq!(step.to_string(), "3");
    }

    // CurrencyCode のテスト

    #[test]
    fn test_通貨コードは正常な値を受け入れる() {
        let code = CurrencyCode::new("INR").unwrap();
        assert_eq!(code.as_str(), "INR");
    }

    #[test]
    fn test_通貨コードは小文字を大文字に正規化する() {
        let code = CurrencyCode::new("usd").unwrap();
        assert_eq!(code.as_str(), "USD");
    }

    #[rstest]
    #[case("", "空文字列")]
    #[case("IN", "2文字")]
    #[case("INRX", "4文字")]
    #[case("IN1", "数字を含む")]
    fn test_通貨コードは不正な値を拒否する(#[case] input: &str, #[case] _reason: &str) {
        assert!(CurrencyCode::new(input).is_err());
    }

    // UserName のテスト

    #[test]
    fn test_ユーザー名は正常な値を受け入れる() {
        assert!(UserName::new("山田太郎").is_ok());
    }

    #[rstest]
    #[case("", "空文字列")]
    #[case("   ", "空白のみ")]
    fn test_ユーザー名は空を拒否する(#[case] input: &str, #[case] _reason: &str) {
        assert!(UserName::new(input).is_err());
    }

    #[test]
    fn test_ユーザー名は前後の空白をトリムする() {
        let name = UserName::new("  山田太郎  ").unwrap();
        assert_eq!(name.as_str(), "山田太郎");
    }

    #[test]
    fn test_ユーザー名は201文字以上を拒否する() {
        let long_name = "あ".repeat(201);
        assert!(UserName::new(&long_name).is_err());
    }

    #[test]
    fn test_ユーザー名のdebug出力はマスクされる() {
        let name = UserName::new("山田太郎").unwrap();
        let debug = format!("{:?}", name);
        assert!(debug.contains(crate::REDACTED));
        assert!(!debug.contains("山田太郎"));
    }

    // CompanyName のテスト

    #[test]
    fn test_会社名は正常な値を受け入れる() {
        assert!(CompanyName::new("株式会社サンプル").is_ok());
    }

    #[rstest]
    #[case("", "空文字列")]
    #[case("   ", "空白のみ")]
    fn test_会社名は空を拒否する(#[case] input: &str, #[case] _reason: &str) {
        assert!(CompanyName::new(input).is_err());
    }

    #[test]
    fn test_会社名のdisplay出力は実際の値を表示する() {
        let name = CompanyName::new("株式会社サンプル").unwrap();
        assert_eq!(name.to_string(), "株式会社サンプル");
    }
}
