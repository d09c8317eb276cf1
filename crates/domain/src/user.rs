//! # ユーザー
//!
//! ユーザーエンティティとそれに関連する値オブジェクトを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 役割 |
//! |---|------------|------|
//! | [`User`] | ユーザー | 会社に所属する申請者・承認者 |
//! | [`UserRole`] | ロール | 承認者設定や条件ルールの解決に使用する職位 |
//!
//! ## 設計方針
//!
//! - **Newtype パターン**: UserId は UUID をラップし、型安全性を確保
//! - **不変性**: エンティティフィールドは基本的に不変、変更はメソッド経由
//! - **バリデーション**: 値オブジェクトの生成時に検証ロジックを実行

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    DomainError,
    company::CompanyId,
    value_objects::UserName,
};

define_uuid_id! {
    /// ユーザー ID（一意識別子）
    ///
    /// UUID v7 を使用し、生成順にソート可能。
    pub struct UserId;
}

/// メールアドレス（値オブジェクト）
///
/// 生成時にバリデーションを実行し、不正な値の作成を防ぐ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    /// メールアドレスを作成する
    ///
    /// # バリデーション
    ///
    /// - 空文字列ではない
    /// - `local@domain` の形式であること
    /// - 最大 255 文字
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();

        if value.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスは必須です".to_string(),
            ));
        }

        let Some((local, domain)) = value.split_once('@') else {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        };

        if local.is_empty() || domain.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        }

        if value.len() > 255 {
            return Err(DomainError::Validation(
                "メールアドレスは255文字以内である必要があります".to_string(),
            ));
        }

        Ok(Self(value))
    }

    /// 文字列参照を取得する
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ユーザーロール
///
/// 会社内の職位。承認者設定（ロール指定）と条件ルール
/// （特定ロール承認）の解決に使用する。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    /// 管理者
    Admin,
    /// マネージャー
    Manager,
    /// 経理
    Finance,
    /// 部門長
    Director,
    /// CFO
    Cfo,
    /// 一般社員
    Employee,
}

impl std::str::FromStr for UserRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "finance" => Ok(Self::Finance),
            "director" => Ok(Self::Director),
            "cfo" => Ok(Self::Cfo),
            "employee" => Ok(Self::Employee),
            _ => Err(DomainError::Validation(format!(
                "不正なユーザーロール: {}",
                s
            ))),
        }
    }
}

/// ユーザーエンティティ
///
/// 会社に所属する申請者・承認者を表現する。
/// `manager_id` は直属の上長への自己参照で、承認者設定の
/// 「上長承認」解決に使用する（上長がいない場合は None）。
///
/// # 不変条件
///
/// - `email` はシステム内で一意
/// - 非アクティブユーザーは承認者として解決されない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    company_id: CompanyId,
    email: Email,
    name: UserName,
    role: UserRole,
    is_active: bool,
    manager_id: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// ユーザーの新規作成パラメータ
pub struct NewUser {
    pub id: UserId,
    pub company_id: CompanyId,
    pub email: Email,
    pub name: UserName,
    pub role: UserRole,
    pub manager_id: Option<UserId>,
    pub now: DateTime<Utc>,
}

impl User {
    /// 新しいユーザーを作成する
    ///
    /// # 不変条件
    ///
    /// - 作成時は常にアクティブ
    pub fn new(params: NewUser) -> Self {
        Self {
            id: params.id,
            company_id: params.company_id,
            email: params.email,
            name: params.name,
            role: params.role,
            is_active: true,
            manager_id: params.manager_id,
            created_at: params.now,
            updated_at: params.now,
        }
    }

    /// 既存のデータからユーザーを復元する（データベースから取得時）
    #[allow(clippy::too_many_arguments)]
    pub fn from_db(
        id: UserId,
        company_id: CompanyId,
        email: Email,
        name: UserName,
        role: UserRole,
        is_active: bool,
        manager_id: Option<UserId>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            company_id,
            email,
            name,
            role,
            is_active,
            manager_id,
            created_at,
            updated_at,
        }
    }

    // Getter メソッド

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn company_id(&self) -> &CompanyId {
        &self.company_id
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn name(&self) -> &UserName {
        &self.name
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn manager_id(&self) -> Option<&UserId> {
        self.manager_id.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // ビジネスロジックメソッド

    /// ユーザーを無効化した新しいインスタンスを返す
    ///
    /// 退職・異動時に使用する。無効化されたユーザーは
    /// 承認者解決の対象から外れる。
    pub fn deactivated(self, now: DateTime<Utc>) -> Self {
        Self {
            is_active: false,
            updated_at: now,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use super::*;

    /// テスト用の固定タイムスタンプ
    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[fixture]
    fn active_user(now: DateTime<Utc>) -> User {
        User::new(NewUser {
            id: UserId::new(),
            company_id: CompanyId::new(),
            email: Email::new("user@example.com").unwrap(),
            name: UserName::new("山田太郎").unwrap(),
            role: UserRole::Employee,
            manager_id: None,
            now,
        })
    }

    // Email のテスト

    #[test]
    fn test_メールアドレスは正常な形式を受け入れる() {
        assert!(Email::new("user@example.com").is_ok());
    }

    #[rstest]
    #[case("", "空文字列")]
    #[case("no-at-sign", "@記号なし")]
    #[case("@example.com", "ローカル部分が空")]
    #[case("user@", "ドメイン部分が空")]
    #[case(&format!("{}@example.com", "a".repeat(256)), "255文字超過")]
    fn test_メールアドレスは不正な形式を拒否する(
        #[case] input: &str,
        #[case] _reason: &str,
    ) {
        assert!(Email::new(input).is_err());
    }

    // UserRole のテスト

    #[rstest]
    #[case("admin", UserRole::Admin)]
    #[case("manager", UserRole::Manager)]
    #[case("finance", UserRole::Finance)]
    #[case("director", UserRole::Director)]
    #[case("cfo", UserRole::Cfo)]
    #[case("employee", UserRole::Employee)]
    fn test_ロールの文字列変換はラウンドトリップする(
        #[case] s: &str,
        #[case] role: UserRole,
    ) {
        assert_eq!(UserRole::from_str(s).unwrap(), role);
        assert_eq!(role.to_string(), s);
    }

    #[test]
    fn test_不正なロール文字列はエラー() {
        assert!(UserRole::from_str("intern").is_err());
    }

    // User のテスト

    #[rstest]
    fn test_新規ユーザーはアクティブ状態(active_user: User) {
        assert!(active_user.is_active());
    }

    #[rstest]
    fn test_新規ユーザーのcreated_atとupdated_atは注入された値と一致する(
        now: DateTime<Utc>,
        active_user: User,
    ) {
        assert_eq!(active_user.created_at(), now);
        assert_eq!(active_user.updated_at(), now);
    }

    #[rstest]
    fn test_無効化後の状態(active_user: User) {
        let transition_time = DateTime::from_timestamp(1_700_001_000, 0).unwrap();
        let original = active_user.clone();

        let sut = active_user.deactivated(transition_time);

        let expected = User::from_db(
            original.id().clone(),
            original.company_id().clone(),
            original.email().clone(),
            original.name().clone(),
            original.role(),
            false,
            None,
            original.created_at(),
            transition_time,
        );
        assert_eq!(sut, expected);
    }

    #[rstest]
    fn test_上長を持つユーザー(now: DateTime<Utc>) {
        let manager_id = UserId::new();
        let user = User::new(NewUser {
            id: UserId::new(),
            company_id: CompanyId::new(),
            email: Email::new("member@example.com").unwrap(),
            name: UserName::new("佐藤花子").unwrap(),
            role: UserRole::Employee,
            manager_id: Some(manager_id.clone()),
            now,
        });

        assert_eq!(user.manager_id(), Some(&manager_id));
    }
}
