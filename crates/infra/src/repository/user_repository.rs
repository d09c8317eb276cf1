//! UserRepository: ユーザーの検索
//!
//! 承認エンジンはユーザーを読み取り専用で参照する。
//! 承認者解決（上長・固定ユーザー・ロール）と管理者通知に使用する。

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keihiflow_domain::{
    company::CompanyId,
    user::{Email, User, UserId, UserRole},
    value_objects::UserName,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::InfraError;

/// UserRepository トレイト
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// ID でユーザーを検索する
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, InfraError>;

    /// 複数 ID でユーザーを一括検索する（ロール対応表の構築用）
    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, InfraError>;

    /// 会社内で該当ロールを持つ最初のアクティブユーザーを検索する
    ///
    /// 「最初」は作成日時昇順・ID 昇順で決定的に定まる。
    /// ストアのイテレーション順序には依存しない。
    async fn find_first_active_by_role(
        &self,
        company_id: &CompanyId,
        role: UserRole,
    ) -> Result<Option<User>, InfraError>;

    /// 会社内で該当ロールを持つアクティブユーザー一覧を取得する（管理者通知用）
    async fn find_active_by_role(
        &self,
        company_id: &CompanyId,
        role: UserRole,
    ) -> Result<Vec<User>, InfraError>;
}

/// DB の users テーブルの行を表す中間構造体
///
/// `query_as` が SQL 結果を直接マッピングする対象。
/// `TryFrom` で `User` への変換ロジックを一箇所に集約する。
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    company_id: Uuid,
    email: String,
    full_name: String,
    role: String,
    is_active: bool,
    manager_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = InfraError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User::from_db(
            UserId::from_uuid(row.id),
            CompanyId::from_uuid(row.company_id),
            Email::new(row.email).map_err(|e| InfraError::unexpected(e.to_string()))?,
            UserName::new(row.full_name).map_err(|e| InfraError::unexpected(e.to_string()))?,
            UserRole::from_str(&row.role)
                .map_err(|e| InfraError::unexpected(format!("不正なロール: {}", e)))?,
            row.is_active,
            row.manager_id.map(UserId::from_uuid),
            row.created_at,
            row.updated_at,
        ))
    }
}

const SELECT_COLUMNS: &str = "id, company_id, email, full_name, role, is_active, manager_id, \
                              created_at, updated_at";

/// PostgreSQL 実装
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, InfraError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, InfraError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%company_id, %role))]
    async fn find_first_active_by_role(
        &self,
        company_id: &CompanyId,
        role: UserRole,
    ) -> Result<Option<User>, InfraError> {
        let role_str: &str = role.into();
        // created_at, id の複合キーで決定的な順序を保証する
        // （UUID v7 のため id も時系列順）
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM users \
             WHERE company_id = $1 AND role = $2 AND is_active = TRUE \
             ORDER BY created_at ASC, id ASC \
             LIMIT 1"
        ))
        .bind(company_id.as_uuid())
        .bind(role_str)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%company_id, %role))]
    async fn find_active_by_role(
        &self,
        company_id: &CompanyId,
        role: UserRole,
    ) -> Result<Vec<User>, InfraError> {
        let role_str: &str = role.into();
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM users \
             WHERE company_id = $1 AND role = $2 AND is_active = TRUE \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(company_id.as_uuid())
        .bind(role_str)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }
}
