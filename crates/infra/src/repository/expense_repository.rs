//! ExpenseRepository: 経費申請の永続化
//!
//! 経費申請の作成・更新・検索を管理する。
//! 更新は楽観的ロック（version 比較）付きで、トランザクション内でのみ行う。

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keihiflow_domain::{
    company::CompanyId,
    expense::{Expense, ExpenseId, ExpenseRecord, ExpenseStatus},
    user::UserId,
    value_objects::{CurrencyCode, StepNumber, Version},
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{db::TxContext, error::InfraError};

/// ExpenseRepository トレイト
#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    /// 新規経費申請を作成する
    async fn insert(&self, expense: &Expense) -> Result<(), InfraError>;

    /// 楽観的ロック付きで経費申請を更新する
    ///
    /// `expected_version` と DB 上のバージョンが一致する場合のみ更新する。
    /// 不一致の場合は `InfraError::Conflict` を返す。
    async fn update_with_version_check(
        &self,
        tx: &mut TxContext,
        expense: &Expense,
        expected_version: Version,
    ) -> Result<(), InfraError>;

    /// ID で経費申請を検索する（会社スコープ）
    async fn find_by_id(
        &self,
        id: &ExpenseId,
        company_id: &CompanyId,
    ) -> Result<Option<Expense>, InfraError>;
}

/// DB の expenses テーブルの行を表す中間構造体
#[derive(sqlx::FromRow)]
struct ExpenseRow {
    id: Uuid,
    company_id: Uuid,
    created_by: Uuid,
    amount: Decimal,
    currency: String,
    status: String,
    version: i32,
    current_step: Option<i32>,
    submitted_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ExpenseRow> for Expense {
    type Error = InfraError;

    fn try_from(row: ExpenseRow) -> Result<Self, Self::Error> {
        Expense::from_db(ExpenseRecord {
            id: ExpenseId::from_uuid(row.id),
            company_id: CompanyId::from_uuid(row.company_id),
            created_by: UserId::from_uuid(row.created_by),
            amount: row.amount,
            currency: CurrencyCode::new(row.currency)
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            status: ExpenseStatus::from_str(&row.status)
                .map_err(|e| InfraError::unexpected(format!("不正なステータス: {}", e)))?,
            version: Version::try_from(row.version)
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            current_step: row
                .current_step
                .map(StepNumber::try_from)
                .transpose()
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            submitted_at: row.submitted_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .map_err(|e| InfraError::unexpected(e.to_string()))
    }
}

const SELECT_COLUMNS: &str = "id, company_id, created_by, amount, currency, status, version, \
                              current_step, submitted_at, completed_at, created_at, updated_at";

/// PostgreSQL 実装
pub struct PostgresExpenseRepository {
    pool: PgPool,
}

impl PostgresExpenseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExpenseRepository for PostgresExpenseRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(expense_id = %expense.id()))]
    async fn insert(&self, expense: &Expense) -> Result<(), InfraError> {
        let status: &str = expense.status().into();
        sqlx::query(
            "INSERT INTO expenses (\
                id, company_id, created_by, amount, currency, status, version, \
                current_step, submitted_at, completed_at, created_at, updated_at\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(expense.id().as_uuid())
        .bind(expense.company_id().as_uuid())
        .bind(expense.created_by().as_uuid())
        .bind(expense.amount())
        .bind(expense.currency().as_str())
        .bind(status)
        .bind(expense.version().as_i32())
        .bind(expense.current_step().map(|s| s.as_i32()))
        .bind(expense.submitted_at())
        .bind(expense.completed_at())
        .bind(expense.created_at())
        .bind(expense.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(expense_id = %expense.id()))]
    async fn update_with_version_check(
        &self,
        tx: &mut TxContext,
        expense: &Expense,
        expected_version: Version,
    ) -> Result<(), InfraError> {
        let status: &str = expense.status().into();
        let result = sqlx::query(
            "UPDATE expenses SET \
                status = $1, \
                version = $2, \
                current_step = $3, \
                submitted_at = $4, \
                completed_at = $5, \
                updated_at = $6 \
             WHERE id = $7 AND version = $8",
        )
        .bind(status)
        .bind(expense.version().as_i32())
        .bind(expense.current_step().map(|s| s.as_i32()))
        .bind(expense.submitted_at())
        .bind(expense.completed_at())
        .bind(expense.updated_at())
        .bind(expense.id().as_uuid())
        .bind(expected_version.as_i32())
        .execute(tx.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(InfraError::conflict(
                "Expense",
                expense.id().as_uuid().to_string(),
            ));
        }

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id, %company_id))]
    async fn find_by_id(
        &self,
        id: &ExpenseId,
        company_id: &CompanyId,
    ) -> Result<Option<Expense>, InfraError> {
        let row = sqlx::query_as::<_, ExpenseRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM expenses WHERE id = $1 AND company_id = $2"
        ))
        .bind(id.as_uuid())
        .bind(company_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Expense::try_from).transpose()
    }
}
