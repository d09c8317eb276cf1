//! ApprovalRepository: 承認レコードの永続化
//!
//! 承認チェーンを構成する個々の承認レコードを管理する。
//! Pending → 判断済みの更新は楽観的ロック（version 比較）付きの
//! compare-and-set であり、並行する判断の一方は必ず競合で失敗する。

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keihiflow_domain::{
    approval::{Approval, ApprovalDecision, ApprovalId, ApprovalRecord},
    company::CompanyId,
    expense::ExpenseId,
    user::UserId,
    value_objects::{StepNumber, Version},
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{db::TxContext, error::InfraError};

/// ApprovalRepository トレイト
#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    /// 新規承認レコードを作成する（チェーン作成トランザクション内）
    async fn insert(&self, tx: &mut TxContext, approval: &Approval) -> Result<(), InfraError>;

    /// 楽観的ロック付きで承認レコードを更新する
    ///
    /// `expected_version` と DB 上のバージョンが一致する場合のみ更新する。
    /// 不一致の場合は `InfraError::Conflict` を返す。
    async fn update_with_version_check(
        &self,
        tx: &mut TxContext,
        approval: &Approval,
        expected_version: Version,
    ) -> Result<(), InfraError>;

    /// ID で承認レコードを検索する
    async fn find_by_id(&self, id: &ApprovalId) -> Result<Option<Approval>, InfraError>;

    /// 経費申請の承認チェーン全体をステップ昇順で取得する
    async fn find_by_expense(&self, expense_id: &ExpenseId) -> Result<Vec<Approval>, InfraError>;

    /// 承認者の未判断レコード一覧を作成日時降順で取得する
    ///
    /// `company_id` は会社スコープの二重防御用。
    async fn find_pending_by_approver(
        &self,
        company_id: &CompanyId,
        approver_id: &UserId,
    ) -> Result<Vec<Approval>, InfraError>;
}

/// DB の approvals テーブルの行を表す中間構造体
#[derive(sqlx::FromRow)]
struct ApprovalRow {
    id: Uuid,
    expense_id: Uuid,
    approver_id: Uuid,
    step: i32,
    decision: String,
    comments: Option<String>,
    decided_at: Option<DateTime<Utc>>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ApprovalRow> for Approval {
    type Error = InfraError;

    fn try_from(row: ApprovalRow) -> Result<Self, Self::Error> {
        Approval::from_db(ApprovalRecord {
            id: ApprovalId::from_uuid(row.id),
            expense_id: ExpenseId::from_uuid(row.expense_id),
            approver_id: UserId::from_uuid(row.approver_id),
            step: StepNumber::try_from(row.step)
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            decision: ApprovalDecision::from_str(&row.decision)
                .map_err(|e| InfraError::unexpected(format!("不正な判断状態: {}", e)))?,
            comments: row.comments,
            decided_at: row.decided_at,
            version: Version::try_from(row.version)
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .map_err(|e| InfraError::unexpected(e.to_string()))
    }
}

const SELECT_COLUMNS: &str = "id, expense_id, approver_id, step, decision, comments, decided_at, \
                              version, created_at, updated_at";

/// PostgreSQL 実装
pub struct PostgresApprovalRepository {
    pool: PgPool,
}

impl PostgresApprovalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApprovalRepository for PostgresApprovalRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(approval_id = %approval.id()))]
    async fn insert(&self, tx: &mut TxContext, approval: &Approval) -> Result<(), InfraError> {
        let decision: &str = approval.decision().into();
        sqlx::query(
            "INSERT INTO approvals (\
                id, expense_id, approver_id, step, decision, comments, decided_at, \
                version, created_at, updated_at\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(approval.id().as_uuid())
        .bind(approval.expense_id().as_uuid())
        .bind(approval.approver_id().as_uuid())
        .bind(approval.step().as_i32())
        .bind(decision)
        .bind(approval.comments())
        .bind(approval.decided_at())
        .bind(approval.version().as_i32())
        .bind(approval.created_at())
        .bind(approval.updated_at())
        .execute(tx.conn())
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(approval_id = %approval.id()))]
    async fn update_with_version_check(
        &self,
        tx: &mut TxContext,
        approval: &Approval,
        expected_version: Version,
    ) -> Result<(), InfraError> {
        let decision: &str = approval.decision().into();
        let result = sqlx::query(
            "UPDATE approvals SET \
                decision = $1, \
                comments = $2, \
                decided_at = $3, \
                version = $4, \
                updated_at = $5 \
             WHERE id = $6 AND version = $7",
        )
        .bind(decision)
        .bind(approval.comments())
        .bind(approval.decided_at())
        .bind(approval.version().as_i32())
        .bind(approval.updated_at())
        .bind(approval.id().as_uuid())
        .bind(expected_version.as_i32())
        .execute(tx.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(InfraError::conflict(
                "Approval",
                approval.id().as_uuid().to_string(),
            ));
        }

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id(&self, id: &ApprovalId) -> Result<Option<Approval>, InfraError> {
        let row = sqlx::query_as::<_, ApprovalRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM approvals WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Approval::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%expense_id))]
    async fn find_by_expense(&self, expense_id: &ExpenseId) -> Result<Vec<Approval>, InfraError> {
        let rows = sqlx::query_as::<_, ApprovalRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM approvals WHERE expense_id = $1 ORDER BY step ASC"
        ))
        .bind(expense_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Approval::try_from).collect()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%company_id, %approver_id))]
    async fn find_pending_by_approver(
        &self,
        company_id: &CompanyId,
        approver_id: &UserId,
    ) -> Result<Vec<Approval>, InfraError> {
        let rows = sqlx::query_as::<_, ApprovalRow>(
            "SELECT a.id, a.expense_id, a.approver_id, a.step, a.decision, a.comments, \
                    a.decided_at, a.version, a.created_at, a.updated_at \
             FROM approvals a \
             JOIN expenses e ON e.id = a.expense_id \
             WHERE a.approver_id = $1 AND a.decision = 'pending' AND e.company_id = $2 \
             ORDER BY a.created_at DESC",
        )
        .bind(approver_id.as_uuid())
        .bind(company_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Approval::try_from).collect()
    }
}

// Send + Sync 検証
#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_トレイトはsendとsyncを実装している() {
        assert_send_sync::<Box<dyn ApprovalRepository>>();
    }
}
