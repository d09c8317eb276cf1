//! ApproverAssignmentRepository: 承認者設定の検索
//!
//! 会社ごとの承認チェーンテンプレートを読み取る。
//! 設定の作成・変更は管理機能の責務であり、エンジンからは読み取り専用。

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keihiflow_domain::{
    assignment::{ApproverAssignment, ApproverAssignmentId, ApproverAssignmentRecord},
    company::CompanyId,
    user::{UserId, UserRole},
    value_objects::StepNumber,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::InfraError;

/// ApproverAssignmentRepository トレイト
#[async_trait]
pub trait ApproverAssignmentRepository: Send + Sync {
    /// 会社の承認者設定一覧を sequence 昇順で取得する
    async fn find_by_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<ApproverAssignment>, InfraError>;
}

/// DB の approver_assignments テーブルの行を表す中間構造体
#[derive(sqlx::FromRow)]
struct ApproverAssignmentRow {
    id: Uuid,
    company_id: Uuid,
    sequence: i32,
    is_manager: bool,
    user_id: Option<Uuid>,
    role: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ApproverAssignmentRow> for ApproverAssignment {
    type Error = InfraError;

    fn try_from(row: ApproverAssignmentRow) -> Result<Self, Self::Error> {
        ApproverAssignment::from_db(ApproverAssignmentRecord {
            id: ApproverAssignmentId::from_uuid(row.id),
            company_id: CompanyId::from_uuid(row.company_id),
            sequence: StepNumber::try_from(row.sequence)
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            is_manager: row.is_manager,
            user_id: row.user_id.map(UserId::from_uuid),
            role: row
                .role
                .as_deref()
                .map(UserRole::from_str)
                .transpose()
                .map_err(|e| InfraError::unexpected(format!("不正なロール: {}", e)))?,
            created_at: row.created_at,
        })
        .map_err(|e| InfraError::unexpected(e.to_string()))
    }
}

/// PostgreSQL 実装
pub struct PostgresApproverAssignmentRepository {
    pool: PgPool,
}

impl PostgresApproverAssignmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApproverAssignmentRepository for PostgresApproverAssignmentRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%company_id))]
    async fn find_by_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<ApproverAssignment>, InfraError> {
        let rows = sqlx::query_as::<_, ApproverAssignmentRow>(
            "SELECT id, company_id, sequence, is_manager, user_id, role, created_at \
             FROM approver_assignments \
             WHERE company_id = $1 \
             ORDER BY sequence ASC",
        )
        .bind(company_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ApproverAssignment::try_from).collect()
    }
}

// Send + Sync 検証
#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_トレイトはsendとsyncを実装している() {
        assert_send_sync::<Box<dyn ApproverAssignmentRepository>>();
    }
}
