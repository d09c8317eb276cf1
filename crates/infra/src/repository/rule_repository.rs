//! ApprovalRuleRepository: 条件付き承認ルールの検索
//!
//! 会社ごとの有効なルールを読み取る。
//! ルールの作成・変更は管理機能の責務であり、エンジンからは読み取り専用。

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keihiflow_domain::{
    company::CompanyId,
    rule::{ApprovalRule, ApprovalRuleId, ApprovalRuleRecord, PercentageThreshold, RuleType},
    user::{UserId, UserRole},
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::InfraError;

/// ApprovalRuleRepository トレイト
#[async_trait]
pub trait ApprovalRuleRepository: Send + Sync {
    /// 会社の有効なルール一覧を取得する
    async fn find_enabled_by_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<ApprovalRule>, InfraError>;
}

/// DB の approval_rules テーブルの行を表す中間構造体
#[derive(sqlx::FromRow)]
struct ApprovalRuleRow {
    id: Uuid,
    company_id: Uuid,
    rule_type: String,
    percentage_threshold: Option<i32>,
    specific_approver_user_id: Option<Uuid>,
    specific_approver_role: Option<String>,
    enabled: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ApprovalRuleRow> for ApprovalRule {
    type Error = InfraError;

    fn try_from(row: ApprovalRuleRow) -> Result<Self, Self::Error> {
        ApprovalRule::from_db(ApprovalRuleRecord {
            id: ApprovalRuleId::from_uuid(row.id),
            company_id: CompanyId::from_uuid(row.company_id),
            rule_type: RuleType::from_str(&row.rule_type)
                .map_err(|e| InfraError::unexpected(format!("不正なルール種別: {}", e)))?,
            percentage_threshold: row
                .percentage_threshold
                .map(PercentageThreshold::new)
                .transpose()
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            specific_user_id: row.specific_approver_user_id.map(UserId::from_uuid),
            specific_role: row
                .specific_approver_role
                .as_deref()
                .map(UserRole::from_str)
                .transpose()
                .map_err(|e| InfraError::unexpected(format!("不正なロール: {}", e)))?,
            enabled: row.enabled,
            created_at: row.created_at,
        })
        .map_err(|e| InfraError::unexpected(e.to_string()))
    }
}

/// PostgreSQL 実装
pub struct PostgresApprovalRuleRepository {
    pool: PgPool,
}

impl PostgresApprovalRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApprovalRuleRepository for PostgresApprovalRuleRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%company_id))]
    async fn find_enabled_by_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<ApprovalRule>, InfraError> {
        let rows = sqlx::query_as::<_, ApprovalRuleRow>(
            "SELECT id, company_id, rule_type, percentage_threshold, \
                    specific_approver_user_id, specific_approver_role, enabled, created_at \
             FROM approval_rules \
             WHERE company_id = $1 AND enabled = TRUE \
             ORDER BY created_at ASC",
        )
        .bind(company_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ApprovalRule::try_from).collect()
    }
}
