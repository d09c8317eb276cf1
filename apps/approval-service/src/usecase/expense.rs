//! # 経費承認ユースケース
//!
//! 承認チェーンエンジンの中核: 申請時のチェーン構築、承認者の判断処理、
//! 条件ルールによるショートサーキット、チェーンの照会を実装する。
//!
//! - [`lifecycle`] - 作成・申請（チェーン構築）・取消
//! - [`decision`] - 承認/却下の判断処理とステップ前進
//! - [`query`] - 承認チェーン・未判断タスク・通知の照会

mod decision;
mod helpers;
mod lifecycle;
mod query;

use std::sync::Arc;

use keihiflow_domain::{
    approval::Decision,
    clock::Clock,
    expense::ExpenseStatus,
    user::UserId,
    value_objects::{CurrencyCode, StepNumber},
};
use keihiflow_infra::{
    TransactionManager,
    repository::{
        ApprovalRepository,
        ApprovalRuleRepository,
        ApproverAssignmentRepository,
        ExpenseRepository,
        UserRepository,
    },
};
use rust_decimal::Decimal;

use crate::usecase::notification::NotificationService;

/// 経費申請の作成入力
#[derive(Debug, Clone)]
pub struct CreateExpenseInput {
    /// 申請者のユーザー ID
    pub created_by: UserId,
    /// 金額
    pub amount:     Decimal,
    /// 通貨コード
    pub currency:   CurrencyCode,
}

/// 判断入力
#[derive(Debug, Clone)]
pub struct RecordDecisionInput {
    /// 承認または却下
    pub decision: Decision,
    /// コメント（任意）
    pub comments: Option<String>,
}

/// 申請結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// 申請後のステータス（Pending または自動承認時 Approved）
    pub status:       ExpenseStatus,
    /// 現在の承認ステップ（自動承認時は None）
    pub current_step: Option<StepNumber>,
}

/// 判断結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    /// 判断後の経費申請ステータス
    pub expense_status:   ExpenseStatus,
    /// 次の承認者（チェーンが継続する場合のみ）
    pub next_approver_id: Option<UserId>,
}

/// 経費承認ユースケース実装
///
/// 承認チェーンの構築と判断処理に関するビジネスロジックを実装する。
pub struct ExpenseUseCaseImpl {
    expense_repo: Arc<dyn ExpenseRepository>,
    approval_repo: Arc<dyn ApprovalRepository>,
    assignment_repo: Arc<dyn ApproverAssignmentRepository>,
    rule_repo: Arc<dyn ApprovalRuleRepository>,
    user_repo: Arc<dyn UserRepository>,
    notification_service: Arc<NotificationService>,
    clock: Arc<dyn Clock>,
    tx_manager: Arc<dyn TransactionManager>,
}

impl ExpenseUseCaseImpl {
    /// 新しい経費承認ユースケースを作成する
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        expense_repo: Arc<dyn ExpenseRepository>,
        approval_repo: Arc<dyn ApprovalRepository>,
        assignment_repo: Arc<dyn ApproverAssignmentRepository>,
        rule_repo: Arc<dyn ApprovalRuleRepository>,
        user_repo: Arc<dyn UserRepository>,
        notification_service: Arc<NotificationService>,
        clock: Arc<dyn Clock>,
        tx_manager: Arc<dyn TransactionManager>,
    ) -> Self {
        Self {
            expense_repo,
            approval_repo,
            assignment_repo,
            rule_repo,
            user_repo,
            notification_service,
            clock,
            tx_manager,
        }
    }
}
