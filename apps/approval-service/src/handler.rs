//! # HTTP ハンドラ
//!
//! リクエストのパースとレスポンスの組み立てのみを行う薄い層。
//! ビジネスロジックはすべてユースケース層に委譲する。

pub mod expense;
pub mod health;

pub use expense::{
    cancel_expense,
    create_expense,
    list_expense_approvals,
    list_notifications,
    list_pending_approvals,
    record_decision,
    submit_expense,
};
pub use health::health_check;

use chrono::{DateTime, Utc};
use keihiflow_domain::{
    approval::Approval,
    expense::{Expense, ExpenseStatus},
    notification::Notification,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::usecase::{DecisionOutcome, ExpenseUseCaseImpl, SubmitOutcome};

/// 経費承認 API の共有状態
pub struct ExpenseState {
    pub usecase: ExpenseUseCaseImpl,
}

// ===== リクエスト DTO =====

/// 経費申請の作成リクエスト
#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub company_id: Uuid,
    pub created_by: Uuid,
    pub amount:     Decimal,
    pub currency:   String,
}

/// 経費申請の申請リクエスト
#[derive(Debug, Deserialize)]
pub struct SubmitExpenseRequest {
    pub company_id: Uuid,
}

/// 判断リクエスト
#[derive(Debug, Deserialize)]
pub struct RecordDecisionRequest {
    pub company_id:  Uuid,
    pub approver_id: Uuid,
    /// "approved" または "rejected"
    pub decision:    String,
    pub comments:    Option<String>,
}

/// 経費申請の取消リクエスト
#[derive(Debug, Deserialize)]
pub struct CancelExpenseRequest {
    pub company_id: Uuid,
    pub user_id:    Uuid,
}

/// 未判断タスク一覧のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct PendingApprovalsQuery {
    pub company_id:  Uuid,
    pub approver_id: Uuid,
}

/// 承認チェーン照会のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct ExpenseApprovalsQuery {
    pub company_id: Uuid,
}

/// 通知一覧のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    pub user_id: Uuid,
}

// ===== レスポンス DTO =====

/// 経費申請 DTO
#[derive(Debug, Serialize)]
pub struct ExpenseDto {
    pub id: Uuid,
    pub company_id: Uuid,
    pub created_by: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: ExpenseStatus,
    pub current_step: Option<i32>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExpenseDto {
    pub fn from_expense(expense: &Expense) -> Self {
        Self {
            id: *expense.id().as_uuid(),
            company_id: *expense.company_id().as_uuid(),
            created_by: *expense.created_by().as_uuid(),
            amount: expense.amount(),
            currency: expense.currency().as_str().to_string(),
            status: expense.status(),
            current_step: expense.current_step().map(|s| s.as_i32()),
            submitted_at: expense.submitted_at(),
            completed_at: expense.completed_at(),
            created_at: expense.created_at(),
            updated_at: expense.updated_at(),
        }
    }
}

/// 申請結果 DTO
#[derive(Debug, Serialize)]
pub struct SubmitOutcomeDto {
    pub status:       ExpenseStatus,
    pub current_step: Option<i32>,
}

impl SubmitOutcomeDto {
    pub fn from_outcome(outcome: &SubmitOutcome) -> Self {
        Self {
            status:       outcome.status,
            current_step: outcome.current_step.map(|s| s.as_i32()),
        }
    }
}

/// 判断結果 DTO
#[derive(Debug, Serialize)]
pub struct DecisionOutcomeDto {
    pub expense_status:   ExpenseStatus,
    pub next_approver_id: Option<Uuid>,
}

impl DecisionOutcomeDto {
    pub fn from_outcome(outcome: &DecisionOutcome) -> Self {
        Self {
            expense_status:   outcome.expense_status,
            next_approver_id: outcome.next_approver_id.as_ref().map(|id| *id.as_uuid()),
        }
    }
}

/// 承認レコード DTO
#[derive(Debug, Serialize)]
pub struct ApprovalDto {
    pub id: Uuid,
    pub expense_id: Uuid,
    pub approver_id: Uuid,
    pub step: i32,
    pub decision: keihiflow_domain::approval::ApprovalDecision,
    pub comments: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalDto {
    pub fn from_approval(approval: &Approval) -> Self {
        Self {
            id: *approval.id().as_uuid(),
            expense_id: *approval.expense_id().as_uuid(),
            approver_id: *approval.approver_id().as_uuid(),
            step: approval.step().as_i32(),
            decision: approval.decision(),
            comments: approval.comments().map(String::from),
            decided_at: approval.decided_at(),
            created_at: approval.created_at(),
        }
    }
}

/// 通知 DTO
#[derive(Debug, Serialize)]
pub struct NotificationDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_type: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationDto {
    pub fn from_notification(notification: &Notification) -> Self {
        Self {
            id: *notification.id().as_uuid(),
            user_id: *notification.user_id().as_uuid(),
            event_type: notification.event_type().to_string(),
            title: notification.title().to_string(),
            message: notification.message().to_string(),
            link: notification.link().map(String::from),
            read: notification.read(),
            created_at: notification.created_at(),
        }
    }
}
