//! 経費承認エンジンのハンドラ
//!
//! 承認エンジンの 2 つの主要エントリポイント（申請・判断）と、
//! 周辺の照会エンドポイントを提供する。

use std::{str::FromStr, sync::Arc};

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use keihiflow_domain::{
    approval::{ApprovalId, Decision},
    company::CompanyId,
    expense::ExpenseId,
    user::UserId,
    value_objects::CurrencyCode,
};
use keihiflow_shared::ApiResponse;
use uuid::Uuid;

use super::{
    ApprovalDto,
    CancelExpenseRequest,
    CreateExpenseRequest,
    DecisionOutcomeDto,
    ExpenseApprovalsQuery,
    ExpenseDto,
    ExpenseState,
    NotificationDto,
    NotificationsQuery,
    PendingApprovalsQuery,
    RecordDecisionRequest,
    SubmitExpenseRequest,
    SubmitOutcomeDto,
};
use crate::{
    error::CoreError,
    usecase::{CreateExpenseInput, RecordDecisionInput},
};

/// 経費申請を作成する（下書き）
///
/// ## エンドポイント
/// POST /internal/expenses
pub async fn create_expense(
    State(state): State<Arc<ExpenseState>>,
    Json(req): Json<CreateExpenseRequest>,
) -> Result<Response, CoreError> {
    let company_id = CompanyId::from_uuid(req.company_id);
    let currency = CurrencyCode::new(req.currency)
        .map_err(|e| CoreError::BadRequest(e.to_string()))?;

    let input = CreateExpenseInput {
        created_by: UserId::from_uuid(req.created_by),
        amount: req.amount,
        currency,
    };

    let expense = state.usecase.create_expense(input, company_id).await?;

    let response = ApiResponse::new(ExpenseDto::from_expense(&expense));
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// 経費申請を承認フローに乗せる
///
/// ## エンドポイント
/// POST /internal/expenses/{id}/submit
pub async fn submit_expense(
    State(state): State<Arc<ExpenseState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitExpenseRequest>,
) -> Result<Response, CoreError> {
    let expense_id = ExpenseId::from_uuid(id);
    let company_id = CompanyId::from_uuid(req.company_id);

    let outcome = state.usecase.submit_expense(expense_id, company_id).await?;

    let response = ApiResponse::new(SubmitOutcomeDto::from_outcome(&outcome));
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// 承認者の判断（承認・却下）を記録する
///
/// ## エンドポイント
/// POST /internal/approvals/{id}/decision
pub async fn record_decision(
    State(state): State<Arc<ExpenseState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<RecordDecisionRequest>,
) -> Result<Response, CoreError> {
    let approval_id = ApprovalId::from_uuid(id);
    let company_id = CompanyId::from_uuid(req.company_id);
    let approver_id = UserId::from_uuid(req.approver_id);

    // "approved" / "rejected" 以外の判断値はここで弾く
    let decision =
        Decision::from_str(&req.decision).map_err(|e| CoreError::BadRequest(e.to_string()))?;

    let input = RecordDecisionInput {
        decision,
        comments: req.comments,
    };

    let outcome = state
        .usecase
        .record_decision(approval_id, company_id, approver_id, input)
        .await?;

    let response = ApiResponse::new(DecisionOutcomeDto::from_outcome(&outcome));
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// 経費申請を取り消す
///
/// ## エンドポイント
/// POST /internal/expenses/{id}/cancel
pub async fn cancel_expense(
    State(state): State<Arc<ExpenseState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelExpenseRequest>,
) -> Result<Response, CoreError> {
    let expense_id = ExpenseId::from_uuid(id);
    let company_id = CompanyId::from_uuid(req.company_id);
    let user_id = UserId::from_uuid(req.user_id);

    let status = state
        .usecase
        .cancel_expense(expense_id, company_id, user_id)
        .await?;

    let response = ApiResponse::new(status);
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// 経費申請の承認チェーン（履歴）を取得する
///
/// ## エンドポイント
/// GET /internal/expenses/{id}/approvals
pub async fn list_expense_approvals(
    State(state): State<Arc<ExpenseState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExpenseApprovalsQuery>,
) -> Result<Response, CoreError> {
    let expense_id = ExpenseId::from_uuid(id);
    let company_id = CompanyId::from_uuid(query.company_id);

    let approvals = state
        .usecase
        .list_expense_approvals(expense_id, company_id)
        .await?;

    let dtos: Vec<ApprovalDto> = approvals.iter().map(ApprovalDto::from_approval).collect();
    Ok((StatusCode::OK, Json(ApiResponse::new(dtos))).into_response())
}

/// 承認者の未判断タスク一覧を取得する
///
/// ## エンドポイント
/// GET /internal/approvals/pending
pub async fn list_pending_approvals(
    State(state): State<Arc<ExpenseState>>,
    Query(query): Query<PendingApprovalsQuery>,
) -> Result<Response, CoreError> {
    let company_id = CompanyId::from_uuid(query.company_id);
    let approver_id = UserId::from_uuid(query.approver_id);

    let approvals = state
        .usecase
        .list_pending_approvals(company_id, approver_id)
        .await?;

    let dtos: Vec<ApprovalDto> = approvals.iter().map(ApprovalDto::from_approval).collect();
    Ok((StatusCode::OK, Json(ApiResponse::new(dtos))).into_response())
}

/// ユーザーの通知一覧を取得する
///
/// ## エンドポイント
/// GET /internal/notifications
pub async fn list_notifications(
    State(state): State<Arc<ExpenseState>>,
    Query(query): Query<NotificationsQuery>,
) -> Result<Response, CoreError> {
    let user_id = UserId::from_uuid(query.user_id);

    let notifications = state.usecase.list_notifications(user_id).await?;

    let dtos: Vec<NotificationDto> = notifications
        .iter()
        .map(NotificationDto::from_notification)
        .collect();
    Ok((StatusCode::OK, Json(ApiResponse::new(dtos))).into_response())
}
