//! 経費申請のライフサイクル操作（作成・申請・取消）
//!
//! 申請（submit）が承認チェーンビルダーの本体:
//! 会社の承認者設定を順に解決して承認レコードを一括作成し、
//! 解決できなければ自動承認する。

use keihiflow_domain::{
    approval::{Approval, ApprovalId, Decision, NewApproval},
    assignment::ApproverResolution,
    company::CompanyId,
    expense::{Expense, ExpenseId, ExpenseStatus, NewExpense},
    user::UserId,
    value_objects::StepNumber,
};
use keihiflow_infra::InfraError;
use keihiflow_shared::{event_log::event, log_business_event};
use rust_decimal::Decimal;

use crate::{
    error::CoreError,
    usecase::{
        expense::{CreateExpenseInput, ExpenseUseCaseImpl, SubmitOutcome},
        helpers::{FindResultExt, map_domain_error},
    },
};

impl ExpenseUseCaseImpl {
    /// 経費申請を下書きとして作成する
    ///
    /// ## エラー
    ///
    /// - 申請者が見つからない場合: 404
    /// - 申請者が指定された会社に所属していない場合: 403
    /// - 金額が 0 以下の場合: 400
    pub async fn create_expense(
        &self,
        input: CreateExpenseInput,
        company_id: CompanyId,
    ) -> Result<Expense, CoreError> {
        let creator = self
            .user_repo
            .find_by_id(&input.created_by)
            .await
            .or_not_found("申請者")?;

        if creator.company_id() != &company_id {
            return Err(CoreError::Forbidden(
                "申請者はこの会社に所属していません".to_string(),
            ));
        }

        if input.amount <= Decimal::ZERO {
            return Err(CoreError::BadRequest(
                "金額は 0 より大きい必要があります".to_string(),
            ));
        }

        let expense = Expense::new(NewExpense {
            id: ExpenseId::new(),
            company_id: company_id.clone(),
            created_by: input.created_by,
            amount: input.amount,
            currency: input.currency,
            now: self.clock.now(),
        });

        self.expense_repo
            .insert(&expense)
            .await
            .map_err(|e| CoreError::Internal(format!("経費申請の保存に失敗: {}", e)))?;

        Ok(expense)
    }

    /// 経費申請を承認フローに乗せる（承認チェーンの構築）
    ///
    /// ## 処理フロー
    ///
    /// 1. 経費申請が存在し、下書き状態であるか確認
    /// 2. 会社の承認者設定を sequence 昇順で取得
    /// 3. 各設定を承認者に解決（上長 / 固定ユーザー / ロール）。
    ///    解決できない設定は承認レコードを作らずスキップする
    /// 4. 解決された承認者がゼロなら自動承認
    /// 5. それ以外は承認レコードを一括作成し、最小ステップで Pending に遷移
    /// 6. 承認レコードと経費申請の更新は単一トランザクションでコミット
    /// 7. コミット後に先頭承認者へ承認依頼を通知
    ///
    /// ## エラー
    ///
    /// - 経費申請が見つからない場合: 404
    /// - 下書き状態でない場合: 400
    /// - チェーン作成トランザクションの失敗: 500（全体ロールバック済み）
    pub async fn submit_expense(
        &self,
        expense_id: ExpenseId,
        company_id: CompanyId,
    ) -> Result<SubmitOutcome, CoreError> {
        // 1. 経費申請を取得
        let expense = self
            .expense_repo
            .find_by_id(&expense_id, &company_id)
            .await
            .or_not_found("経費申請")?;

        // 2. draft 状態であるか確認
        if expense.status() != ExpenseStatus::Draft {
            return Err(CoreError::BadRequest(
                "下書き状態の経費申請のみ申請できます".to_string(),
            ));
        }

        // 3. 申請者を取得（上長解決に使用）
        let submitter = self
            .user_repo
            .find_by_id(expense.created_by())
            .await
            .or_not_found("申請者")?;

        // 4. 会社の承認者設定を取得
        let assignments = self
            .assignment_repo
            .find_by_company(&company_id)
            .await
            .map_err(|e| CoreError::Internal(format!("承認者設定の取得に失敗: {}", e)))?;

        // 5. 各設定を承認者に解決する
        //
        // 上長設定で上長がいない場合はフォールバックせず未解決とする。
        // ロール設定は作成日時昇順・ID 昇順の決定的順序で先頭を選ぶ。
        let mut resolved: Vec<(StepNumber, UserId)> = Vec::with_capacity(assignments.len());
        for assignment in &assignments {
            let approver_id = match assignment.resolution() {
                ApproverResolution::Manager => submitter.manager_id().cloned(),
                ApproverResolution::User(user_id) => Some(user_id.clone()),
                ApproverResolution::Role(role) => self
                    .user_repo
                    .find_first_active_by_role(&company_id, *role)
                    .await
                    .map_err(|e| CoreError::Internal(format!("承認者の解決に失敗: {}", e)))?
                    .map(|user| user.id().clone()),
            };

            if let Some(approver_id) = approver_id {
                resolved.push((assignment.sequence(), approver_id));
            }
        }

        // ステップ番号の一意性を検証（resolved は sequence 昇順）
        if resolved.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(CoreError::BadRequest(
                "承認者設定の sequence が重複しています".to_string(),
            ));
        }

        let now = self.clock.now();
        let expected_version = expense.version();

        // 6. 解決された承認者がゼロなら自動承認
        if resolved.is_empty() {
            let approved = expense.auto_approved(now).map_err(map_domain_error)?;

            let mut tx = self.begin_tx().await?;
            self.expense_repo
                .update_with_version_check(&mut tx, &approved, expected_version)
                .await
                .map_err(|e| match e {
                    InfraError::Conflict { .. } => CoreError::Conflict(
                        "経費申請は既に更新されています。最新の情報を取得してください。"
                            .to_string(),
                    ),
                    other => CoreError::ChainCreation(other),
                })?;
            tx.commit().await.map_err(CoreError::ChainCreation)?;

            log_business_event!(
                event.category = event::category::EXPENSE,
                event.action = event::action::EXPENSE_AUTO_APPROVED,
                event.entity_type = event::entity_type::EXPENSE,
                event.entity_id = %expense_id,
                event.company_id = %company_id,
                event.result = event::result::SUCCESS,
                "承認者が解決できないため経費申請を自動承認しました"
            );

            self.notification_service
                .notify_decision(&approved, Decision::Approved, true)
                .await;

            return Ok(SubmitOutcome {
                status:       ExpenseStatus::Approved,
                current_step: None,
            });
        }

        // 7. チェーン先頭（最小ステップ）で Pending に遷移
        let (first_step, first_approver_id) = resolved[0].clone();
        let pending = expense
            .submitted(first_step, now)
            .map_err(map_domain_error)?;

        // 8. 解決済みの承認者ごとに承認レコードを作成
        let approvals: Vec<Approval> = resolved
            .iter()
            .map(|(step, approver_id)| {
                Approval::new(NewApproval {
                    id: ApprovalId::new(),
                    expense_id: expense_id.clone(),
                    approver_id: approver_id.clone(),
                    step: *step,
                    now,
                })
            })
            .collect();

        // 9. 全承認レコードと経費申請の更新を単一トランザクションでコミット
        let mut tx = self.begin_tx().await?;
        for approval in &approvals {
            self.approval_repo
                .insert(&mut tx, approval)
                .await
                .map_err(CoreError::ChainCreation)?;
        }
        self.expense_repo
            .update_with_version_check(&mut tx, &pending, expected_version)
            .await
            .map_err(|e| match e {
                InfraError::Conflict { .. } => CoreError::Conflict(
                    "経費申請は既に更新されています。最新の情報を取得してください。".to_string(),
                ),
                other => CoreError::ChainCreation(other),
            })?;
        tx.commit().await.map_err(CoreError::ChainCreation)?;

        log_business_event!(
            event.category = event::category::EXPENSE,
            event.action = event::action::EXPENSE_SUBMITTED,
            event.entity_type = event::entity_type::EXPENSE,
            event.entity_id = %expense_id,
            event.company_id = %company_id,
            event.result = event::result::SUCCESS,
            chain.steps = approvals.len(),
            "経費申請を承認フローに乗せました"
        );

        // 10. 先頭ステップの承認者に承認依頼を通知（コミット後）
        self.notification_service
            .notify_approval_requested(&pending, &first_approver_id)
            .await;

        Ok(SubmitOutcome {
            status:       ExpenseStatus::Pending,
            current_step: Some(first_step),
        })
    }

    /// 経費申請を取り消す
    ///
    /// 下書きまたは承認待ちの申請を申請者本人が取り消せる。
    /// 終端状態（承認・却下・取消済み）からは取り消せない。
    ///
    /// ## エラー
    ///
    /// - 経費申請が見つからない場合: 404
    /// - 申請者本人でない場合: 403
    /// - 終端状態の場合: 400
    pub async fn cancel_expense(
        &self,
        expense_id: ExpenseId,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<ExpenseStatus, CoreError> {
        let expense = self
            .expense_repo
            .find_by_id(&expense_id, &company_id)
            .await
            .or_not_found("経費申請")?;

        if expense.created_by() != &user_id {
            return Err(CoreError::Forbidden(
                "この経費申請を取り消す権限がありません".to_string(),
            ));
        }

        let now = self.clock.now();
        let expected_version = expense.version();
        let cancelled = expense.cancelled(now).map_err(map_domain_error)?;

        let mut tx = self.begin_tx().await?;
        self.save_expense(&mut tx, &cancelled, expected_version)
            .await?;
        self.commit_tx(tx).await?;

        log_business_event!(
            event.category = event::category::EXPENSE,
            event.action = event::action::EXPENSE_CANCELLED,
            event.entity_type = event::entity_type::EXPENSE,
            event.entity_id = %expense_id,
            event.company_id = %company_id,
            event.actor_id = %user_id,
            event.result = event::result::SUCCESS,
            "経費申請を取り消しました"
        );

        Ok(ExpenseStatus::Cancelled)
    }
}
