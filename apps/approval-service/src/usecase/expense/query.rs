//! 承認チェーン・未判断タスク・通知の照会

use keihiflow_domain::{
    approval::Approval,
    company::CompanyId,
    expense::ExpenseId,
    notification::Notification,
    user::UserId,
};

use crate::{
    error::CoreError,
    usecase::{expense::ExpenseUseCaseImpl, helpers::FindResultExt},
};

impl ExpenseUseCaseImpl {
    /// 承認者の未判断レコード一覧を取得する（タスク一覧用）
    pub async fn list_pending_approvals(
        &self,
        company_id: CompanyId,
        approver_id: UserId,
    ) -> Result<Vec<Approval>, CoreError> {
        self.approval_repo
            .find_pending_by_approver(&company_id, &approver_id)
            .await
            .map_err(|e| CoreError::Internal(format!("未判断の承認の取得に失敗: {}", e)))
    }

    /// 経費申請の承認チェーン（履歴）をステップ昇順で取得する
    ///
    /// ## エラー
    ///
    /// - 経費申請が見つからない場合: 404
    pub async fn list_expense_approvals(
        &self,
        expense_id: ExpenseId,
        company_id: CompanyId,
    ) -> Result<Vec<Approval>, CoreError> {
        // 会社スコープの検証を兼ねて経費申請の存在を確認する
        self.expense_repo
            .find_by_id(&expense_id, &company_id)
            .await
            .or_not_found("経費申請")?;

        self.fetch_expense_approvals(&expense_id).await
    }

    /// ユーザーの通知一覧を作成日時降順で取得する
    pub async fn list_notifications(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Notification>, CoreError> {
        self.notification_service
            .list_for_user(&user_id)
            .await
            .map_err(|e| CoreError::Internal(format!("通知の取得に失敗: {}", e)))
    }
}
