//! 経費承認ユースケース共通のヘルパー関数
//!
//! 永続化ボイラープレート（トランザクション操作、version check 付き更新、
//! 承認チェーン取得）を共通化する。

use keihiflow_domain::{
    approval::Approval,
    expense::{Expense, ExpenseId},
    value_objects::Version,
};
use keihiflow_infra::{InfraError, TxContext};

use super::ExpenseUseCaseImpl;
use crate::error::CoreError;

impl ExpenseUseCaseImpl {
    /// トランザクションを開始する
    pub(super) async fn begin_tx(&self) -> Result<TxContext, CoreError> {
        self.tx_manager
            .begin()
            .await
            .map_err(|e| CoreError::Internal(format!("トランザクション開始に失敗: {}", e)))
    }

    /// トランザクションをコミットする
    pub(super) async fn commit_tx(&self, tx: TxContext) -> Result<(), CoreError> {
        tx.commit()
            .await
            .map_err(|e| CoreError::Internal(format!("トランザクションコミットに失敗: {}", e)))
    }

    /// 経費申請を version check 付きで更新する
    pub(super) async fn save_expense(
        &self,
        tx: &mut TxContext,
        expense: &Expense,
        expected_version: Version,
    ) -> Result<(), CoreError> {
        self.expense_repo
            .update_with_version_check(tx, expense, expected_version)
            .await
            .map_err(|e| match e {
                InfraError::Conflict { .. } => CoreError::Conflict(
                    "経費申請は既に更新されています。最新の情報を取得してください。".to_string(),
                ),
                other => CoreError::Internal(format!("経費申請の保存に失敗: {}", other)),
            })
    }

    /// 承認レコードを version check 付きで更新する
    ///
    /// Pending → 判断済みの compare-and-set。並行する判断の一方は
    /// ここで競合となり、上書きせずに失敗する。
    pub(super) async fn save_approval(
        &self,
        tx: &mut TxContext,
        approval: &Approval,
        expected_version: Version,
    ) -> Result<(), CoreError> {
        self.approval_repo
            .update_with_version_check(tx, approval, expected_version)
            .await
            .map_err(|e| match e {
                InfraError::Conflict { .. } => CoreError::Conflict(
                    "この承認は既に判断済みです。最新の情報を取得してください。".to_string(),
                ),
                other => CoreError::Internal(format!("承認の保存に失敗: {}", other)),
            })
    }

    /// 経費申請に紐づく承認チェーンをステップ昇順で取得する
    pub(super) async fn fetch_expense_approvals(
        &self,
        expense_id: &ExpenseId,
    ) -> Result<Vec<Approval>, CoreError> {
        self.approval_repo
            .find_by_expense(expense_id)
            .await
            .map_err(|e| CoreError::Internal(format!("承認チェーンの取得に失敗: {}", e)))
    }
}
