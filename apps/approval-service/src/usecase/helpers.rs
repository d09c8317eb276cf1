//! ユースケース層の共通ヘルパー
//!
//! リポジトリ呼び出し結果の変換や権限チェックなど、
//! 複数のユースケースで繰り返されるパターンを共通化する。

use keihiflow_domain::{DomainError, approval::Approval, user::UserId};
use keihiflow_infra::InfraError;

use crate::error::CoreError;

/// リポジトリの `Result<Option<T>, InfraError>` を `Result<T, CoreError>` に変換する
///
/// `find_by_id` 等の `Option` を返すリポジトリメソッドの結果を、
/// `CoreError::NotFound` または `CoreError::Internal` に変換する。
///
/// ```ignore
/// // Before
/// let approval = self.approval_repo.find_by_id(&approval_id).await
///     .map_err(|e| CoreError::Internal(format!("承認の取得に失敗: {}", e)))?
///     .ok_or_else(|| CoreError::NotFound("承認が見つかりません".to_string()))?;
///
/// // After
/// let approval = self.approval_repo.find_by_id(&approval_id).await
///     .or_not_found("承認")?;
/// ```
pub(crate) trait FindResultExt<T> {
    /// `None` の場合は `CoreError::NotFound`、`InfraError` の場合は `CoreError::Internal` を返す
    fn or_not_found(self, entity_name: &str) -> Result<T, CoreError>;
}

impl<T> FindResultExt<T> for Result<Option<T>, InfraError> {
    fn or_not_found(self, entity_name: &str) -> Result<T, CoreError> {
        self.map_err(|e| CoreError::Internal(format!("{}の取得に失敗: {}", entity_name, e)))?
            .ok_or_else(|| CoreError::NotFound(format!("{}が見つかりません", entity_name)))
    }
}

/// 承認レコードの担当者をチェックする
///
/// 指定されたユーザーが承認レコードの担当者でない場合、
/// `CoreError::Forbidden` を返す。
pub(crate) fn check_approval_assigned_to(
    approval: &Approval,
    user_id: &UserId,
) -> Result<(), CoreError> {
    if approval.approver_id() != user_id {
        return Err(CoreError::Forbidden(
            "この承認を判断する権限がありません".to_string(),
        ));
    }
    Ok(())
}

/// ドメイン層の状態遷移エラーを HTTP 相当のエラーに変換する
///
/// 判断済み承認への再判断（`DomainError::Conflict`）は 409、
/// それ以外のビジネスルール違反は 400 として扱う。
pub(crate) fn map_domain_error(e: DomainError) -> CoreError {
    match e {
        DomainError::Conflict(msg) => CoreError::Conflict(msg),
        DomainError::Forbidden(msg) => CoreError::Forbidden(msg),
        DomainError::NotFound { entity_type, id } => {
            CoreError::NotFound(format!("{}が見つかりません: {}", entity_type, id))
        }
        DomainError::Validation(msg) => CoreError::BadRequest(msg),
    }
}

#[cfg(test)]
mod tests {
    use keihiflow_domain::{
        approval::{ApprovalId, NewApproval},
        expense::ExpenseId,
        value_objects::StepNumber,
    };
    use keihiflow_infra::InfraError;

    use super::*;

    // === FindResultExt ===

    #[test]
    fn test_or_not_found_ok_some_は値を返す() {
        let result: Result<Option<i32>, InfraError> = Ok(Some(42));

        let value = result.or_not_found("テスト").unwrap();

        assert_eq!(value, 42);
    }

    #[test]
    fn test_or_not_found_ok_none_はnotfoundエラーを返す() {
        let result: Result<Option<i32>, InfraError> = Ok(None);

        let err = result.or_not_found("承認").unwrap_err();

        match err {
            CoreError::NotFound(msg) => {
                assert_eq!(msg, "承認が見つかりません");
            }
            other => panic!("NotFound を期待したが {:?} を受信", other),
        }
    }

    #[test]
    fn test_or_not_found_errはinternalエラーを返す() {
        let result: Result<Option<i32>, InfraError> = Err(InfraError::unexpected("接続失敗"));

        let err = result.or_not_found("経費申請").unwrap_err();

        match err {
            CoreError::Internal(msg) => {
                assert!(msg.contains("経費申請の取得に失敗"));
                assert!(msg.contains("接続失敗"));
            }
            other => panic!("Internal を期待したが {:?} を受信", other),
        }
    }

    // === check_approval_assigned_to ===

    fn create_test_approval(approver_id: &UserId) -> Approval {
        let now = chrono::Utc::now();
        Approval::new(NewApproval {
            id: ApprovalId::new(),
            expense_id: ExpenseId::new(),
            approver_id: approver_id.clone(),
            step: StepNumber::new(1).unwrap(),
            now,
        })
    }

    #[test]
    fn test_check_approval_assigned_to_担当者一致はokを返す() {
        let user_id = UserId::new();
        let approval = create_test_approval(&user_id);

        let result = check_approval_assigned_to(&approval, &user_id);

        assert!(result.is_ok());
    }

    #[test]
    fn test_check_approval_assigned_to_担当者不一致はforbiddenを返す() {
        let assigned_user = UserId::new();
        let other_user = UserId::new();
        let approval = create_test_approval(&assigned_user);

        let err = check_approval_assigned_to(&approval, &other_user).unwrap_err();

        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    // === map_domain_error ===

    #[test]
    fn test_map_domain_error_conflictは409相当() {
        let err = map_domain_error(DomainError::Conflict("判断済み".to_string()));
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn test_map_domain_error_validationは400相当() {
        let err = map_domain_error(DomainError::Validation("不正な遷移".to_string()));
        assert!(matches!(err, CoreError::BadRequest(_)));
    }
}
