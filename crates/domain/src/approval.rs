//! # 承認レコード
//!
//! 承認チェーン内の個々の承認タスクを管理する。
//! 承認者への割り当てと判断結果を保持し、承認・却下の状態遷移を持つ。
//!
//! 判断済みのレコードは不変であり、判断の修正はできない。
//! Pending → 判断済みの遷移は楽観的ロック（version）と組み合わせて
//! compare-and-set として実行される。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    DomainError,
    expense::ExpenseId,
    user::UserId,
    value_objects::{StepNumber, Version},
};

define_uuid_id! {
    /// 承認レコード ID
    pub struct ApprovalId;
}

/// 承認レコードの判断状態
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApprovalDecision {
    /// 未判断
    Pending,
    /// 承認
    Approved,
    /// 却下
    Rejected,
}

impl std::str::FromStr for ApprovalDecision {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(DomainError::Validation(format!("不正な判断状態: {}", s))),
        }
    }
}

/// 承認者が下す判断
///
/// リクエスト入力のパース対象。`ApprovalDecision` と異なり
/// Pending を含まないため、「未判断に戻す」入力を型レベルで排除する。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Decision {
    /// 承認
    Approved,
    /// 却下
    Rejected,
}

impl std::str::FromStr for Decision {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(DomainError::Validation(format!("不正な判断値: {}", s))),
        }
    }
}

/// 承認レコードエンティティ
///
/// 承認チェーン内の 1 ステップ分の承認タスク。申請時に
/// 解決済みの承認者ごとに一括作成され、`step` は承認者設定の
/// `sequence` を引き継ぐ。
///
/// # 不変条件
///
/// - 同一経費内で `step` は一意
/// - 判断済み（decision != Pending）のレコードは変更不可
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    id: ApprovalId,
    expense_id: ExpenseId,
    approver_id: UserId,
    step: StepNumber,
    decision: ApprovalDecision,
    comments: Option<String>,
    decided_at: Option<DateTime<Utc>>,
    version: Version,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// 承認レコードの新規作成パラメータ
pub struct NewApproval {
    pub id: ApprovalId,
    pub expense_id: ExpenseId,
    pub approver_id: UserId,
    pub step: StepNumber,
    pub now: DateTime<Utc>,
}

/// 承認レコードの DB 復元パラメータ
pub struct ApprovalRecord {
    pub id: ApprovalId,
    pub expense_id: ExpenseId,
    pub approver_id: UserId,
    pub step: StepNumber,
    pub decision: ApprovalDecision,
    pub comments: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Approval {
    /// 新しい承認レコードを未判断状態で作成する
    pub fn new(params: NewApproval) -> Self {
        Self {
            id: params.id,
            expense_id: params.expense_id,
            approver_id: params.approver_id,
            step: params.step,
            decision: ApprovalDecision::Pending,
            comments: None,
            decided_at: None,
            version: Version::initial(),
            created_at: params.now,
            updated_at: params.now,
        }
    }

    /// 既存のデータから復元する
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 判断済みなのに decided_at が欠損している場合
    pub fn from_db(record: ApprovalRecord) -> Result<Self, DomainError> {
        if record.decision != ApprovalDecision::Pending && record.decided_at.is_none() {
            return Err(DomainError::Validation(
                "判断済みの承認レコードには decided_at が必要です".to_string(),
            ));
        }

        Ok(Self {
            id: record.id,
            expense_id: record.expense_id,
            approver_id: record.approver_id,
            step: record.step,
            decision: record.decision,
            comments: record.comments,
            decided_at: record.decided_at,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    // Getter メソッド

    pub fn id(&self) -> &ApprovalId {
        &self.id
    }

    pub fn expense_id(&self) -> &ExpenseId {
        &self.expense_id
    }

    pub fn approver_id(&self) -> &UserId {
        &self.approver_id
    }

    pub fn step(&self) -> StepNumber {
        self.step
    }

    pub fn decision(&self) -> ApprovalDecision {
        self.decision
    }

    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }

    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.decided_at
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // ビジネスロジックメソッド

    /// 未判断か判定する
    pub fn is_pending(&self) -> bool {
        self.decision == ApprovalDecision::Pending
    }

    /// 承認する
    ///
    /// Pending 状態のレコードを Approved に遷移させる。
    /// version をインクリメントして楽観的ロックに対応。
    ///
    /// # Errors
    ///
    /// - `DomainError::Conflict`: すでに判断済みの場合
    pub fn approve(
        self,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if !self.is_pending() {
            return Err(DomainError::Conflict(format!(
                "この承認は既に判断済みです（現在: {}）",
                self.decision
            )));
        }

        Ok(Self {
            decision: ApprovalDecision::Approved,
            comments,
            decided_at: Some(now),
            version: self.version.next(),
            updated_at: now,
            ..self
        })
    }

    /// 却下する
    ///
    /// Pending 状態のレコードを Rejected に遷移させる。
    /// version をインクリメントして楽観的ロックに対応。
    ///
    /// # Errors
    ///
    /// - `DomainError::Conflict`: すでに判断済みの場合
    pub fn reject(self, comments: Option<String>, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if !self.is_pending() {
            return Err(DomainError::Conflict(format!(
                "この承認は既に判断済みです（現在: {}）",
                self.decision
            )));
        }

        Ok(Self {
            decision: ApprovalDecision::Rejected,
            comments,
            decided_at: Some(now),
            version: self.version.next(),
            updated_at: now,
            ..self
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::{fixture, rstest};

    use super::*;

    /// テスト用の固定タイムスタンプ
    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[fixture]
    fn pending_approval(now: DateTime<Utc>) -> Approval {
        Approval::new(NewApproval {
            id: ApprovalId::new(),
            expense_id: ExpenseId::new(),
            approver_id: UserId::new(),
            step: StepNumber::new(1).unwrap(),
            now,
        })
    }

    mod approval {
        use pretty_assertions::assert_eq;

        use super::*;

        fn record_from(approval: &Approval) -> ApprovalRecord {
            ApprovalRecord {
                id: approval.id().clone(),
                expense_id: approval.expense_id().clone(),
                approver_id: approval.approver_id().clone(),
                step: approval.step(),
                decision: approval.decision(),
                comments: approval.comments().map(String::from),
                decided_at: approval.decided_at(),
                version: approval.version(),
                created_at: approval.created_at(),
                updated_at: approval.updated_at(),
            }
        }

        #[rstest]
        fn test_新規作成の初期状態(pending_approval: Approval) {
            assert_eq!(pending_approval.decision(), ApprovalDecision::Pending);
            assert!(pending_approval.is_pending());
            assert_eq!(pending_approval.decided_at(), None);
            assert_eq!(pending_approval.version(), Version::initial());
        }

        #[rstest]
        fn test_承認後の状態(pending_approval: Approval, now: DateTime<Utc>) {
            let before = pending_approval.clone();

            let sut = pending_approval
                .approve(Some("問題ありません".to_string()), now)
                .unwrap();

            let expected = Approval::from_db(ApprovalRecord {
                decision: ApprovalDecision::Approved,
                comments: Some("問題ありません".to_string()),
                decided_at: Some(now),
                version: before.version().next(),
                updated_at: now,
                ..record_from(&before)
            })
            .unwrap();
            assert_eq!(sut, expected);
        }

        #[rstest]
        fn test_却下後の状態(pending_approval: Approval, now: DateTime<Utc>) {
            let before = pending_approval.clone();

            let sut = pending_approval
                .reject(Some("領収書がありません".to_string()), now)
                .unwrap();

            let expected = Approval::from_db(ApprovalRecord {
                decision: ApprovalDecision::Rejected,
                comments: Some("領収書がありません".to_string()),
                decided_at: Some(now),
                version: before.version().next(),
                updated_at: now,
                ..record_from(&before)
            })
            .unwrap();
            assert_eq!(sut, expected);
        }

        #[rstest]
        fn test_判断済みの承認への再承認はエラー(
            pending_approval: Approval,
            now: DateTime<Utc>,
        ) {
            let approved = pending_approval.approve(None, now).unwrap();

            let result = approved.approve(None, now);

            assert!(matches!(result, Err(DomainError::Conflict(_))));
        }

        #[rstest]
        fn test_判断済みの承認への却下はエラー(
            pending_approval: Approval,
            now: DateTime<Utc>,
        ) {
            let approved = pending_approval.approve(None, now).unwrap();

            let result = approved.reject(None, now);

            assert!(matches!(result, Err(DomainError::Conflict(_))));
        }

        #[rstest]
        fn test_却下済みの承認への承認はエラー(
            pending_approval: Approval,
            now: DateTime<Utc>,
        ) {
            let rejected = pending_approval.reject(None, now).unwrap();

            let result = rejected.approve(None, now);

            assert!(matches!(result, Err(DomainError::Conflict(_))));
        }

        #[rstest]
        fn test_from_db_判断済みでdecided_at欠損はエラー(pending_approval: Approval) {
            let result = Approval::from_db(ApprovalRecord {
                decision: ApprovalDecision::Approved,
                decided_at: None,
                ..record_from(&pending_approval)
            });

            assert!(result.is_err());
        }

        #[rstest]
        fn test_from_db_未判断でdecided_at無しは有効(pending_approval: Approval) {
            let result = Approval::from_db(record_from(&pending_approval));

            assert!(result.is_ok());
        }
    }

    mod decision {
        use pretty_assertions::assert_eq;

        use super::*;

        #[rstest]
        #[case("approved", Decision::Approved)]
        #[case("rejected", Decision::Rejected)]
        fn test_判断値の文字列変換はラウンドトリップする(
            #[case] s: &str,
            #[case] decision: Decision,
        ) {
            assert_eq!(Decision::from_str(s).unwrap(), decision);
            assert_eq!(decision.to_string(), s);
        }

        #[rstest]
        #[case("pending")]
        #[case("maybe")]
        #[case("")]
        #[case("APPROVED")]
        fn test_不正な判断値はエラー(#[case] s: &str) {
            assert!(Decision::from_str(s).is_err());
        }
    }
}
