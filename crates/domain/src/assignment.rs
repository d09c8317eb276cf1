//! # 承認者設定
//!
//! 会社ごとの承認チェーンテンプレートを構成する設定エントリ。
//! 管理画面で設定される読み取り専用の入力であり、エンジンは
//! 申請時にこの設定から承認チェーンを解決する。

use chrono::{DateTime, Utc};

use crate::{
    DomainError,
    company::CompanyId,
    user::{UserId, UserRole},
    value_objects::StepNumber,
};

define_uuid_id! {
    /// 承認者設定 ID
    pub struct ApproverAssignmentId;
}

/// 承認者の解決方法
///
/// 1 つの設定エントリにつき、ちょうど 1 つの解決方法が適用される。
/// DB 上は `is_manager` / `user_id` / `role` の 3 カラムで表現され、
/// 複数が設定されている場合は `is_manager > user_id > role` の
/// 優先順位で解決する（[`ApproverAssignment::from_db`] が正規化する）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApproverResolution {
    /// 申請者の直属の上長に解決する。上長がいなければ未解決
    /// （フォールバックはしない）。
    Manager,
    /// 固定の承認者に解決する。
    User(UserId),
    /// 会社内で該当ロールを持つ最初のアクティブユーザーに解決する。
    /// 「最初」は作成日時昇順・ID 昇順で決定的に定まる。
    Role(UserRole),
}

/// 承認者設定エンティティ
///
/// 会社スコープの順序付き設定エントリ。`sequence` がチェーン内の
/// 順序を定義する。連番である必要はなく、昇順であることだけが
/// 保証される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproverAssignment {
    id: ApproverAssignmentId,
    company_id: CompanyId,
    sequence: StepNumber,
    resolution: ApproverResolution,
    created_at: DateTime<Utc>,
}

/// 承認者設定の DB 復元パラメータ
pub struct ApproverAssignmentRecord {
    pub id: ApproverAssignmentId,
    pub company_id: CompanyId,
    pub sequence: StepNumber,
    pub is_manager: bool,
    pub user_id: Option<UserId>,
    pub role: Option<UserRole>,
    pub created_at: DateTime<Utc>,
}

impl ApproverAssignment {
    /// 新しい承認者設定を作成する
    pub fn new(
        id: ApproverAssignmentId,
        company_id: CompanyId,
        sequence: StepNumber,
        resolution: ApproverResolution,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            company_id,
            sequence,
            resolution,
            created_at: now,
        }
    }

    /// 既存のデータから復元する
    ///
    /// 3 カラムの排他関係を `is_manager > user_id > role` の優先順位で
    /// 正規化し、[`ApproverResolution`] に変換する。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: いずれの解決方法も設定されていない場合
    pub fn from_db(record: ApproverAssignmentRecord) -> Result<Self, DomainError> {
        let resolution = if record.is_manager {
            ApproverResolution::Manager
        } else if let Some(user_id) = record.user_id {
            ApproverResolution::User(user_id)
        } else if let Some(role) = record.role {
            ApproverResolution::Role(role)
        } else {
            return Err(DomainError::Validation(
                "承認者設定には解決方法（上長・ユーザー・ロール）のいずれかが必要です"
                    .to_string(),
            ));
        };

        Ok(Self {
            id: record.id,
            company_id: record.company_id,
            sequence: record.sequence,
            resolution,
            created_at: record.created_at,
        })
    }

    pub fn id(&self) -> &ApproverAssignmentId {
        &self.id
    }

    pub fn company_id(&self) -> &CompanyId {
        &self.company_id
    }

    pub fn sequence(&self) -> StepNumber {
        self.sequence
    }

    pub fn resolution(&self) -> &ApproverResolution {
        &self.resolution
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
