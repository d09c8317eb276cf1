//! # 経費申請
//!
//! 承認チェーンの対象となる経費申請エンティティを管理する。
//! 下書き・承認待ち・承認・却下・取消のライフサイクルを持つ。
//!
//! 状態遷移は ADT（代数的データ型）で表現し、不正な状態を型レベルで防止する。
//! 共通フィールドを外側に、状態固有フィールドを `state` enum に分離する。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    DomainError,
    company::CompanyId,
    user::UserId,
    value_objects::{CurrencyCode, StepNumber, Version},
};

define_uuid_id! {
    /// 経費申請 ID
    pub struct ExpenseId;
}

/// 経費申請ステータス
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExpenseStatus {
    /// 下書き
    Draft,
    /// 承認待ち
    Pending,
    /// 承認完了
    Approved,
    /// 却下
    Rejected,
    /// 取り消し
    Cancelled,
}

impl std::str::FromStr for ExpenseStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(DomainError::Validation(format!(
                "不正な経費申請ステータス: {}",
                s
            ))),
        }
    }
}

/// 経費申請の状態（ADT ベースステートマシン）
///
/// 各状態で有効なフィールドのみを持たせることで、不正な状態を型レベルで防止する。
/// Approved / Rejected / Cancelled は終端状態であり、以降の遷移は存在しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpenseState {
    /// 下書き
    Draft,
    /// 承認待ち
    Pending(PendingState),
    /// 承認完了
    Approved(ApprovedState),
    /// 却下
    Rejected(RejectedState),
    /// 取り消し
    Cancelled(CancelledState),
}

/// Pending 状態の固有フィールド
///
/// `current_step` は未判断の承認レコードのうち最小のステップ番号を指す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingState {
    /// 申請日時
    pub submitted_at: DateTime<Utc>,
    /// 現在の承認ステップ
    pub current_step: StepNumber,
}

/// Approved 状態の固有フィールド
///
/// `last_step` は最後に判断されたステップ。空チェーン・未解決チェーンによる
/// 自動承認では承認レコードが存在しないため None になる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedState {
    /// 申請日時
    pub submitted_at: DateTime<Utc>,
    /// 完了日時
    pub completed_at: DateTime<Utc>,
    /// 最後に判断されたステップ
    pub last_step:    Option<StepNumber>,
}

/// Rejected 状態の固有フィールド
///
/// 却下は必ず承認者の判断を経由するため、`last_step` は常に存在する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedState {
    /// 申請日時
    pub submitted_at: DateTime<Utc>,
    /// 完了日時
    pub completed_at: DateTime<Utc>,
    /// 却下が発生したステップ
    pub last_step:    StepNumber,
}

/// Cancelled 状態の固有フィールド
///
/// Draft / Pending から遷移可能。Draft からの取消では申請日時が存在しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledState {
    /// 申請日時（Draft から遷移時は None）
    pub submitted_at: Option<DateTime<Utc>>,
    /// 完了日時
    pub completed_at: DateTime<Utc>,
}

/// 経費申請エンティティ
///
/// 承認チェーンの対象となる申請。金額・通貨と進捗状態を保持する。
///
/// ## 楽観的ロック
///
/// `version` フィールドにより、並行更新時の競合を検出する。
/// 更新操作時は取得時の version と DB の version を比較し、
/// 一致しない場合は競合エラー（409 Conflict）を返す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    id: ExpenseId,
    company_id: CompanyId,
    created_by: UserId,
    amount: Decimal,
    currency: CurrencyCode,
    version: Version,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    state: ExpenseState,
}

/// 経費申請の新規作成パラメータ
pub struct NewExpense {
    pub id: ExpenseId,
    pub company_id: CompanyId,
    pub created_by: UserId,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub now: DateTime<Utc>,
}

/// 経費申請の DB 復元パラメータ
///
/// DB スキーマのフラット構造を表現する。`from_db()` で不変条件を検証して ADT に変換する。
pub struct ExpenseRecord {
    pub id: ExpenseId,
    pub company_id: CompanyId,
    pub created_by: UserId,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub status: ExpenseStatus,
    pub version: Version,
    pub current_step: Option<StepNumber>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    /// 新しい経費申請を下書きとして作成する
    pub fn new(params: NewExpense) -> Self {
        Self {
            id: params.id,
            company_id: params.company_id,
            created_by: params.created_by,
            amount: params.amount,
            currency: params.currency,
            version: Version::initial(),
            created_at: params.now,
            updated_at: params.now,
            state: ExpenseState::Draft,
        }
    }

    /// 既存のデータから復元する
    ///
    /// DB のフラット構造から ADT に変換し、状態ごとの不変条件を検証する。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 不変条件違反（例: Pending で current_step が
    ///   None）
    pub fn from_db(record: ExpenseRecord) -> Result<Self, DomainError> {
        let state = match record.status {
            ExpenseStatus::Draft => ExpenseState::Draft,
            ExpenseStatus::Pending => {
                let submitted_at = record.submitted_at.ok_or_else(|| {
                    DomainError::Validation(
                        "Pending の経費申請には submitted_at が必要です".to_string(),
                    )
                })?;
                let current_step = record.current_step.ok_or_else(|| {
                    DomainError::Validation(
                        "Pending の経費申請には current_step が必要です".to_string(),
                    )
                })?;
                ExpenseState::Pending(PendingState {
                    submitted_at,
                    current_step,
                })
            }
            ExpenseStatus::Approved => {
                let submitted_at = record.submitted_at.ok_or_else(|| {
                    DomainError::Validation(
                        "Approved の経費申請には submitted_at が必要です".to_string(),
                    )
                })?;
                let completed_at = record.completed_at.ok_or_else(|| {
                    DomainError::Validation(
                        "Approved の経費申請には completed_at が必要です".to_string(),
                    )
                })?;
                ExpenseState::Approved(ApprovedState {
                    submitted_at,
                    completed_at,
                    last_step: record.current_step,
                })
            }
            ExpenseStatus::Rejected => {
                let submitted_at = record.submitted_at.ok_or_else(|| {
                    DomainError::Validation(
                        "Rejected の経費申請には submitted_at が必要です".to_string(),
                    )
                })?;
                let completed_at = record.completed_at.ok_or_else(|| {
                    DomainError::Validation(
                        "Rejected の経費申請には completed_at が必要です".to_string(),
                    )
                })?;
                let last_step = record.current_step.ok_or_else(|| {
                    DomainError::Validation(
                        "Rejected の経費申請には current_step が必要です".to_string(),
                    )
                })?;
                ExpenseState::Rejected(RejectedState {
                    submitted_at,
                    completed_at,
                    last_step,
                })
            }
            ExpenseStatus::Cancelled => {
                let completed_at = record.completed_at.ok_or_else(|| {
                    DomainError::Validation(
                        "Cancelled の経費申請には completed_at が必要です".to_string(),
                    )
                })?;
                ExpenseState::Cancelled(CancelledState {
                    submitted_at: record.submitted_at,
                    completed_at,
                })
            }
        };

        Ok(Self {
            id: record.id,
            company_id: record.company_id,
            created_by: record.created_by,
            amount: record.amount,
            currency: record.currency,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
            state,
        })
    }

    // Getter メソッド

    pub fn id(&self) -> &ExpenseId {
        &self.id
    }

    pub fn company_id(&self) -> &CompanyId {
        &self.company_id
    }

    pub fn created_by(&self) -> &UserId {
        &self.created_by
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn status(&self) -> ExpenseStatus {
        match &self.state {
            ExpenseState::Draft => ExpenseStatus::Draft,
            ExpenseState::Pending(_) => ExpenseStatus::Pending,
            ExpenseState::Approved(_) => ExpenseStatus::Approved,
            ExpenseState::Rejected(_) => ExpenseStatus::Rejected,
            ExpenseState::Cancelled(_) => ExpenseStatus::Cancelled,
        }
    }

    /// 現在の承認ステップを返す
    ///
    /// Pending では未判断の最小ステップ、Approved / Rejected では
    /// 最後に判断されたステップを返す。
    pub fn current_step(&self) -> Option<StepNumber> {
        match &self.state {
            ExpenseState::Pending(s) => Some(s.current_step),
            ExpenseState::Approved(s) => s.last_step,
            ExpenseState::Rejected(s) => Some(s.last_step),
            ExpenseState::Draft | ExpenseState::Cancelled(_) => None,
        }
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            ExpenseState::Draft => None,
            ExpenseState::Pending(s) => Some(s.submitted_at),
            ExpenseState::Approved(s) => Some(s.submitted_at),
            ExpenseState::Rejected(s) => Some(s.submitted_at),
            ExpenseState::Cancelled(s) => s.submitted_at,
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            ExpenseState::Approved(s) => Some(s.completed_at),
            ExpenseState::Rejected(s) => Some(s.completed_at),
            ExpenseState::Cancelled(s) => Some(s.completed_at),
            _ => None,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 状態への直接アクセス（パターンマッチ用）
    pub fn state(&self) -> &ExpenseState {
        &self.state
    }

    /// 終端状態（Approved / Rejected / Cancelled）か判定する
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            ExpenseState::Approved(_) | ExpenseState::Rejected(_) | ExpenseState::Cancelled(_)
        )
    }

    // ビジネスロジックメソッド
    //
    // すべての遷移メソッドは version をインクリメントし、
    // 楽観的ロック付き更新に対応する。

    /// 経費申請を承認チェーンの先頭ステップで申請状態に遷移させる
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: Draft 以外の状態で呼び出した場合
    pub fn submitted(self, first_step: StepNumber, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            ExpenseState::Draft => Ok(Self {
                state: ExpenseState::Pending(PendingState {
                    submitted_at: now,
                    current_step: first_step,
                }),
                version: self.version.next(),
                updated_at: now,
                ..self
            }),
            _ => Err(DomainError::Validation(
                "下書き状態の経費申請のみ申請できます".to_string(),
            )),
        }
    }

    /// 承認チェーンなしで自動承認する
    ///
    /// 承認者設定が存在しない、またはすべて解決不能だった場合の遷移。
    /// 承認レコードは作成されないため `last_step` は持たない。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: Draft 以外の状態で呼び出した場合
    pub fn auto_approved(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            ExpenseState::Draft => Ok(Self {
                state: ExpenseState::Approved(ApprovedState {
                    submitted_at: now,
                    completed_at: now,
                    last_step:    None,
                }),
                version: self.version.next(),
                updated_at: now,
                ..self
            }),
            _ => Err(DomainError::Validation(
                "下書き状態の経費申請のみ自動承認できます".to_string(),
            )),
        }
    }

    /// 次の承認ステップに遷移する
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: Pending 以外の状態、または現在より
    ///   小さいステップへの遷移
    pub fn advance_to_step(
        self,
        next_step: StepNumber,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        match self.state {
            ExpenseState::Pending(pending) => {
                if next_step <= pending.current_step {
                    return Err(DomainError::Validation(format!(
                        "ステップは昇順にのみ進められます（現在: {}, 指定: {}）",
                        pending.current_step, next_step
                    )));
                }
                Ok(Self {
                    state: ExpenseState::Pending(PendingState {
                        submitted_at: pending.submitted_at,
                        current_step: next_step,
                    }),
                    version: self.version.next(),
                    updated_at: now,
                    ..self
                })
            }
            _ => Err(DomainError::Validation(format!(
                "次ステップ遷移は承認待ち状態でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 承認による完了処理
    ///
    /// Pending 状態の経費申請を Approved に遷移させる。
    /// 条件ルールによる途中承認・最終ステップ承認のどちらもこの遷移を使う。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: Pending 以外の状態で呼び出した場合
    pub fn complete_with_approval(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            ExpenseState::Pending(pending) => Ok(Self {
                state: ExpenseState::Approved(ApprovedState {
                    submitted_at: pending.submitted_at,
                    completed_at: now,
                    last_step:    Some(pending.current_step),
                }),
                version: self.version.next(),
                updated_at: now,
                ..self
            }),
            _ => Err(DomainError::Validation(format!(
                "承認完了は承認待ち状態でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 却下による完了処理
    ///
    /// Pending 状態の経費申請を Rejected に遷移させる。
    /// 残りのステップや条件ルールに関わらず、却下は常に終端となる。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: Pending 以外の状態で呼び出した場合
    pub fn complete_with_rejection(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            ExpenseState::Pending(pending) => Ok(Self {
                state: ExpenseState::Rejected(RejectedState {
                    submitted_at: pending.submitted_at,
                    completed_at: now,
                    last_step:    pending.current_step,
                }),
                version: self.version.next(),
                updated_at: now,
                ..self
            }),
            _ => Err(DomainError::Validation(format!(
                "却下完了は承認待ち状態でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 経費申請を取り消した新しいインスタンスを返す
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 終端状態から呼び出した場合
    pub fn cancelled(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            ExpenseState::Draft => Ok(Self {
                state: ExpenseState::Cancelled(CancelledState {
                    submitted_at: None,
                    completed_at: now,
                }),
                version: self.version.next(),
                updated_at: now,
                ..self
            }),
            ExpenseState::Pending(pending) => Ok(Self {
                state: ExpenseState::Cancelled(CancelledState {
                    submitted_at: Some(pending.submitted_at),
                    completed_at: now,
                }),
                version: self.version.next(),
                updated_at: now,
                ..self
            }),
            ExpenseState::Approved(_) | ExpenseState::Rejected(_) | ExpenseState::Cancelled(_) => {
                Err(DomainError::Validation(
                    "完了済みの経費申請は取り消せません".to_string(),
                ))
            }
        }
    }
}
