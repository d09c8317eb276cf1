//! # 通知
//!
//! 承認フロー操作に伴う通知イベントと、永続化される通知レコードを定義する。
//!
//! ## 設計方針
//!
//! - **enum による通知イベント**: 各バリアントがエンジンの通知イベントに対応
//! - **fire-and-forget**: 通知の失敗は承認フロー操作に影響しない
//! - **配信は外部**: エンジンは通知レコードを生成するのみで、
//!   実際の配信（メール等）は外部コラボレータの責務

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{approval::Decision, expense::ExpenseId, user::UserId, value_objects::CurrencyCode};

define_uuid_id! {
    /// 通知レコード ID
    pub struct NotificationId;
}

/// 通知イベント種別
///
/// notifications テーブルの `event_type` カラムに格納される値。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum NotificationEventType {
    /// 承認依頼: 承認ステップが承認者に回ってきたとき → 承認者に送信
    ApprovalRequested,
    /// 判断結果: 経費申請が承認または却下されたとき → 申請者と管理者に送信
    DecisionMade,
}

/// 判断結果通知の宛先種別
///
/// 申請者本人と管理者では通知文面が異なる。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionAudience {
    /// 申請者本人
    Requester,
    /// 会社の管理者
    Admin,
}

/// 経費承認フローの通知イベント
///
/// 承認チェーンの状態変化ごとに生成され、NotificationService が
/// 通知レコードとして永続化する。
#[derive(Debug, Clone)]
pub enum ExpenseNotification {
    /// 承認依頼: 承認者に新しい承認タスクが割り当てられた
    ApprovalRequested {
        expense_id:     ExpenseId,
        approver_id:    UserId,
        requester_name: String,
        amount:         Decimal,
        currency:       CurrencyCode,
    },
    /// 判断結果: 経費申請が承認または却下された
    DecisionMade {
        expense_id:     ExpenseId,
        recipient_id:   UserId,
        audience:       DecisionAudience,
        requester_name: String,
        amount:         Decimal,
        currency:       CurrencyCode,
        decision:       Decision,
        /// 条件ルールまたは空チェーンによる自動承認なら true
        auto:           bool,
    },
}

impl ExpenseNotification {
    /// 通知イベント種別を返す
    pub fn event_type(&self) -> NotificationEventType {
        match self {
            Self::ApprovalRequested { .. } => NotificationEventType::ApprovalRequested,
            Self::DecisionMade { .. } => NotificationEventType::DecisionMade,
        }
    }

    /// 受信者のユーザー ID を返す
    pub fn recipient_user_id(&self) -> &UserId {
        match self {
            Self::ApprovalRequested { approver_id, .. } => approver_id,
            Self::DecisionMade { recipient_id, .. } => recipient_id,
        }
    }

    /// 通知タイトルを返す
    pub fn title(&self) -> &'static str {
        match self {
            Self::ApprovalRequested { .. } => "新しい経費承認依頼",
            Self::DecisionMade { .. } => "経費申請ステータス更新",
        }
    }

    /// 通知本文を組み立てる
    pub fn message(&self) -> String {
        match self {
            Self::ApprovalRequested {
                requester_name,
                amount,
                currency,
                ..
            } => format!(
                "{} さんが {} {} の経費を申請しました",
                requester_name, amount, currency
            ),
            Self::DecisionMade {
                audience,
                requester_name,
                amount,
                currency,
                decision,
                auto,
                ..
            } => {
                let result = match decision {
                    Decision::Approved => "承認",
                    Decision::Rejected => "却下",
                };
                let mut message = match audience {
                    DecisionAudience::Requester => format!(
                        "あなたの経費申請（{} {}）が{}されました",
                        amount, currency, result
                    ),
                    DecisionAudience::Admin => format!(
                        "{} さんの経費申請（{} {}）が{}されました",
                        requester_name, amount, currency, result
                    ),
                };
                if *auto {
                    message.push_str("（条件ルールにより自動承認）");
                }
                message
            }
        }
    }

    /// 通知リンク（フロントエンドの経費詳細ページ）を返す
    pub fn link(&self) -> String {
        let expense_id = match self {
            Self::ApprovalRequested { expense_id, .. } => expense_id,
            Self::DecisionMade { expense_id, .. } => expense_id,
        };
        format!("/expenses/{}", expense_id)
    }
}

/// 通知レコードエンティティ
///
/// ユーザーごとに永続化される通知。`read` は受信者側の既読管理用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    id: NotificationId,
    user_id: UserId,
    event_type: NotificationEventType,
    title: String,
    message: String,
    link: Option<String>,
    read: bool,
    created_at: DateTime<Utc>,
}

/// 通知レコードの新規作成パラメータ
pub struct NewNotification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub event_type: NotificationEventType,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub now: DateTime<Utc>,
}

impl Notification {
    /// 新しい通知レコードを未読状態で作成する
    pub fn new(params: NewNotification) -> Self {
        Self {
            id: params.id,
            user_id: params.user_id,
            event_type: params.event_type,
            title: params.title,
            message: params.message,
            link: params.link,
            read: false,
            created_at: params.now,
        }
    }

    /// 通知イベントから通知レコードを組み立てる
    pub fn from_event(event: &ExpenseNotification, now: DateTime<Utc>) -> Self {
        Self::new(NewNotification {
            id: NotificationId::new(),
            user_id: event.recipient_user_id().clone(),
            event_type: event.event_type(),
            title: event.title().to_string(),
            message: event.message(),
            link: Some(event.link()),
            now,
        })
    }

    /// 既存のデータから復元する
    #[allow(clippy::too_many_arguments)]
    pub fn from_db(
        id: NotificationId,
        user_id: UserId,
        event_type: NotificationEventType,
        title: String,
        message: String,
        link: Option<String>,
        read: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            event_type,
            title,
            message,
            link,
            read,
            created_at,
        }
    }

    pub fn id(&self) -> &NotificationId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn event_type(&self) -> NotificationEventType {
        self.event_type
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub fn read(&self) -> bool {
        self.read
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
