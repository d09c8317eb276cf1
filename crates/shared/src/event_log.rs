//! # ビジネスイベントログの構造化ヘルパー
//!
//! ログを `jq` で効率的に調査できるよう、ログフィールドの命名規約と
//! ヘルパーマクロを提供する。
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`event.action`）を使用。tracing の
//! `$($field:ident).+` パターンでサポートされ、JSON 出力でフラットなキーになる。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` マーカーを自動付与し、
/// `tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: イベントカテゴリ（[`event::category`] の定数を使用）
/// - `event.action`: アクション名（[`event::action`] の定数を使用）
/// - `event.company_id`: 会社 ID
/// - `event.result`: 結果（[`event::result`] の定数を使用）
///
/// ## 推奨フィールド
///
/// - `event.entity_type`: エンティティ種別（[`event::entity_type`] の定数を使用）
/// - `event.entity_id`: エンティティ ID
/// - `event.actor_id`: 操作者 ID
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const EXPENSE: &str = "expense";
        pub const APPROVAL: &str = "approval";
        pub const NOTIFICATION: &str = "notification";
    }

    /// イベントアクション
    pub mod action {
        // 経費申請
        pub const EXPENSE_SUBMITTED: &str = "expense.submitted";
        pub const EXPENSE_AUTO_APPROVED: &str = "expense.auto_approved";
        pub const EXPENSE_APPROVED: &str = "expense.approved";
        pub const EXPENSE_REJECTED: &str = "expense.rejected";
        pub const EXPENSE_CANCELLED: &str = "expense.cancelled";

        // 承認
        pub const APPROVAL_APPROVED: &str = "approval.approved";
        pub const APPROVAL_REJECTED: &str = "approval.rejected";

        // 通知
        pub const NOTIFICATION_CREATED: &str = "notification.created";
        pub const NOTIFICATION_FAILED: &str = "notification.failed";
    }

    /// エンティティ種別
    pub mod entity_type {
        pub const EXPENSE: &str = "expense";
        pub const APPROVAL: &str = "approval";
        pub const NOTIFICATION: &str = "notification";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}
