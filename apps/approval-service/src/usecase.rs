//! # ユースケース層
//!
//! 承認エンジンのビジネスロジックを実装する。
//!
//! - [`expense`] - 承認チェーンの構築・判断処理・照会
//! - [`notification`] - fire-and-forget の通知サービス
//! - [`helpers`] - リポジトリ呼び出し結果の変換など共通ヘルパー

pub mod expense;
pub mod helpers;
pub mod notification;

pub use expense::{
    CreateExpenseInput,
    DecisionOutcome,
    ExpenseUseCaseImpl,
    RecordDecisionInput,
    SubmitOutcome,
};
pub use notification::NotificationService;
