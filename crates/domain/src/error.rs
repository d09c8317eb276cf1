//! # ドメイン層エラー定義
//!
//! ビジネスルール違反やドメイン固有の例外状態を表現するエラー型。
//!
//! ## エラーの種類と HTTP ステータスの対応
//!
//! | エラー種別 | HTTP ステータス | 用途 |
//! |-----------|----------------|------|
//! | `Validation` | 400 Bad Request | 入力値の検証失敗、不正な状態遷移 |
//! | `NotFound` | 404 Not Found | エンティティが存在しない |
//! | `Conflict` | 409 Conflict | 判断済み承認への再判断、楽観的ロックの失敗 |
//! | `Forbidden` | 403 Forbidden | 権限不足 |

use thiserror::Error;

/// ドメイン層で発生するエラー
///
/// ビジネスロジックの実行中に発生する例外状態を表現する。
/// サービス層でこのエラーを受け取り、適切な HTTP レスポンスに変換する。
#[derive(Debug, Error)]
pub enum DomainError {
    /// バリデーションエラー
    ///
    /// 入力値または状態遷移がビジネスルールに違反している場合に使用する。
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// エンティティが見つからない
    ///
    /// 指定された ID のエンティティが存在しない場合に使用する。
    #[error("{entity_type} が見つかりません: {id}")]
    NotFound {
        /// エンティティの種類（"Expense", "Approval" など）
        entity_type: &'static str,
        /// 検索に使用した識別子
        id:          String,
    },

    /// 競合エラー
    ///
    /// 判断済みの承認への再判断や、楽観的ロックの失敗時に使用する。
    /// クライアントは最新データを再取得してから再試行する必要がある。
    #[error("競合が発生しました: {0}")]
    Conflict(String),

    /// 権限エラー
    ///
    /// ユーザーに操作の実行権限がない場合に使用する。
    #[error("権限がありません: {0}")]
    Forbidden(String),
}
