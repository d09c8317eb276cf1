//! # Approval Service エラー定義
//!
//! 承認エンジン固有のエラーと、HTTP レスポンスへの変換を定義する。
//!
//! ## エラー分類
//!
//! | 変種 | HTTP | 意味 |
//! |------|------|------|
//! | `BadRequest` | 400 | 不正な入力・不正な状態遷移（非 Draft への申請、不正な判断値） |
//! | `Forbidden` | 403 | 担当外の承認者による判断 |
//! | `NotFound` | 404 | 経費申請・承認レコードが存在しない |
//! | `Conflict` | 409 | 判断済み承認への再判断、楽観的ロックの失敗 |
//! | `ChainCreation` | 500 | チェーン作成トランザクションの失敗（全体ロールバック済み） |
//! | `Internal` | 500 | その他の内部エラー |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use keihiflow_infra::InfraError;
use serde::Serialize;
use thiserror::Error;

/// エラーレスポンス（RFC 7807 Problem Details）
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub error_type: String,
    pub title:      String,
    pub status:     u16,
    pub detail:     String,
}

/// Approval Service で発生するエラー
#[derive(Debug, Error)]
pub enum CoreError {
    /// リソースが見つからない
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),

    /// 権限不足
    #[error("権限がありません: {0}")]
    Forbidden(String),

    /// 競合（判断済み承認・楽観的ロック失敗）
    #[error("競合が発生しました: {0}")]
    Conflict(String),

    /// 承認チェーン作成の失敗
    ///
    /// 申請トランザクション全体はロールバック済み。
    /// 呼び出し側は申請をまるごと再試行する必要がある。
    #[error("承認チェーンの作成に失敗しました: {0}")]
    ChainCreation(#[source] InfraError),

    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let (status, error_type, title, detail) = match &self {
            CoreError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "https://keihiflow.example.com/errors/not-found",
                "Not Found",
                msg.clone(),
            ),
            CoreError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "https://keihiflow.example.com/errors/bad-request",
                "Bad Request",
                msg.clone(),
            ),
            CoreError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                "https://keihiflow.example.com/errors/forbidden",
                "Forbidden",
                msg.clone(),
            ),
            CoreError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "https://keihiflow.example.com/errors/conflict",
                "Conflict",
                msg.clone(),
            ),
            CoreError::ChainCreation(e) => {
                tracing::error!("承認チェーンの作成に失敗: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "https://keihiflow.example.com/errors/chain-creation-failed",
                    "Internal Server Error",
                    "承認チェーンの作成に失敗しました。申請を再試行してください".to_string(),
                )
            }
            CoreError::Internal(msg) => {
                tracing::error!("内部エラー: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "https://keihiflow.example.com/errors/internal-error",
                    "Internal Server Error",
                    "内部エラーが発生しました".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error_type: error_type.to_string(),
                title: title.to_string(),
                status: status.as_u16(),
                detail,
            }),
        )
            .into_response()
    }
}
