//! # インフラ層エラー定義
//!
//! データベースとの通信で発生するエラーを表現する。
//!
//! ## 設計方針
//!
//! - **エラーの変換**: sqlx::Error を `#[from]` でラップ
//! - **ドメインエラーとの分離**: インフラ固有のエラーを明示
//! - **楽観的ロック**: バージョン不一致は `Conflict` として区別し、
//!   ユースケース層で 409 に変換できるようにする

use thiserror::Error;

/// インフラ層で発生するエラー
///
/// データベースクエリの実行失敗や楽観的ロックの競合を表現する。
/// サービス層でこのエラー種別に応じて適切な HTTP レスポンスに変換する。
#[derive(Debug, Error)]
pub enum InfraError {
    /// データベースエラー
    ///
    /// SQL クエリの実行失敗、接続エラー、制約違反など。
    #[error("データベースエラー: {0}")]
    Database(#[from] sqlx::Error),

    /// 楽観的ロック競合（バージョン不一致）
    ///
    /// UPDATE 時に期待したバージョンと DB 上のバージョンが一致しなかった場合。
    /// ユースケース層で適切なエラーメッセージに変換して返す。
    #[error("競合が発生しました: {entity}(id={id})")]
    Conflict {
        /// エンティティ名（例: "Expense"）
        entity: String,
        /// エンティティの ID
        id:     String,
    },

    /// 予期しないエラー
    ///
    /// 上記に分類できない予期しないエラー（不正な DB 値など）。
    #[error("予期しないエラー: {0}")]
    Unexpected(String),
}

impl InfraError {
    /// 楽観的ロック競合エラーを生成する
    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
            id:     id.into(),
        }
    }

    /// 予期しないエラーを生成する
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }

    /// 楽観的ロック競合か判定する
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_displayがconflictの情報を出力する() {
        let err = InfraError::conflict("Expense", "EXP-001");
        assert_eq!(format!("{err}"), "競合が発生しました: Expense(id=EXP-001)");
    }

    #[test]
    fn test_is_conflictはconflictでtrueを返す() {
        assert!(InfraError::conflict("Approval", "A-001").is_conflict());
        assert!(!InfraError::unexpected("test").is_conflict());
    }

    #[test]
    fn test_sqlx_errorからの変換() {
        let err: InfraError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, InfraError::Database(_)));
    }
}
