//! # KeihiFlow インフラ層
//!
//! 外部システムとの接続・通信を担当するインフラストラクチャ層。
//!
//! ## 設計方針
//!
//! このクレートはリポジトリトレイトと、その PostgreSQL 実装を提供する。
//! 外部システムの詳細をカプセル化し、ドメイン層をインフラの変更から保護する。
//!
//! ## 責務
//!
//! - **データベース接続**: PostgreSQL への接続プール管理
//! - **トランザクション管理**: [`db::TxContext`] による構造的な
//!   トランザクション強制
//! - **リポジトリ実装**: エンティティの永続化と検索
//!
//! ## 依存関係
//!
//! ```text
//! approval-service → infra → domain → shared
//! ```
//!
//! ドメイン層はインフラ層に依存しない（依存性逆転の原則）。

pub mod db;
pub mod error;
pub mod repository;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use db::{PgTransactionManager, TransactionManager, TxContext};
pub use error::InfraError;
