//! # 会社
//!
//! マルチテナント構成におけるテナント（会社）のモデル。
//!
//! ## マルチテナントとは
//!
//! 単一のアプリケーションインスタンスで複数の会社にサービスを提供する
//! アーキテクチャ。各会社のデータは論理的に分離され、他の会社からは
//! アクセスできない。
//!
//! ## 設計判断
//!
//! `CompanyId` は `Uuid` をラップした Newtype である。これにより:
//!
//! - 型安全性: `CompanyId` と `UserId` など、同じ UUID でも異なる型として扱える
//! - コンパイル時検証: 引数の取り違えをコンパイラが検出
//! - ゼロコスト: 実行時のオーバーヘッドなし
//!
//! UUID v7 はタイムスタンプベースのため生成順にソート可能で、
//! 中央の発番機なしに分散生成できる。

use chrono::{DateTime, Utc};

use crate::value_objects::{CompanyName, CurrencyCode};

define_uuid_id! {
    /// 会社（テナント）の一意識別子
    ///
    /// すべてのビジネスエンティティ（Expense, Approval, ApprovalRule など）は
    /// この `CompanyId` を持ち、会社間のデータ分離を保証する。
    pub struct CompanyId;
}

/// 会社エンティティ
///
/// マルチテナント環境における顧客企業を表現する。
/// 承認エンジンは会社を読み取り専用の設定単位として扱う。
///
/// # 不変条件
///
/// - `id` はシステム内で一意
/// - `name` はシステム内で一意
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    id: CompanyId,
    name: CompanyName,
    default_currency: CurrencyCode,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Company {
    /// 新しい会社を作成する
    pub fn new(
        id: CompanyId,
        name: CompanyName,
        default_currency: CurrencyCode,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            default_currency,
            created_at: now,
            updated_at: now,
        }
    }

    /// 既存のデータから会社を復元する（データベースから取得時）
    pub fn from_db(
        id: CompanyId,
        name: CompanyName,
        default_currency: CurrencyCode,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            default_currency,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &CompanyId {
        &self.id
    }

    pub fn name(&self) -> &CompanyName {
        &self.name
    }

    pub fn default_currency(&self) -> &CurrencyCode {
        &self.default_currency
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
