//! # Approval Service サーバー
//!
//! 経費承認チェーンエンジンを実行する内部サービス。
//!
//! ## 役割
//!
//! - **承認チェーンの構築**: 申請時に会社の承認者設定から承認レコードを解決・作成
//! - **判断処理**: 承認/却下の記録、条件ルール評価、チェーンの前進と確定
//! - **通知レコードの生成**: 状態変化ごとに通知レコードを永続化（配信は外部）
//!
//! ## アクセス制御
//!
//! Approval Service は内部ネットワークからのみアクセス可能とする。
//! 外部からのリクエストは BFF を経由する必要がある。
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `APPROVAL_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `APPROVAL_PORT` | **Yes** | ポート番号 |
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `LOG_FORMAT` | No | `json` または `pretty`（デフォルト: `pretty`） |
//!
//! ## 起動方法
//!
//! ```bash
//! # 開発環境
//! cargo run -p keihiflow-approval-service
//!
//! # 本番環境
//! APPROVAL_PORT=3001 DATABASE_URL=postgres://... \
//!     cargo run -p keihiflow-approval-service --release
//! ```

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use keihiflow_approval_service::{
    config::ApprovalConfig,
    handler::{
        ExpenseState,
        cancel_expense,
        create_expense,
        health_check,
        list_expense_approvals,
        list_notifications,
        list_pending_approvals,
        record_decision,
        submit_expense,
    },
    usecase::{ExpenseUseCaseImpl, NotificationService},
};
use keihiflow_domain::clock::{Clock, SystemClock};
use keihiflow_infra::{
    PgTransactionManager,
    db,
    repository::{
        PostgresApprovalRepository,
        PostgresApprovalRuleRepository,
        PostgresApproverAssignmentRepository,
        PostgresExpenseRepository,
        PostgresNotificationRepository,
        PostgresUserRepository,
    },
};
use keihiflow_shared::observability::{self, TracingConfig};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Approval Service サーバーのエントリーポイント
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    // トレーシング初期化
    observability::init(&TracingConfig::from_env("approval-service"));

    // 設定読み込み
    let config = ApprovalConfig::from_env().expect("設定の読み込みに失敗しました");

    tracing::info!(
        "Approval Service サーバーを起動します: {}:{}",
        config.host,
        config.port
    );

    // データベース接続プールを作成
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("データベース接続に失敗しました");
    tracing::info!("データベースに接続しました");

    // マイグレーションを適用
    db::run_migrations(&pool)
        .await
        .expect("マイグレーションの適用に失敗しました");

    // 依存コンポーネントを初期化
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notification_service = Arc::new(NotificationService::new(
        Arc::new(PostgresNotificationRepository::new(pool.clone())),
        Arc::new(PostgresUserRepository::new(pool.clone())),
        clock.clone(),
    ));
    let usecase = ExpenseUseCaseImpl::new(
        Arc::new(PostgresExpenseRepository::new(pool.clone())),
        Arc::new(PostgresApprovalRepository::new(pool.clone())),
        Arc::new(PostgresApproverAssignmentRepository::new(pool.clone())),
        Arc::new(PostgresApprovalRuleRepository::new(pool.clone())),
        Arc::new(PostgresUserRepository::new(pool.clone())),
        notification_service,
        clock,
        Arc::new(PgTransactionManager::new(pool.clone())),
    );
    let expense_state = Arc::new(ExpenseState { usecase });

    // ルーター構築
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/internal/expenses", post(create_expense))
        .route("/internal/expenses/{id}/submit", post(submit_expense))
        .route("/internal/expenses/{id}/cancel", post(cancel_expense))
        .route(
            "/internal/expenses/{id}/approvals",
            get(list_expense_approvals),
        )
        .route("/internal/approvals/pending", get(list_pending_approvals))
        .route("/internal/approvals/{id}/decision", post(record_decision))
        .route("/internal/notifications", get(list_notifications))
        .with_state(expense_state)
        .layer(TraceLayer::new_for_http());

    // サーバー起動
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("アドレスのパースに失敗しました");

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Approval Service サーバーが起動しました: {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
