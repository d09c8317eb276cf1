//! NotificationRepository: 通知レコードの永続化
//!
//! 承認フロー操作に伴って生成される通知レコードを管理する。
//! 書き込みは承認トランザクションのコミット後に行われる fire-and-forget
//! であり、失敗しても承認状態はロールバックされない。

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keihiflow_domain::{
    notification::{Notification, NotificationEventType, NotificationId},
    user::UserId,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::InfraError;

/// NotificationRepository トレイト
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// 通知レコードを作成する
    async fn insert(&self, notification: &Notification) -> Result<(), InfraError>;

    /// ユーザーの通知一覧を作成日時降順で取得する
    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Notification>, InfraError>;
}

/// DB の notifications テーブルの行を表す中間構造体
#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    event_type: String,
    title: String,
    message: String,
    link: Option<String>,
    read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = InfraError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification::from_db(
            NotificationId::from_uuid(row.id),
            UserId::from_uuid(row.user_id),
            NotificationEventType::from_str(&row.event_type)
                .map_err(|e| InfraError::unexpected(format!("不正なイベント種別: {}", e)))?,
            row.title,
            row.message,
            row.link,
            row.read,
            row.created_at,
        ))
    }
}

/// PostgreSQL 実装
pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(notification_id = %notification.id()))]
    async fn insert(&self, notification: &Notification) -> Result<(), InfraError> {
        let event_type: &str = notification.event_type().into();
        sqlx::query(
            "INSERT INTO notifications (\
                id, user_id, event_type, title, message, link, read, created_at\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(notification.id().as_uuid())
        .bind(notification.user_id().as_uuid())
        .bind(event_type)
        .bind(notification.title())
        .bind(notification.message())
        .bind(notification.link())
        .bind(notification.read())
        .bind(notification.created_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%user_id))]
    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Notification>, InfraError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            "SELECT id, user_id, event_type, title, message, link, read, created_at \
             FROM notifications \
             WHERE user_id = $1 \
             ORDER BY created_at DESC",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }
}
