//! # 通知サービス
//!
//! 承認フローの状態変化を通知レコードとして永続化するサービス。
//!
//! ## 設計方針
//!
//! - **fire-and-forget**: 通知の失敗はエラーを返さない。コミット済みの
//!   承認状態遷移をロールバックさせないため、ログ出力のみで握りつぶす
//! - **コミット後に実行**: 承認トランザクションのコミット後にのみ呼ばれる
//! - **宛先の組み立て**: 判断結果は申請者と会社の管理者に配信し、
//!   申請者自身が管理者の場合は重複させない

use std::sync::Arc;

use keihiflow_domain::{
    approval::Decision,
    clock::Clock,
    expense::Expense,
    notification::{DecisionAudience, ExpenseNotification, Notification},
    user::{User, UserId, UserRole},
};
use keihiflow_infra::repository::{NotificationRepository, UserRepository};
use keihiflow_shared::{event_log::event, log_business_event};

/// 通知サービス
///
/// 承認フロー操作に伴う通知レコード生成の全体フローを統合する。
/// すべてのメソッドは fire-and-forget で、失敗してもエラーを返さない。
pub struct NotificationService {
    notification_repo: Arc<dyn NotificationRepository>,
    user_repo: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    pub fn new(
        notification_repo: Arc<dyn NotificationRepository>,
        user_repo: Arc<dyn UserRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            notification_repo,
            user_repo,
            clock,
        }
    }

    /// 承認依頼通知を作成する（fire-and-forget）
    ///
    /// 承認ステップが回ってきた承認者に通知する。
    pub async fn notify_approval_requested(&self, expense: &Expense, approver_id: &UserId) {
        let Some(requester) = self.fetch_requester(expense).await else {
            return;
        };

        self.store(ExpenseNotification::ApprovalRequested {
            expense_id:     expense.id().clone(),
            approver_id:    approver_id.clone(),
            requester_name: requester.name().as_str().to_string(),
            amount:         expense.amount(),
            currency:       expense.currency().clone(),
        })
        .await;
    }

    /// 判断結果通知を作成する（fire-and-forget）
    ///
    /// 申請者本人と、会社のアクティブな管理者全員に通知する。
    /// 申請者自身が管理者の場合、管理者向け通知は作成しない。
    pub async fn notify_decision(&self, expense: &Expense, decision: Decision, auto: bool) {
        let Some(requester) = self.fetch_requester(expense).await else {
            return;
        };
        let requester_name = requester.name().as_str().to_string();

        // 申請者本人への通知
        self.store(ExpenseNotification::DecisionMade {
            expense_id: expense.id().clone(),
            recipient_id: expense.created_by().clone(),
            audience: DecisionAudience::Requester,
            requester_name: requester_name.clone(),
            amount: expense.amount(),
            currency: expense.currency().clone(),
            decision,
            auto,
        })
        .await;

        // 会社の管理者への通知（申請者本人を除く）
        let admins = match self
            .user_repo
            .find_active_by_role(expense.company_id(), UserRole::Admin)
            .await
        {
            Ok(admins) => admins,
            Err(e) => {
                tracing::error!(error = %e, "通知用の管理者一覧の取得に失敗");
                return;
            }
        };

        for admin in admins {
            if admin.id() == expense.created_by() {
                continue;
            }
            self.store(ExpenseNotification::DecisionMade {
                expense_id: expense.id().clone(),
                recipient_id: admin.id().clone(),
                audience: DecisionAudience::Admin,
                requester_name: requester_name.clone(),
                amount: expense.amount(),
                currency: expense.currency().clone(),
                decision,
                auto,
            })
            .await;
        }
    }

    /// ユーザーの通知一覧を作成日時降順で取得する
    pub async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Notification>, keihiflow_infra::InfraError> {
        self.notification_repo.find_by_user(user_id).await
    }

    /// 申請者を取得する
    ///
    /// 取得できない場合はログを出力して None を返す（通知は諦める）。
    async fn fetch_requester(&self, expense: &Expense) -> Option<User> {
        match self.user_repo.find_by_id(expense.created_by()).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                tracing::error!(
                    expense_id = %expense.id(),
                    "通知用の申請者が見つかりません"
                );
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "通知用の申請者の取得に失敗");
                None
            }
        }
    }

    /// 通知イベントをレコードとして保存する
    ///
    /// 保存の失敗はログ出力のみで握りつぶす。
    async fn store(&self, notification_event: ExpenseNotification) {
        let event_type: &str = notification_event.event_type().into();
        let recipient = notification_event.recipient_user_id().clone();
        let notification = Notification::from_event(&notification_event, self.clock.now());

        match self.notification_repo.insert(&notification).await {
            Ok(()) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_CREATED,
                    event.entity_type = event::entity_type::NOTIFICATION,
                    event.entity_id = %notification.id(),
                    event.result = event::result::SUCCESS,
                    notification.event_type = event_type,
                    notification.recipient = %recipient,
                    "通知レコードを作成しました"
                );
            }
            Err(e) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_FAILED,
                    event.entity_type = event::entity_type::NOTIFICATION,
                    event.result = event::result::FAILURE,
                    notification.event_type = event_type,
                    notification.recipient = %recipient,
                    error = %e,
                    "通知レコードの作成に失敗しました"
                );
            }
        }
    }
}
