//! 承認者の判断処理（承認・却下）とチェーンの前進
//!
//! Pending → 判断済みの遷移は compare-and-set:
//! 同期的な事前チェック（未判断であること）に加え、書き込み時の
//! version check で並行判断の一方を必ず競合として失敗させる。

use std::collections::HashMap;

use keihiflow_domain::{
    approval::{Approval, ApprovalId, Decision},
    company::CompanyId,
    expense::ExpenseStatus,
    rule::any_rule_satisfied,
    user::{UserId, UserRole},
};
use keihiflow_shared::{event_log::event, log_business_event};

use crate::{
    error::CoreError,
    usecase::{
        expense::{DecisionOutcome, ExpenseUseCaseImpl, RecordDecisionInput},
        helpers::{FindResultExt, check_approval_assigned_to, map_domain_error},
    },
};

impl ExpenseUseCaseImpl {
    /// 承認者の判断（承認・却下）を記録し、チェーンを前進または確定させる
    ///
    /// ## 状態遷移
    ///
    /// | 判断 | 条件 | 次の状態 |
    /// |------|------|---------|
    /// | 却下 | — | Rejected（残りステップに関わらず終端） |
    /// | 承認 | 条件ルールが成立 | Approved（自動承認） |
    /// | 承認 | 次のステップが存在 | Pending（ステップ前進、次の承認者に通知） |
    /// | 承認 | 次のステップなし | Approved |
    ///
    /// ステップ前進は承認レコードのステップ昇順で行い、承認者設定からは
    /// 再計算しない（承認レコードが解決済みチェーンの正となる）。
    ///
    /// ## エラー
    ///
    /// - 承認・経費申請が見つからない場合: 404
    /// - 担当外の承認者による判断: 403
    /// - 判断済みの承認への再判断・確定済み経費への判断: 409
    /// - 書き込み時の version 不一致（並行判断の敗者）: 409
    pub async fn record_decision(
        &self,
        approval_id: ApprovalId,
        company_id: CompanyId,
        user_id: UserId,
        input: RecordDecisionInput,
    ) -> Result<DecisionOutcome, CoreError> {
        // 1. 承認レコードを取得
        let approval = self
            .approval_repo
            .find_by_id(&approval_id)
            .await
            .or_not_found("承認")?;
        let expense_id = approval.expense_id().clone();

        // 2. 経費申請を取得（会社スコープの検証を兼ねる）
        let expense = self
            .expense_repo
            .find_by_id(&expense_id, &company_id)
            .await
            .or_not_found("経費申請")?;

        // 3. 権限チェック
        check_approval_assigned_to(&approval, &user_id)?;

        // 4. 未判断であるか確認（早期フェイル。書き込み時の version check が最終防衛線）
        if !approval.is_pending() {
            return Err(CoreError::Conflict(
                "この承認は既に判断済みです。最新の情報を取得してください。".to_string(),
            ));
        }

        // 5. 経費申請が承認待ちであるか確認（確定後の判断を拒否）
        if expense.status() != ExpenseStatus::Pending {
            return Err(CoreError::Conflict(format!(
                "経費申請は既に確定しています（現在: {}）",
                expense.status()
            )));
        }

        let now = self.clock.now();
        let approval_expected = approval.version();
        let expense_expected = expense.version();

        match input.decision {
            Decision::Rejected => {
                // 却下は残りステップ・条件ルールに関わらず常に終端
                let decided = approval
                    .reject(input.comments, now)
                    .map_err(map_domain_error)?;
                let rejected = expense
                    .complete_with_rejection(now)
                    .map_err(map_domain_error)?;

                let mut tx = self.begin_tx().await?;
                self.save_approval(&mut tx, &decided, approval_expected)
                    .await?;
                self.save_expense(&mut tx, &rejected, expense_expected)
                    .await?;
                self.commit_tx(tx).await?;

                log_business_event!(
                    event.category = event::category::APPROVAL,
                    event.action = event::action::APPROVAL_REJECTED,
                    event.entity_type = event::entity_type::APPROVAL,
                    event.entity_id = %approval_id,
                    event.company_id = %company_id,
                    event.actor_id = %user_id,
                    event.result = event::result::SUCCESS,
                    "経費申請を却下しました"
                );

                self.notification_service
                    .notify_decision(&rejected, Decision::Rejected, false)
                    .await;

                Ok(DecisionOutcome {
                    expense_status:   ExpenseStatus::Rejected,
                    next_approver_id: None,
                })
            }
            Decision::Approved => {
                let decided = approval
                    .approve(input.comments, now)
                    .map_err(map_domain_error)?;

                // 今回の判断を反映した承認チェーンで条件ルールを評価する
                let mut approvals = self.fetch_expense_approvals(&expense_id).await?;
                if let Some(pos) = approvals.iter().position(|a| a.id() == decided.id()) {
                    approvals[pos] = decided.clone();
                }

                log_business_event!(
                    event.category = event::category::APPROVAL,
                    event.action = event::action::APPROVAL_APPROVED,
                    event.entity_type = event::entity_type::APPROVAL,
                    event.entity_id = %approval_id,
                    event.company_id = %company_id,
                    event.actor_id = %user_id,
                    event.result = event::result::SUCCESS,
                    "承認ステップを承認しました"
                );

                // 条件ルールが成立していればチェーンをショートサーキットする
                if self
                    .conditional_rules_satisfied(&company_id, &approvals)
                    .await?
                {
                    let approved = expense
                        .complete_with_approval(now)
                        .map_err(map_domain_error)?;

                    let mut tx = self.begin_tx().await?;
                    self.save_approval(&mut tx, &decided, approval_expected)
                        .await?;
                    self.save_expense(&mut tx, &approved, expense_expected)
                        .await?;
                    self.commit_tx(tx).await?;

                    self.notification_service
                        .notify_decision(&approved, Decision::Approved, true)
                        .await;

                    return Ok(DecisionOutcome {
                        expense_status:   ExpenseStatus::Approved,
                        next_approver_id: None,
                    });
                }

                // ステップ昇順で次の承認レコードへ前進する（設定からは再計算しない）
                let next_approval = approvals
                    .iter()
                    .filter(|a| a.step() > decided.step())
                    .min_by_key(|a| a.step())
                    .cloned();

                if let Some(next_approval) = next_approval {
                    let advanced = expense
                        .advance_to_step(next_approval.step(), now)
                        .map_err(map_domain_error)?;

                    let mut tx = self.begin_tx().await?;
                    self.save_approval(&mut tx, &decided, approval_expected)
                        .await?;
                    self.save_expense(&mut tx, &advanced, expense_expected)
                        .await?;
                    self.commit_tx(tx).await?;

                    self.notification_service
                        .notify_approval_requested(&advanced, next_approval.approver_id())
                        .await;

                    Ok(DecisionOutcome {
                        expense_status:   ExpenseStatus::Pending,
                        next_approver_id: Some(next_approval.approver_id().clone()),
                    })
                } else {
                    // 最終ステップ承認で完了
                    let approved = expense
                        .complete_with_approval(now)
                        .map_err(map_domain_error)?;

                    let mut tx = self.begin_tx().await?;
                    self.save_approval(&mut tx, &decided, approval_expected)
                        .await?;
                    self.save_expense(&mut tx, &approved, expense_expected)
                        .await?;
                    self.commit_tx(tx).await?;

                    self.notification_service
                        .notify_decision(&approved, Decision::Approved, false)
                        .await;

                    Ok(DecisionOutcome {
                        expense_status:   ExpenseStatus::Approved,
                        next_approver_id: None,
                    })
                }
            }
        }
    }

    /// 会社の有効な条件ルールのいずれかが成立しているか評価する
    ///
    /// ロール指定ルールの評価に備えて、承認者 ID からロールへの
    /// 対応表を構築してから純粋評価関数に委譲する。
    async fn conditional_rules_satisfied(
        &self,
        company_id: &CompanyId,
        approvals: &[Approval],
    ) -> Result<bool, CoreError> {
        let rules = self
            .rule_repo
            .find_enabled_by_company(company_id)
            .await
            .map_err(|e| CoreError::Internal(format!("承認ルールの取得に失敗: {}", e)))?;

        if rules.is_empty() {
            return Ok(false);
        }

        let approver_ids: Vec<UserId> =
            approvals.iter().map(|a| a.approver_id().clone()).collect();
        let users = self
            .user_repo
            .find_by_ids(&approver_ids)
            .await
            .map_err(|e| CoreError::Internal(format!("承認者の取得に失敗: {}", e)))?;
        let approver_roles: HashMap<UserId, UserRole> = users
            .into_iter()
            .map(|user| (user.id().clone(), user.role()))
            .collect();

        Ok(any_rule_satisfied(&rules, approvals, &approver_roles))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use keihiflow_domain::{
        approval::{Approval, ApprovalDecision, Decision},
        company::CompanyId,
        expense::{Expense, ExpenseStatus},
        notification::NotificationEventType,
        rule::{
            ApprovalRule,
            ApprovalRuleId,
            PercentageThreshold,
            RuleType,
            SpecificApprover,
        },
        user::{User, UserId, UserRole},
        value_objects::StepNumber,
    };
    use keihiflow_infra::{
        mock::{
            MockApprovalRepository,
            MockApprovalRuleRepository,
            MockApproverAssignmentRepository,
            MockExpenseRepository,
            MockNotificationRepository,
            MockUserRepository,
        },
        repository::{ApprovalRepository, ExpenseRepository, NotificationRepository},
    };
    use pretty_assertions::assert_eq;

    use super::super::test_helpers::{
        build_sut,
        make_draft_expense,
        make_user,
        user_assignment,
    };
    use crate::{
        error::CoreError,
        usecase::expense::{DecisionOutcome, ExpenseUseCaseImpl, RecordDecisionInput},
    };

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn approve_input() -> RecordDecisionInput {
        RecordDecisionInput {
            decision: Decision::Approved,
            comments: Some("問題ありません".to_string()),
        }
    }

    fn reject_input() -> RecordDecisionInput {
        RecordDecisionInput {
            decision: Decision::Rejected,
            comments: Some("却下します".to_string()),
        }
    }

    struct Mocks {
        expense_repo: MockExpenseRepository,
        approval_repo: MockApprovalRepository,
        assignment_repo: MockApproverAssignmentRepository,
        rule_repo: MockApprovalRuleRepository,
        user_repo: MockUserRepository,
        notification_repo: MockNotificationRepository,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                expense_repo: MockExpenseRepository::new(),
                approval_repo: MockApprovalRepository::new(),
                assignment_repo: MockApproverAssignmentRepository::new(),
                rule_repo: MockApprovalRuleRepository::new(),
                user_repo: MockUserRepository::new(),
                notification_repo: MockNotificationRepository::new(),
            }
        }

        fn build(&self) -> ExpenseUseCaseImpl {
            build_sut(
                &self.expense_repo,
                &self.approval_repo,
                &self.assignment_repo,
                &self.rule_repo,
                &self.user_repo,
                &self.notification_repo,
                now(),
            )
        }

        /// 指定した承認者列で申請済みの経費とチェーンをセットアップする
        ///
        /// 戻り値: (sut, 申請済み経費, ステップ昇順の承認レコード)
        async fn setup_chain(
            &self,
            company_id: &CompanyId,
            submitter: &User,
            approvers: &[(i32, &User)],
        ) -> (ExpenseUseCaseImpl, Expense, Vec<Approval>) {
            self.user_repo.add_user(submitter.clone());
            for (sequence, approver) in approvers {
                self.user_repo.add_user((*approver).clone());
                self.assignment_repo.add_assignment(user_assignment(
                    company_id,
                    *sequence,
                    approver.id(),
                    now(),
                ));
            }

            let expense = make_draft_expense(company_id, submitter.id(), now());
            self.expense_repo.insert(&expense).await.unwrap();

            let sut = self.build();
            sut.submit_expense(expense.id().clone(), company_id.clone())
                .await
                .unwrap();

            let submitted = self
                .expense_repo
                .find_by_id(expense.id(), company_id)
                .await
                .unwrap()
                .unwrap();
            let approvals = self
                .approval_repo
                .find_by_expense(expense.id())
                .await
                .unwrap();

            (sut, submitted, approvals)
        }
    }

    fn percentage_rule(company_id: &CompanyId, threshold: i32) -> ApprovalRule {
        ApprovalRule::new(
            ApprovalRuleId::new(),
            company_id.clone(),
            RuleType::Percentage,
            Some(PercentageThreshold::new(threshold).unwrap()),
            None,
            true,
            now(),
        )
        .unwrap()
    }

    fn specific_user_rule(company_id: &CompanyId, user_id: &UserId) -> ApprovalRule {
        ApprovalRule::new(
            ApprovalRuleId::new(),
            company_id.clone(),
            RuleType::Specific,
            None,
            Some(SpecificApprover::User(user_id.clone())),
            true,
            now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_却下はチェーンを即座に停止する() {
        // Arrange: 2 段階チェーン
        let mocks = Mocks::new();
        let company_id = CompanyId::new();
        let submitter = make_user(&company_id, UserRole::Employee, None, "e@x.com", "申請者", now());
        let user_a = make_user(&company_id, UserRole::Manager, None, "a@x.com", "承認者A", now());
        let user_b = make_user(&company_id, UserRole::Finance, None, "b@x.com", "承認者B", now());

        let (sut, _, approvals) = mocks
            .setup_chain(&company_id, &submitter, &[(1, &user_a), (2, &user_b)])
            .await;

        // Act: userA が却下
        let outcome = sut
            .record_decision(
                approvals[0].id().clone(),
                company_id.clone(),
                user_a.id().clone(),
                reject_input(),
            )
            .await
            .unwrap();

        // Assert
        assert_eq!(
            outcome,
            DecisionOutcome {
                expense_status:   ExpenseStatus::Rejected,
                next_approver_id: None,
            }
        );

        // 経費申請は即座に Rejected
        let expense = mocks
            .expense_repo
            .find_by_id(approvals[0].expense_id(), &company_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expense.status(), ExpenseStatus::Rejected);

        // userB の承認レコードは Pending のまま手つかず
        let after = mocks
            .approval_repo
            .find_by_expense(approvals[0].expense_id())
            .await
            .unwrap();
        assert_eq!(after[0].decision(), ApprovalDecision::Rejected);
        assert_eq!(after[1].decision(), ApprovalDecision::Pending);

        // userB に承認依頼は届かない
        let b_notifications = mocks
            .notification_repo
            .find_by_user(user_b.id())
            .await
            .unwrap();
        assert!(b_notifications.is_empty());
    }

    #[tokio::test]
    async fn test_途中ステップの承認で次の承認者に前進する() {
        let mocks = Mocks::new();
        let company_id = CompanyId::new();
        let submitter = make_user(&company_id, UserRole::Employee, None, "e@x.com", "申請者", now());
        let user_a = make_user(&company_id, UserRole::Manager, None, "a@x.com", "承認者A", now());
        let user_b = make_user(&company_id, UserRole::Finance, None, "b@x.com", "承認者B", now());

        let (sut, _, approvals) = mocks
            .setup_chain(&company_id, &submitter, &[(1, &user_a), (2, &user_b)])
            .await;

        // Act: userA が承認
        let outcome = sut
            .record_decision(
                approvals[0].id().clone(),
                company_id.clone(),
                user_a.id().clone(),
                approve_input(),
            )
            .await
            .unwrap();

        // Assert
        assert_eq!(
            outcome,
            DecisionOutcome {
                expense_status:   ExpenseStatus::Pending,
                next_approver_id: Some(user_b.id().clone()),
            }
        );

        // current_step はステップ 2 に前進
        let expense = mocks
            .expense_repo
            .find_by_id(approvals[0].expense_id(), &company_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expense.status(), ExpenseStatus::Pending);
        assert_eq!(expense.current_step(), Some(StepNumber::new(2).unwrap()));

        // userB に承認依頼が届く
        let b_notifications = mocks
            .notification_repo
            .find_by_user(user_b.id())
            .await
            .unwrap();
        assert_eq!(b_notifications.len(), 1);
        assert_eq!(
            b_notifications[0].event_type(),
            NotificationEventType::ApprovalRequested
        );
    }

    #[tokio::test]
    async fn test_全ステップ承認のラウンドトリップ() {
        // ルールなしの 2 段階チェーン: 最終ステップの判断まで Approved にならない
        let mocks = Mocks::new();
        let company_id = CompanyId::new();
        let submitter = make_user(&company_id, UserRole::Employee, None, "e@x.com", "申請者", now());
        let user_a = make_user(&company_id, UserRole::Manager, None, "a@x.com", "承認者A", now());
        let user_b = make_user(&company_id, UserRole::Finance, None, "b@x.com", "承認者B", now());

        let (sut, submitted, approvals) = mocks
            .setup_chain(&company_id, &submitter, &[(1, &user_a), (2, &user_b)])
            .await;
        assert_eq!(submitted.current_step(), Some(StepNumber::new(1).unwrap()));

        // Act 1: userA が承認 → まだ Pending
        let first = sut
            .record_decision(
                approvals[0].id().clone(),
                company_id.clone(),
                user_a.id().clone(),
                approve_input(),
            )
            .await
            .unwrap();
        assert_eq!(first.expense_status, ExpenseStatus::Pending);

        // Act 2: userB が承認 → Approved
        let second = sut
            .record_decision(
                approvals[1].id().clone(),
                company_id.clone(),
                user_b.id().clone(),
                approve_input(),
            )
            .await
            .unwrap();
        assert_eq!(
            second,
            DecisionOutcome {
                expense_status:   ExpenseStatus::Approved,
                next_approver_id: None,
            }
        );

        // current_step は単調に前進し、最終ステップで確定する
        let expense = mocks
            .expense_repo
            .find_by_id(approvals[0].expense_id(), &company_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expense.status(), ExpenseStatus::Approved);
        assert_eq!(expense.current_step(), Some(StepNumber::new(2).unwrap()));
    }

    #[tokio::test]
    async fn test_割合ルールでチェーンをショートサーキットする() {
        // 3 人チェーン + しきい値 50% の割合ルール: 2 人目の承認で自動承認
        let mocks = Mocks::new();
        let company_id = CompanyId::new();
        let submitter = make_user(&company_id, UserRole::Employee, None, "e@x.com", "申請者", now());
        let user_a = make_user(&company_id, UserRole::Manager, None, "a@x.com", "承認者A", now());
        let user_b = make_user(&company_id, UserRole::Finance, None, "b@x.com", "承認者B", now());
        let user_c = make_user(&company_id, UserRole::Director, None, "c@x.com", "承認者C", now());

        mocks.rule_repo.add_rule(percentage_rule(&company_id, 50));

        let (sut, _, approvals) = mocks
            .setup_chain(
                &company_id,
                &submitter,
                &[(1, &user_a), (2, &user_b), (3, &user_c)],
            )
            .await;

        // Act 1: userA が承認（1/3 = 33.3% < 50% → 前進）
        let first = sut
            .record_decision(
                approvals[0].id().clone(),
                company_id.clone(),
                user_a.id().clone(),
                approve_input(),
            )
            .await
            .unwrap();
        assert_eq!(first.expense_status, ExpenseStatus::Pending);

        // Act 2: userB が承認（2/3 = 66.7% >= 50% → 自動承認）
        let second = sut
            .record_decision(
                approvals[1].id().clone(),
                company_id.clone(),
                user_b.id().clone(),
                approve_input(),
            )
            .await
            .unwrap();
        assert_eq!(second.expense_status, ExpenseStatus::Approved);
        assert_eq!(second.next_approver_id, None);

        // ステップ 3 は未判断のまま
        let after = mocks
            .approval_repo
            .find_by_expense(approvals[0].expense_id())
            .await
            .unwrap();
        assert_eq!(after[2].decision(), ApprovalDecision::Pending);

        // userC に承認依頼は届かない
        let c_notifications = mocks
            .notification_repo
            .find_by_user(user_c.id())
            .await
            .unwrap();
        assert!(c_notifications.is_empty());

        // 申請者への通知は自動承認の注記付き
        let requester_notifications = mocks
            .notification_repo
            .find_by_user(submitter.id())
            .await
            .unwrap();
        let decision_notification = requester_notifications
            .iter()
            .find(|n| n.event_type() == NotificationEventType::DecisionMade)
            .unwrap();
        assert!(decision_notification.message().contains("自動承認"));
    }

    #[tokio::test]
    async fn test_特定承認者ルールでチェーンをショートサーキットする() {
        // userC を指定したルール。userC はステップ 2 / 3
        let mocks = Mocks::new();
        let company_id = CompanyId::new();
        let submitter = make_user(&company_id, UserRole::Employee, None, "e@x.com", "申請者", now());
        let user_a = make_user(&company_id, UserRole::Manager, None, "a@x.com", "承認者A", now());
        let user_c = make_user(&company_id, UserRole::Cfo, None, "c@x.com", "CFO", now());
        let user_b = make_user(&company_id, UserRole::Finance, None, "b@x.com", "承認者B", now());

        mocks
            .rule_repo
            .add_rule(specific_user_rule(&company_id, user_c.id()));

        let (sut, _, approvals) = mocks
            .setup_chain(
                &company_id,
                &submitter,
                &[(1, &user_a), (2, &user_c), (3, &user_b)],
            )
            .await;

        // Act 1: userA が承認 → 前進
        sut.record_decision(
            approvals[0].id().clone(),
            company_id.clone(),
            user_a.id().clone(),
            approve_input(),
        )
        .await
        .unwrap();

        // Act 2: userC（指定承認者）が承認 → 即 Approved
        let outcome = sut
            .record_decision(
                approvals[1].id().clone(),
                company_id.clone(),
                user_c.id().clone(),
                approve_input(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.expense_status, ExpenseStatus::Approved);

        // ステップ 3 には通知されない
        let b_notifications = mocks
            .notification_repo
            .find_by_user(user_b.id())
            .await
            .unwrap();
        assert!(b_notifications.is_empty());
    }

    #[tokio::test]
    async fn test_特定ロールルールでチェーンをショートサーキットする() {
        // CFO ロールを指定したルール
        let mocks = Mocks::new();
        let company_id = CompanyId::new();
        let submitter = make_user(&company_id, UserRole::Employee, None, "e@x.com", "申請者", now());
        let user_a = make_user(&company_id, UserRole::Manager, None, "a@x.com", "承認者A", now());
        let cfo = make_user(&company_id, UserRole::Cfo, None, "cfo@x.com", "CFO", now());
        let user_b = make_user(&company_id, UserRole::Finance, None, "b@x.com", "承認者B", now());

        let rule = ApprovalRule::new(
            ApprovalRuleId::new(),
            company_id.clone(),
            RuleType::Specific,
            None,
            Some(SpecificApprover::Role(UserRole::Cfo)),
            true,
            now(),
        )
        .unwrap();
        mocks.rule_repo.add_rule(rule);

        let (sut, _, approvals) = mocks
            .setup_chain(
                &company_id,
                &submitter,
                &[(1, &user_a), (2, &cfo), (3, &user_b)],
            )
            .await;

        sut.record_decision(
            approvals[0].id().clone(),
            company_id.clone(),
            user_a.id().clone(),
            approve_input(),
        )
        .await
        .unwrap();

        let outcome = sut
            .record_decision(
                approvals[1].id().clone(),
                company_id.clone(),
                cfo.id().clone(),
                approve_input(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.expense_status, ExpenseStatus::Approved);
    }

    #[tokio::test]
    async fn test_判断済みの承認への再判断は409() {
        let mocks = Mocks::new();
        let company_id = CompanyId::new();
        let submitter = make_user(&company_id, UserRole::Employee, None, "e@x.com", "申請者", now());
        let user_a = make_user(&company_id, UserRole::Manager, None, "a@x.com", "承認者A", now());
        let user_b = make_user(&company_id, UserRole::Finance, None, "b@x.com", "承認者B", now());

        let (sut, _, approvals) = mocks
            .setup_chain(&company_id, &submitter, &[(1, &user_a), (2, &user_b)])
            .await;

        // 1 回目は成功
        sut.record_decision(
            approvals[0].id().clone(),
            company_id.clone(),
            user_a.id().clone(),
            approve_input(),
        )
        .await
        .unwrap();

        let before = mocks
            .expense_repo
            .find_by_id(approvals[0].expense_id(), &company_id)
            .await
            .unwrap()
            .unwrap();

        // Act: 同じ承認への 2 回目の判断
        let result = sut
            .record_decision(
                approvals[0].id().clone(),
                company_id.clone(),
                user_a.id().clone(),
                reject_input(),
            )
            .await;

        // Assert: 409 かつ経費申請の状態は変化しない
        assert!(matches!(result, Err(CoreError::Conflict(_))));

        let after = mocks
            .expense_repo
            .find_by_id(approvals[0].expense_id(), &company_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_担当外のユーザーによる判断は403() {
        let mocks = Mocks::new();
        let company_id = CompanyId::new();
        let submitter = make_user(&company_id, UserRole::Employee, None, "e@x.com", "申請者", now());
        let user_a = make_user(&company_id, UserRole::Manager, None, "a@x.com", "承認者A", now());
        let other = make_user(&company_id, UserRole::Finance, None, "o@x.com", "部外者", now());
        mocks.user_repo.add_user(other.clone());

        let (sut, _, approvals) = mocks
            .setup_chain(&company_id, &submitter, &[(1, &user_a)])
            .await;

        let result = sut
            .record_decision(
                approvals[0].id().clone(),
                company_id.clone(),
                other.id().clone(),
                approve_input(),
            )
            .await;

        assert!(matches!(result, Err(CoreError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_確定済みの経費申請への判断は409() {
        // userA の却下で確定後、userB が自分の Pending 承認に判断を試みる
        let mocks = Mocks::new();
        let company_id = CompanyId::new();
        let submitter = make_user(&company_id, UserRole::Employee, None, "e@x.com", "申請者", now());
        let user_a = make_user(&company_id, UserRole::Manager, None, "a@x.com", "承認者A", now());
        let user_b = make_user(&company_id, UserRole::Finance, None, "b@x.com", "承認者B", now());

        let (sut, _, approvals) = mocks
            .setup_chain(&company_id, &submitter, &[(1, &user_a), (2, &user_b)])
            .await;

        sut.record_decision(
            approvals[0].id().clone(),
            company_id.clone(),
            user_a.id().clone(),
            reject_input(),
        )
        .await
        .unwrap();

        let result = sut
            .record_decision(
                approvals[1].id().clone(),
                company_id.clone(),
                user_b.id().clone(),
                approve_input(),
            )
            .await;

        assert!(matches!(result, Err(CoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_存在しない承認への判断は404() {
        let mocks = Mocks::new();
        let sut = mocks.build();

        let result = sut
            .record_decision(
                keihiflow_domain::approval::ApprovalId::new(),
                CompanyId::new(),
                UserId::new(),
                approve_input(),
            )
            .await;

        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_非連続なステップ番号でも昇順に前進する() {
        // sequence は 10, 30（連番でない）
        let mocks = Mocks::new();
        let company_id = CompanyId::new();
        let submitter = make_user(&company_id, UserRole::Employee, None, "e@x.com", "申請者", now());
        let user_a = make_user(&company_id, UserRole::Manager, None, "a@x.com", "承認者A", now());
        let user_b = make_user(&company_id, UserRole::Finance, None, "b@x.com", "承認者B", now());

        let (sut, submitted, approvals) = mocks
            .setup_chain(&company_id, &submitter, &[(10, &user_a), (30, &user_b)])
            .await;
        assert_eq!(submitted.current_step(), Some(StepNumber::new(10).unwrap()));

        let outcome = sut
            .record_decision(
                approvals[0].id().clone(),
                company_id.clone(),
                user_a.id().clone(),
                approve_input(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.expense_status, ExpenseStatus::Pending);
        assert_eq!(outcome.next_approver_id, Some(user_b.id().clone()));

        let expense = mocks
            .expense_repo
            .find_by_id(approvals[0].expense_id(), &company_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expense.current_step(), Some(StepNumber::new(30).unwrap()));
    }
}
