//! # テスト用モックリポジトリ
//!
//! ユースケーステストで使用するインメモリモックリポジトリ。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! keihiflow-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keihiflow_domain::{
    approval::{Approval, ApprovalId},
    assignment::ApproverAssignment,
    company::CompanyId,
    expense::{Expense, ExpenseId},
    notification::Notification,
    rule::ApprovalRule,
    user::{User, UserId, UserRole},
    value_objects::Version,
};

use crate::{
    db::{TransactionManager, TxContext},
    error::InfraError,
    repository::{
        ApprovalRepository,
        ApprovalRuleRepository,
        ApproverAssignmentRepository,
        ExpenseRepository,
        NotificationRepository,
        UserRepository,
    },
};

// ===== MockTransactionManager =====

/// テスト用のモック TransactionManager
///
/// Mock リポジトリはインメモリ実装のため、常に Mock TxContext を返す。
pub struct MockTransactionManager;

#[async_trait]
impl TransactionManager for MockTransactionManager {
    async fn begin(&self) -> Result<TxContext, InfraError> {
        Ok(TxContext::mock())
    }
}

// ===== MockExpenseRepository =====

#[derive(Clone, Default)]
pub struct MockExpenseRepository {
    expenses: Arc<Mutex<Vec<Expense>>>,
}

impl MockExpenseRepository {
    pub fn new() -> Self {
        Self {
            expenses: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ExpenseRepository for MockExpenseRepository {
    async fn insert(&self, expense: &Expense) -> Result<(), InfraError> {
        let mut expenses = self.expenses.lock().unwrap();
        expenses.push(expense.clone());
        Ok(())
    }

    async fn update_with_version_check(
        &self,
        _tx: &mut TxContext,
        expense: &Expense,
        expected_version: Version,
    ) -> Result<(), InfraError> {
        let mut expenses = self.expenses.lock().unwrap();
        if let Some(pos) = expenses.iter().position(|e| e.id() == expense.id()) {
            if expenses[pos].version() != expected_version {
                return Err(InfraError::conflict(
                    "Expense",
                    expense.id().as_uuid().to_string(),
                ));
            }
            expenses[pos] = expense.clone();
        }
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &ExpenseId,
        company_id: &CompanyId,
    ) -> Result<Option<Expense>, InfraError> {
        Ok(self
            .expenses
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id() == id && e.company_id() == company_id)
            .cloned())
    }
}

// ===== MockApprovalRepository =====

#[derive(Clone, Default)]
pub struct MockApprovalRepository {
    approvals: Arc<Mutex<Vec<Approval>>>,
}

impl MockApprovalRepository {
    pub fn new() -> Self {
        Self {
            approvals: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ApprovalRepository for MockApprovalRepository {
    async fn insert(&self, _tx: &mut TxContext, approval: &Approval) -> Result<(), InfraError> {
        let mut approvals = self.approvals.lock().unwrap();
        approvals.push(approval.clone());
        Ok(())
    }

    async fn update_with_version_check(
        &self,
        _tx: &mut TxContext,
        approval: &Approval,
        expected_version: Version,
    ) -> Result<(), InfraError> {
        let mut approvals = self.approvals.lock().unwrap();
        if let Some(pos) = approvals.iter().position(|a| a.id() == approval.id()) {
            if approvals[pos].version() != expected_version {
                return Err(InfraError::conflict(
                    "Approval",
                    approval.id().as_uuid().to_string(),
                ));
            }
            approvals[pos] = approval.clone();
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &ApprovalId) -> Result<Option<Approval>, InfraError> {
        Ok(self
            .approvals
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id() == id)
            .cloned())
    }

    async fn find_by_expense(&self, expense_id: &ExpenseId) -> Result<Vec<Approval>, InfraError> {
        let mut approvals: Vec<Approval> = self
            .approvals
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.expense_id() == expense_id)
            .cloned()
            .collect();
        approvals.sort_by_key(|a| a.step());
        Ok(approvals)
    }

    async fn find_pending_by_approver(
        &self,
        _company_id: &CompanyId,
        approver_id: &UserId,
    ) -> Result<Vec<Approval>, InfraError> {
        // Mock では会社スコープのチェックを簡略化
        let mut approvals: Vec<Approval> = self
            .approvals
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.approver_id() == approver_id && a.is_pending())
            .cloned()
            .collect();
        approvals.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(approvals)
    }
}

// ===== MockApproverAssignmentRepository =====

#[derive(Clone, Default)]
pub struct MockApproverAssignmentRepository {
    assignments: Arc<Mutex<Vec<ApproverAssignment>>>,
}

impl MockApproverAssignmentRepository {
    pub fn new() -> Self {
        Self {
            assignments: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_assignment(&self, assignment: ApproverAssignment) {
        self.assignments.lock().unwrap().push(assignment);
    }
}

#[async_trait]
impl ApproverAssignmentRepository for MockApproverAssignmentRepository {
    async fn find_by_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<ApproverAssignment>, InfraError> {
        let mut assignments: Vec<ApproverAssignment> = self
            .assignments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.company_id() == company_id)
            .cloned()
            .collect();
        assignments.sort_by_key(|a| a.sequence());
        Ok(assignments)
    }
}

// ===== MockApprovalRuleRepository =====

#[derive(Clone, Default)]
pub struct MockApprovalRuleRepository {
    rules: Arc<Mutex<Vec<ApprovalRule>>>,
}

impl MockApprovalRuleRepository {
    pub fn new() -> Self {
        Self {
            rules: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_rule(&self, rule: ApprovalRule) {
        self.rules.lock().unwrap().push(rule);
    }
}

#[async_trait]
impl ApprovalRuleRepository for MockApprovalRuleRepository {
    async fn find_enabled_by_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<ApprovalRule>, InfraError> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.company_id() == company_id && r.enabled())
            .cloned()
            .collect())
    }
}

// ===== MockUserRepository =====

#[derive(Clone, Default)]
pub struct MockUserRepository {
    users: Arc<Mutex<Vec<User>>>,
}

impl MockUserRepository {
    pub fn new() -> Self {
        Self {
            users: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_user(&self, user: User) {
        self.users.lock().unwrap().push(user);
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, InfraError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id() == id)
            .cloned())
    }

    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, InfraError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| ids.contains(u.id()))
            .cloned()
            .collect())
    }

    async fn find_first_active_by_role(
        &self,
        company_id: &CompanyId,
        role: UserRole,
    ) -> Result<Option<User>, InfraError> {
        // Postgres 実装と同じ決定的順序（created_at 昇順、id 昇順）を再現する
        let mut users: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.company_id() == company_id && u.role() == role && u.is_active())
            .cloned()
            .collect();
        users.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().as_uuid().cmp(b.id().as_uuid()))
        });
        Ok(users.into_iter().next())
    }

    async fn find_active_by_role(
        &self,
        company_id: &CompanyId,
        role: UserRole,
    ) -> Result<Vec<User>, InfraError> {
        let mut users: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.company_id() == company_id && u.role() == role && u.is_active())
            .cloned()
            .collect();
        users.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().as_uuid().cmp(b.id().as_uuid()))
        });
        Ok(users)
    }
}

// ===== MockNotificationRepository =====

#[derive(Clone, Default)]
pub struct MockNotificationRepository {
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl MockNotificationRepository {
    pub fn new() -> Self {
        Self {
            notifications: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 保存済みの通知一覧を返す（テストのアサーション用）
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationRepository for MockNotificationRepository {
    async fn insert(&self, notification: &Notification) -> Result<(), InfraError> {
        let mut notifications = self.notifications.lock().unwrap();
        notifications.push(notification.clone());
        Ok(())
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Notification>, InfraError> {
        let mut notifications: Vec<Notification> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id() == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(notifications)
    }
}
