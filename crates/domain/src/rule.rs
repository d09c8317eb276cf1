//! # 条件付き承認ルール
//!
//! 承認チェーンを途中で打ち切る（ショートサーキットする）会社スコープの
//! ルールと、その評価ロジックを定義する。
//!
//! 評価は現在の承認レコード集合に対する純粋な読み取りであり、
//! 副作用を持たない。複数ルールは OR で結合され、いずれか 1 つでも
//! 満たされれば自動承認となる。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    DomainError,
    approval::{Approval, ApprovalDecision},
    company::CompanyId,
    user::{UserId, UserRole},
};

define_uuid_id! {
    /// 条件付き承認ルール ID
    pub struct ApprovalRuleId;
}

/// ルール種別
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RuleType {
    /// 承認割合がしきい値以上で自動承認
    Percentage,
    /// 特定の承認者（ユーザーまたはロール）の承認で自動承認
    Specific,
    /// 割合条件と特定承認者条件の OR
    Hybrid,
}

impl std::str::FromStr for RuleType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "specific" => Ok(Self::Specific),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(DomainError::Validation(format!("不正なルール種別: {}", s))),
        }
    }
}

/// 承認割合しきい値（値オブジェクト）
///
/// # 不変条件
///
/// - 1〜100 の整数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentageThreshold(i32);

impl PercentageThreshold {
    /// しきい値を作成する
    ///
    /// # エラー
    ///
    /// 1〜100 の範囲外は `DomainError::Validation`。
    pub fn new(value: i32) -> Result<Self, DomainError> {
        if !(1..=100).contains(&value) {
            return Err(DomainError::Validation(format!(
                "承認割合しきい値は 1〜100 である必要があります: {}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// 内部の i32 値を取得する
    pub fn as_i32(&self) -> i32 {
        self.0
    }

    /// 承認数と承認者総数からしきい値を満たすか判定する
    ///
    /// 実数除算で `100 * approved / total >= threshold` を評価する。
    /// 承認者が存在しない場合は常に false。
    pub fn is_met(&self, approved_count: usize, total_approvers: usize) -> bool {
        if total_approvers == 0 {
            return false;
        }
        let percentage = (approved_count as f64 / total_approvers as f64) * 100.0;
        percentage >= f64::from(self.0)
    }
}

impl std::fmt::Display for PercentageThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// 特定承認者の指定方法
///
/// ユーザー指定とロール指定は排他。DB 上で両方が設定されている場合、
/// ユーザー指定を優先する（[`ApprovalRule::from_db`] が正規化する）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecificApprover {
    /// 特定ユーザーの承認
    User(UserId),
    /// 特定ロールを持つ任意の承認者の承認
    Role(UserRole),
}

/// 条件付き承認ルールエンティティ
///
/// 会社スコープの自動承認条件。複数のルールが共存でき、
/// いずれか 1 つでも満たされれば自動承認となる（OR）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRule {
    id: ApprovalRuleId,
    company_id: CompanyId,
    rule_type: RuleType,
    percentage_threshold: Option<PercentageThreshold>,
    specific_approver: Option<SpecificApprover>,
    enabled: bool,
    created_at: DateTime<Utc>,
}

/// 条件付き承認ルールの DB 復元パラメータ
pub struct ApprovalRuleRecord {
    pub id: ApprovalRuleId,
    pub company_id: CompanyId,
    pub rule_type: RuleType,
    pub percentage_threshold: Option<PercentageThreshold>,
    pub specific_user_id: Option<UserId>,
    pub specific_role: Option<UserRole>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl ApprovalRule {
    /// 新しいルールを作成する
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: ルール種別が必要とする条件が欠けている場合
    pub fn new(
        id: ApprovalRuleId,
        company_id: CompanyId,
        rule_type: RuleType,
        percentage_threshold: Option<PercentageThreshold>,
        specific_approver: Option<SpecificApprover>,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        Self::validate_conditions(rule_type, &percentage_threshold, &specific_approver)?;

        Ok(Self {
            id,
            company_id,
            rule_type,
            percentage_threshold,
            specific_approver,
            enabled,
            created_at: now,
        })
    }

    /// 既存のデータから復元する
    ///
    /// `specific_user_id` / `specific_role` の排他関係をユーザー優先で
    /// 正規化し、ルール種別が必要とする条件の存在を検証する。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: Percentage/Hybrid でしきい値欠損、
    ///   Specific/Hybrid で特定承認者欠損
    pub fn from_db(record: ApprovalRuleRecord) -> Result<Self, DomainError> {
        let specific_approver = match (record.specific_user_id, record.specific_role) {
            (Some(user_id), _) => Some(SpecificApprover::User(user_id)),
            (None, Some(role)) => Some(SpecificApprover::Role(role)),
            (None, None) => None,
        };

        Self::validate_conditions(
            record.rule_type,
            &record.percentage_threshold,
            &specific_approver,
        )?;

        Ok(Self {
            id: record.id,
            company_id: record.company_id,
            rule_type: record.rule_type,
            percentage_threshold: record.percentage_threshold,
            specific_approver,
            enabled: record.enabled,
            created_at: record.created_at,
        })
    }

    fn validate_conditions(
        rule_type: RuleType,
        percentage_threshold: &Option<PercentageThreshold>,
        specific_approver: &Option<SpecificApprover>,
    ) -> Result<(), DomainError> {
        if matches!(rule_type, RuleType::Percentage | RuleType::Hybrid)
            && percentage_threshold.is_none()
        {
            return Err(DomainError::Validation(format!(
                "{} ルールには承認割合しきい値が必要です",
                rule_type
            )));
        }

        if matches!(rule_type, RuleType::Specific | RuleType::Hybrid)
            && specific_approver.is_none()
        {
            return Err(DomainError::Validation(format!(
                "{} ルールには特定承認者の指定が必要です",
                rule_type
            )));
        }

        Ok(())
    }

    pub fn id(&self) -> &ApprovalRuleId {
        &self.id
    }

    pub fn company_id(&self) -> &CompanyId {
        &self.company_id
    }

    pub fn rule_type(&self) -> RuleType {
        self.rule_type
    }

    pub fn percentage_threshold(&self) -> Option<PercentageThreshold> {
        self.percentage_threshold
    }

    pub fn specific_approver(&self) -> Option<&SpecificApprover> {
        self.specific_approver.as_ref()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 現在の承認レコード集合に対してこのルールが満たされているか評価する
    ///
    /// `approver_roles` は承認者 ID からロールへの対応表で、
    /// ロール指定の特定承認者条件の評価に使用する。
    pub fn is_satisfied(
        &self,
        approvals: &[Approval],
        approver_roles: &HashMap<UserId, UserRole>,
    ) -> bool {
        if !self.enabled {
            return false;
        }

        // 割合条件（Percentage / Hybrid）
        if matches!(self.rule_type, RuleType::Percentage | RuleType::Hybrid)
            && let Some(threshold) = self.percentage_threshold
        {
            let total_approvers = approvals.len();
            let approved_count = approvals
                .iter()
                .filter(|a| a.decision() == ApprovalDecision::Approved)
                .count();
            if threshold.is_met(approved_count, total_approvers) {
                return true;
            }
        }

        // 特定承認者条件（Specific / Hybrid）
        if matches!(self.rule_type, RuleType::Specific | RuleType::Hybrid)
            && let Some(specific) = &self.specific_approver
        {
            let satisfied = approvals
                .iter()
                .filter(|a| a.decision() == ApprovalDecision::Approved)
                .any(|a| match specific {
                    SpecificApprover::User(user_id) => a.approver_id() == user_id,
                    SpecificApprover::Role(role) => {
                        approver_roles.get(a.approver_id()) == Some(role)
                    }
                });
            if satisfied {
                return true;
            }
        }

        false
    }
}

/// 有効なルールのいずれかが満たされているか評価する
///
/// ルールは独立に評価され、最初に満たされたルールでショートサーキット
/// する（OR）。ルールが存在しなければ false。
pub fn any_rule_satisfied(
    rules: &[ApprovalRule],
    approvals: &[Approval],
    approver_roles: &HashMap<UserId, UserRole>,
) -> bool {
    rules
        .iter()
        .any(|rule| rule.is_satisfied(approvals, approver_roles))
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::{
        approval::{ApprovalId, NewApproval},
        expense::ExpenseId,
        value_objects::StepNumber,
    };

    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn pending_approval(approver_id: &UserId, step: i32, now: DateTime<Utc>) -> Approval {
        Approval::new(NewApproval {
            id: ApprovalId::new(),
            expense_id: ExpenseId::new(),
            approver_id: approver_id.clone(),
            step: StepNumber::new(step).unwrap(),
            now,
        })
    }

    fn approved(approver_id: &UserId, step: i32, now: DateTime<Utc>) -> Approval {
        pending_approval(approver_id, step, now)
            .approve(None, now)
            .unwrap()
    }

    fn percentage_rule(threshold: i32, now: DateTime<Utc>) -> ApprovalRule {
        ApprovalRule::new(
            ApprovalRuleId::new(),
            CompanyId::new(),
            RuleType::Percentage,
            Some(PercentageThreshold::new(threshold).unwrap()),
            None,
            true,
            now,
        )
        .unwrap()
    }

    fn specific_user_rule(user_id: &UserId, now: DateTime<Utc>) -> ApprovalRule {
        ApprovalRule::new(
            ApprovalRuleId::new(),
            CompanyId::new(),
            RuleType::Specific,
            None,
            Some(SpecificApprover::User(user_id.clone())),
            true,
            now,
        )
        .unwrap()
    }

    // PercentageThreshold のテスト

    #[rstest]
    #[case(1)]
    #[case(50)]
    #[case(100)]
    fn test_しきい値の有効範囲(#[case] value: i32) {
        assert!(PercentageThreshold::new(value).is_ok());
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(101)]
    fn test_しきい値の範囲外は無効(#[case] value: i32) {
        assert!(PercentageThreshold::new(value).is_err());
    }

    #[test]
    fn test_しきい値判定_3人中2人承認は50パーセントを満たす() {
        let threshold = PercentageThreshold::new(50).unwrap();
        assert!(threshold.is_met(2, 3));
    }

    #[test]
    fn test_しきい値判定_ちょうど50パーセントは満たす() {
        // 比較は >= であり、境界値ちょうどで成立する
        let threshold = PercentageThreshold::new(50).unwrap();
        assert!(threshold.is_met(1, 2));
    }

    #[test]
    fn test_しきい値判定_3人中1人承認は50パーセントを満たさない() {
        let threshold = PercentageThreshold::new(50).unwrap();
        assert!(!threshold.is_met(1, 3));
    }

    #[test]
    fn test_しきい値判定_承認者ゼロは常にfalse() {
        let threshold = PercentageThreshold::new(1).unwrap();
        assert!(!threshold.is_met(0, 0));
    }

    // バリデーションのテスト

    #[rstest]
    fn test_割合ルールはしきい値必須(now: DateTime<Utc>) {
        let result = ApprovalRule::new(
            ApprovalRuleId::new(),
            CompanyId::new(),
            RuleType::Percentage,
            None,
            None,
            true,
            now,
        );

        assert!(result.is_err());
    }

    #[rstest]
    fn test_特定承認者ルールは指定必須(now: DateTime<Utc>) {
        let result = ApprovalRule::new(
            ApprovalRuleId::new(),
            CompanyId::new(),
            RuleType::Specific,
            None,
            None,
            true,
            now,
        );

        assert!(result.is_err());
    }

    #[rstest]
    fn test_ハイブリッドルールは両方の条件が必須(now: DateTime<Utc>) {
        let missing_specific = ApprovalRule::new(
            ApprovalRuleId::new(),
            CompanyId::new(),
            RuleType::Hybrid,
            Some(PercentageThreshold::new(60).unwrap()),
            None,
            true,
            now,
        );
        assert!(missing_specific.is_err());

        let missing_threshold = ApprovalRule::new(
            ApprovalRuleId::new(),
            CompanyId::new(),
            RuleType::Hybrid,
            None,
            Some(SpecificApprover::Role(UserRole::Cfo)),
            true,
            now,
        );
        assert!(missing_threshold.is_err());
    }

    #[rstest]
    fn test_from_db_ユーザーとロール両方設定時はユーザー優先(now: DateTime<Utc>) {
        let user_id = UserId::new();
        let rule = ApprovalRule::from_db(ApprovalRuleRecord {
            id: ApprovalRuleId::new(),
            company_id: CompanyId::new(),
            rule_type: RuleType::Specific,
            percentage_threshold: None,
            specific_user_id: Some(user_id.clone()),
            specific_role: Some(UserRole::Cfo),
            enabled: true,
            created_at: now,
        })
        .unwrap();

        assert_eq!(
            rule.specific_approver(),
            Some(&SpecificApprover::User(user_id))
        );
    }

    // 評価のテスト

    #[rstest]
    fn test_割合ルール_3人中2人承認で満たされる(now: DateTime<Utc>) {
        let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());
        let approvals = vec![
            approved(&a, 1, now),
            approved(&b, 2, now),
            pending_approval(&c, 3, now),
        ];
        let rule = percentage_rule(50, now);

        assert!(rule.is_satisfied(&approvals, &HashMap::new()));
    }

    #[rstest]
    fn test_割合ルール_3人中1人承認では満たされない(now: DateTime<Utc>) {
        let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());
        let approvals = vec![
            approved(&a, 1, now),
            pending_approval(&b, 2, now),
            pending_approval(&c, 3, now),
        ];
        let rule = percentage_rule(50, now);

        assert!(!rule.is_satisfied(&approvals, &HashMap::new()));
    }

    #[rstest]
    fn test_割合ルール_承認レコードなしでは満たされない(now: DateTime<Utc>) {
        let rule = percentage_rule(1, now);

        assert!(!rule.is_satisfied(&[], &HashMap::new()));
    }

    #[rstest]
    fn test_特定ユーザールール_該当ユーザーの承認で満たされる(now: DateTime<Utc>) {
        let (cfo, other) = (UserId::new(), UserId::new());
        let approvals = vec![pending_approval(&other, 1, now), approved(&cfo, 2, now)];
        let rule = specific_user_rule(&cfo, now);

        assert!(rule.is_satisfied(&approvals, &HashMap::new()));
    }

    #[rstest]
    fn test_特定ユーザールール_別ユーザーの承認では満たされない(
        now: DateTime<Utc>,
    ) {
        let (cfo, other) = (UserId::new(), UserId::new());
        let approvals = vec![approved(&other, 1, now), pending_approval(&cfo, 2, now)];
        let rule = specific_user_rule(&cfo, now);

        assert!(!rule.is_satisfied(&approvals, &HashMap::new()));
    }

    #[rstest]
    fn test_特定ロールルール_該当ロールの承認で満たされる(now: DateTime<Utc>) {
        let cfo = UserId::new();
        let approvals = vec![approved(&cfo, 1, now)];
        let roles = HashMap::from([(cfo.clone(), UserRole::Cfo)]);

        let rule = ApprovalRule::new(
            ApprovalRuleId::new(),
            CompanyId::new(),
            RuleType::Specific,
            None,
            Some(SpecificApprover::Role(UserRole::Cfo)),
            true,
            now,
        )
        .unwrap();

        assert!(rule.is_satisfied(&approvals, &roles));
    }

    #[rstest]
    fn test_特定ロールルール_未判断の該当ロールでは満たされない(
        now: DateTime<Utc>,
    ) {
        let cfo = UserId::new();
        let approvals = vec![pending_approval(&cfo, 1, now)];
        let roles = HashMap::from([(cfo.clone(), UserRole::Cfo)]);

        let rule = ApprovalRule::new(
            ApprovalRuleId::new(),
            CompanyId::new(),
            RuleType::Specific,
            None,
            Some(SpecificApprover::Role(UserRole::Cfo)),
            true,
            now,
        )
        .unwrap();

        assert!(!rule.is_satisfied(&approvals, &roles));
    }

    #[rstest]
    fn test_ハイブリッドルールはどちらかの条件で満たされる(now: DateTime<Utc>) {
        let (cfo, a, b) = (UserId::new(), UserId::new(), UserId::new());
        let rule = ApprovalRule::new(
            ApprovalRuleId::new(),
            CompanyId::new(),
            RuleType::Hybrid,
            Some(PercentageThreshold::new(100).unwrap()),
            Some(SpecificApprover::User(cfo.clone())),
            true,
            now,
        )
        .unwrap();

        // 割合 1/3 はしきい値 100% を満たさないが、CFO の承認で成立する
        let approvals = vec![
            pending_approval(&a, 1, now),
            approved(&cfo, 2, now),
            pending_approval(&b, 3, now),
        ];
        assert!(rule.is_satisfied(&approvals, &HashMap::new()));

        // CFO 未承認でも全員承認なら割合条件で成立する
        let approvals = vec![approved(&a, 1, now), approved(&b, 2, now)];
        assert!(rule.is_satisfied(&approvals, &HashMap::new()));
    }

    #[rstest]
    fn test_無効化されたルールは満たされない(now: DateTime<Utc>) {
        let a = UserId::new();
        let approvals = vec![approved(&a, 1, now)];
        let rule = ApprovalRule::new(
            ApprovalRuleId::new(),
            CompanyId::new(),
            RuleType::Percentage,
            Some(PercentageThreshold::new(1).unwrap()),
            None,
            false,
            now,
        )
        .unwrap();

        assert!(!rule.is_satisfied(&approvals, &HashMap::new()));
    }

    // any_rule_satisfied のテスト

    #[rstest]
    fn test_ルールなしはfalse(now: DateTime<Utc>) {
        let a = UserId::new();
        let approvals = vec![approved(&a, 1, now)];

        assert!(!any_rule_satisfied(&[], &approvals, &HashMap::new()));
    }

    #[rstest]
    fn test_複数ルールはorで結合される(now: DateTime<Utc>) {
        let (cfo, a, b) = (UserId::new(), UserId::new(), UserId::new());
        // 満たされないルールと満たされるルールの組み合わせ
        let rules = vec![specific_user_rule(&cfo, now), percentage_rule(50, now)];
        let approvals = vec![
            approved(&a, 1, now),
            approved(&b, 2, now),
            pending_approval(&cfo, 3, now),
        ];

        assert!(any_rule_satisfied(&rules, &approvals, &HashMap::new()));
    }
}
