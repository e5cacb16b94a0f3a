//! Security group reconciliation
//!
//! Provider security group APIs are not idempotent: creating a rule that
//! already exists is an error. Reconciliation swallows exactly that error so
//! that "ensure desired state" can be re-run safely, and surfaces everything
//! else (bad CIDR, quota, auth).

use crate::error::Result;
use crate::provider::{Cloud, SecurityGroup};
use cirrus_config::SecurityGroupSpec;

/// What a reconciliation run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created_groups: Vec<String>,
    pub created_rules: usize,
    pub existing_rules: usize,
}

impl ReconcileReport {
    pub fn has_changes(&self) -> bool {
        !self.created_groups.is_empty() || self.created_rules > 0
    }
}

impl std::fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} groups created, {} rules created, {} rules unchanged",
            self.created_groups.len(),
            self.created_rules,
            self.existing_rules
        )
    }
}

/// Ensure every declared group and rule exists on the provider
pub async fn reconcile<C: Cloud + ?Sized>(
    cloud: &C,
    spec: &SecurityGroupSpec,
) -> Result<ReconcileReport> {
    let existing = cloud.list_security_groups().await?;
    let mut report = ReconcileReport::default();

    for (name, rules) in spec {
        let group = match existing.iter().find(|g| &g.name == name) {
            Some(group) => group.clone(),
            None => {
                tracing::info!("Creating security group {}", name);
                let group = cloud.create_security_group(name).await?;
                report.created_groups.push(name.clone());
                group
            }
        };

        for rule in rules {
            match cloud.create_security_rule(&group, rule).await {
                Ok(()) => report.created_rules += 1,
                Err(e) if e.is_already_exists() => {
                    tracing::info!("{} already exists in {}", rule, group.name);
                    report.existing_rules += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(report)
}

/// Groups as currently reported by the provider
pub async fn list<C: Cloud + ?Sized>(cloud: &C) -> Result<Vec<SecurityGroup>> {
    cloud.list_security_groups().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CloudError;
    use crate::mock::MockCloud;
    use cirrus_config::SecurityRuleSpec;

    fn web_rule() -> SecurityRuleSpec {
        SecurityRuleSpec::new("tcp", 80, 80, "0.0.0.0/0")
    }

    fn db_rule() -> SecurityRuleSpec {
        SecurityRuleSpec::new("tcp", 5432, 5432, "10.0.0.0/8")
    }

    #[tokio::test]
    async fn test_existing_rule_untouched_and_new_group_created() {
        let cloud = MockCloud::new("RegionOne").with_security_group("web", &[web_rule()]);

        let mut spec = SecurityGroupSpec::new();
        spec.insert("web".into(), vec![web_rule()]);
        spec.insert("db".into(), vec![db_rule()]);

        let report = reconcile(&cloud, &spec).await.unwrap();

        assert_eq!(report.created_groups, vec!["db".to_string()]);
        assert_eq!(report.created_rules, 1);
        assert_eq!(report.existing_rules, 1);

        let groups = list(&cloud).await.unwrap();
        let web = groups.iter().find(|g| g.name == "web").unwrap();
        assert_eq!(web.rules, vec![web_rule()]);
        let db = groups.iter().find(|g| g.name == "db").unwrap();
        assert_eq!(db.rules, vec![db_rule()]);
        assert!(db.description.contains("mock-tenant"));
    }

    #[tokio::test]
    async fn test_reconcile_twice_is_idempotent() {
        let cloud = MockCloud::new("RegionOne");

        let mut spec = SecurityGroupSpec::new();
        spec.insert("web".into(), vec![web_rule(), SecurityRuleSpec::new("tcp", 443, 443, "0.0.0.0/0")]);
        spec.insert("db".into(), vec![db_rule()]);

        let first = reconcile(&cloud, &spec).await.unwrap();
        assert!(first.has_changes());
        let after_first = list(&cloud).await.unwrap();

        let second = reconcile(&cloud, &spec).await.unwrap();
        assert!(!second.has_changes());
        assert_eq!(second.existing_rules, 3);
        assert_eq!(list(&cloud).await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_genuine_rule_error_propagates() {
        let cloud = MockCloud::new("RegionOne").reject_cidr("not-a-cidr");

        let mut spec = SecurityGroupSpec::new();
        spec.insert(
            "web".into(),
            vec![SecurityRuleSpec::new("tcp", 22, 22, "not-a-cidr"), web_rule()],
        );

        let err = reconcile(&cloud, &spec).await.unwrap_err();
        assert!(matches!(err, CloudError::Api(_)));
    }

    #[tokio::test]
    async fn test_default_trait_method_reconciles() {
        let cloud = MockCloud::new("RegionOne");
        let mut spec = SecurityGroupSpec::new();
        spec.insert("cirrus".into(), vec![]);

        let report = cloud.create_security_groups(&spec).await.unwrap();
        assert_eq!(report.created_groups, vec!["cirrus".to_string()]);
        assert_eq!(report.to_string(), "1 groups created, 0 rules created, 0 rules unchanged");
    }
}
