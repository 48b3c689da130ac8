//! Ignore rules for recursive crawls
//!
//! Some children returned by tree expansion are pseudo-resources that can't
//! be imported (diagnostic settings, metrics, blob paths...). They are skipped
//! before the crawler recurses into them.

use crate::endpoints::EndpointTemplate;
use anyhow::{Context, Result};
use std::collections::HashMap;

/// Why a child was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The ID ends with a globally ignored suffix
    Suffix(String),
    /// The ID matches an exclusion template registered for the ancestor type
    Scoped { ancestor_type: String, template: String },
}

#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    suffixes: Vec<String>,
    scoped: HashMap<String, Vec<EndpointTemplate>>,
}

impl IgnoreRules {
    pub fn new(suffixes: Vec<String>, scoped: &HashMap<String, Vec<String>>) -> Result<Self> {
        let mut compiled = HashMap::new();
        for (type_name, templates) in scoped {
            let endpoints = templates
                .iter()
                .map(|t| EndpointTemplate::parse(t, ""))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("Invalid ignore rule for {}", type_name))?;
            compiled.insert(type_name.clone(), endpoints);
        }
        Ok(Self {
            suffixes,
            scoped: compiled,
        })
    }

    /// Check a child ID against the global suffixes, then against the rules
    /// registered for `ancestor_type`. Returns the first rule that matched.
    pub fn should_ignore(&self, child_id: &str, ancestor_type: Option<&str>) -> Option<IgnoreReason> {
        let lowered = child_id.to_ascii_lowercase();
        if let Some(suffix) = self
            .suffixes
            .iter()
            .find(|s| lowered.ends_with(&s.to_ascii_lowercase()))
        {
            return Some(IgnoreReason::Suffix(suffix.clone()));
        }

        let ancestor_type = ancestor_type.filter(|t| !t.is_empty())?;
        self.scoped
            .get(ancestor_type)?
            .iter()
            .find(|endpoint| endpoint.matches(child_id).is_match)
            .map(|endpoint| IgnoreReason::Scoped {
                ancestor_type: ancestor_type.to_string(),
                template: endpoint.template().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Registry;

    const SITE: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Web/sites/app";

    fn rules() -> IgnoreRules {
        Registry::embedded().unwrap().ignore_rules().clone()
    }

    #[test]
    fn test_global_suffix_rules() {
        let rules = rules();
        for suffix in [
            "/<diagsettings>",
            "/<activitylog>",
            "/providers/Microsoft.Resources/deployments",
            "/providers/microsoft.Insights/metrics",
            "/providers/microsoft.insights/metricdefinitions",
        ] {
            let id = format!("{}{}", SITE, suffix);
            assert!(
                matches!(rules.should_ignore(&id, None), Some(IgnoreReason::Suffix(_))),
                "{} should be ignored",
                id
            );
        }
    }

    #[test]
    fn test_suffix_wins_over_scoped_rule() {
        let rules = rules();
        let id = format!("{}/<diagsettings>", SITE);
        assert!(matches!(
            rules.should_ignore(&id, Some("azurerm_app_service")),
            Some(IgnoreReason::Suffix(_))
        ));
    }

    #[test]
    fn test_scoped_rules_apply_only_to_their_ancestor_type() {
        let rules = rules();
        let instances = format!("{}/instances", SITE);
        assert!(matches!(
            rules.should_ignore(&instances, Some("azurerm_app_service")),
            Some(IgnoreReason::Scoped { .. })
        ));
        assert_eq!(rules.should_ignore(&instances, Some("azurerm_storage_account")), None);
        assert_eq!(rules.should_ignore(&instances, None), None);
        assert_eq!(rules.should_ignore(&instances, Some("")), None);
    }

    #[test]
    fn test_sql_database_placeholder_children_are_ignored() {
        let rules = rules();
        let id = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Sql/servers/srv/databases/db/<something>";
        assert!(rules.should_ignore(id, Some("azurerm_mssql_database")).is_some());
    }

    #[test]
    fn test_unmatched_child_is_retained() {
        let rules = rules();
        let id = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Web/sites/app/slots/staging";
        assert_eq!(rules.should_ignore(id, Some("azurerm_app_service")), None);
    }
}
