use serde::{Deserialize, Serialize};

use crate::stages::policy::Policy;

/// Configuration for the authorization gate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Extra policies evaluated after the built-in allow-lists.
    pub policies: Vec<Policy>,
    /// Reject callers that do not present a principal.
    pub require_principal: bool,
    /// When `true`, only the identity stage runs; allow-lists and policies
    /// are not enforced. Intended for local experimentation only.
    pub permissive: bool,
}

impl GateConfig {
    pub fn permissive() -> Self {
        Self {
            permissive: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Module;
    use crate::stages::policy::{PolicyRule, PolicyScope};
    use estate_types::Organization;

    #[test]
    fn default_is_enforcing() {
        let c = GateConfig::default();
        assert!(!c.permissive);
        assert!(!c.require_principal);
        assert!(c.policies.is_empty());
    }

    #[test]
    fn parses_from_toml() {
        let text = r#"
            require_principal = true

            [[policies]]
            id = "freeze-window"
            name = "Only government during audit window"
            applies_to = { Module = "Realty" }
            rules = [{ AllowOnlyOrganizations = ["GovernmentMSP"] }]
        "#;
        let config: GateConfig = toml::from_str(text).unwrap();
        assert!(config.require_principal);
        assert_eq!(config.policies.len(), 1);
        assert_eq!(config.policies[0].applies_to, PolicyScope::Module(Module::Realty));
        assert_eq!(
            config.policies[0].rules[0],
            PolicyRule::AllowOnlyOrganizations(vec![Organization::Government])
        );
    }
}
