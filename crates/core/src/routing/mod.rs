pub mod pattern;
pub mod resolver;
pub mod sla;

use serde::{Deserialize, Serialize};

pub use pattern::RolePattern;
pub use resolver::{scope_matches, RoutingResolver};
pub use sla::{
    compile_rules, sla_hours_for, CompiledRule, InMemorySlaRuleSource, SlaCalculator,
    SlaRuleSource, DEFAULT_SLA_HOURS,
};

/// Role codes that bypass the rule matrix and may send to anyone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalRoleSet {
    codes: Vec<String>,
}

impl GlobalRoleSet {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut codes: Vec<String> = codes
            .into_iter()
            .map(|code| code.as_ref().trim().to_ascii_uppercase())
            .filter(|code| !code.is_empty())
            .collect();
        codes.sort();
        codes.dedup();
        Self { codes }
    }

    pub fn contains(&self, role_code: &str) -> bool {
        let role_code = role_code.trim().to_ascii_uppercase();
        self.codes.iter().any(|code| *code == role_code)
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }
}
