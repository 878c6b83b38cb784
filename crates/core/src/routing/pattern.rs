//! Role-code glob matching shared by routing and SLA lookup.
//!
//! A pattern is a role code in which `*` matches any (possibly empty) run of
//! characters. Matching is anchored and case-insensitive; an empty pattern and
//! a bare `*` both match every role code.

use regex::Regex;

use crate::errors::DomainError;

#[derive(Clone, Debug)]
pub struct RolePattern {
    raw: String,
    compiled: Option<Regex>,
}

impl RolePattern {
    pub fn compile(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().all(|ch| ch == '*') {
            return Ok(Self { raw: trimmed.to_string(), compiled: None });
        }

        let body = trimmed.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
        let compiled = Regex::new(&format!("(?i)^{body}$")).map_err(|error| {
            DomainError::InvalidPattern { pattern: raw.to_string(), reason: error.to_string() }
        })?;

        Ok(Self { raw: trimmed.to_string(), compiled: Some(compiled) })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, role_code: &str) -> bool {
        match &self.compiled {
            None => true,
            Some(regex) => regex.is_match(role_code.trim()),
        }
    }
}

impl PartialEq for RolePattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw.eq_ignore_ascii_case(&other.raw)
    }
}

impl Eq for RolePattern {}

#[cfg(test)]
mod tests {
    use super::RolePattern;

    fn pattern(raw: &str) -> RolePattern {
        RolePattern::compile(raw).expect("pattern should compile")
    }

    #[test]
    fn prefix_wildcard_matches_only_its_department_family() {
        let water = pattern("WAT_*");

        assert!(water.matches("WAT_XEN_SAF"));
        assert!(water.matches("WAT_CE"));
        assert!(!water.matches("SEW_XEN"));
    }

    #[test]
    fn empty_and_star_patterns_match_every_role() {
        for raw in ["", "*", "  ", "**"] {
            let any = pattern(raw);
            assert!(any.matches("CE"), "`{raw}` should match everything");
            assert!(any.matches("WAT_XEN_SAF"));
            assert!(any.matches(""));
        }
    }

    #[test]
    fn matching_is_case_insensitive_and_anchored() {
        let xen = pattern("xen");

        assert!(xen.matches("XEN"));
        assert!(xen.matches(" Xen "));
        assert!(!xen.matches("WAT_XEN"));
        assert!(!xen.matches("XEN_WAT"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let dotted = pattern("A.B+*");

        assert!(dotted.matches("A.B+C"));
        assert!(!dotted.matches("AXB+C"));
        assert!(!dotted.matches("A.BBC"));
    }

    #[test]
    fn interior_wildcards_span_segments() {
        let interior = pattern("*_XEN_*");

        assert!(interior.matches("WAT_XEN_SAF"));
        assert!(!interior.matches("WAT_XEN"));
    }
}
