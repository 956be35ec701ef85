//! Rule scoring for incident routing

use super::{Recommendation, RoutingError, RoutingRequest};
use crate::{DocumentReference, ServiceContact, TeamContact};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// A configured association between match criteria and recommended resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub name: String,
    #[serde(default)]
    pub incident_types: BTreeSet<String>,
    #[serde(default)]
    pub incident_priorities: BTreeSet<String>,
    /// Matched case-insensitively as substrings of the request text, and
    /// as whole entries of the request terms
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub documents: Vec<DocumentReference>,
    #[serde(default)]
    pub service_contacts: Vec<ServiceContact>,
    #[serde(default)]
    pub team_contacts: Vec<TeamContact>,
}

impl RoutingRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            incident_types: BTreeSet::new(),
            incident_priorities: BTreeSet::new(),
            keywords: Vec::new(),
            documents: Vec::new(),
            service_contacts: Vec::new(),
            team_contacts: Vec::new(),
        }
    }

    pub fn with_incident_type(mut self, incident_type: impl Into<String>) -> Self {
        self.incident_types.insert(incident_type.into());
        self
    }

    pub fn with_incident_priority(mut self, priority: impl Into<String>) -> Self {
        self.incident_priorities.insert(priority.into());
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    pub fn with_document(mut self, document: DocumentReference) -> Self {
        self.documents.push(document);
        self
    }

    pub fn with_service_contact(mut self, contact: ServiceContact) -> Self {
        self.service_contacts.push(contact);
        self
    }

    pub fn with_team_contact(mut self, team: TeamContact) -> Self {
        self.team_contacts.push(team);
        self
    }

    /// Check the rule can ever score above zero
    pub fn validate(&self) -> Result<(), RoutingError> {
        if self.name.trim().is_empty() {
            return Err(RoutingError::InvalidRule("rule name is empty".to_string()));
        }

        let has_keyword = self.keywords.iter().any(|k| !k.trim().is_empty());
        if self.incident_types.is_empty() && self.incident_priorities.is_empty() && !has_keyword {
            return Err(RoutingError::InvalidRule(format!(
                "rule '{}' has no incident types, priorities or keywords",
                self.name
            )));
        }

        Ok(())
    }

    /// Score this rule against a request
    ///
    /// `lowered_text` is the request text already lowercased.
    fn score(&self, request: &RoutingRequest, lowered_text: &str) -> u32 {
        let types = self
            .incident_types
            .intersection(&request.context.incident_types)
            .count();
        let priorities = self
            .incident_priorities
            .intersection(&request.context.incident_priorities)
            .count();

        let mut keyword_hits = 0;
        let mut term_hits = 0;
        for keyword in &self.keywords {
            let keyword = keyword.trim().to_lowercase();
            if keyword.is_empty() {
                continue;
            }
            if lowered_text.contains(&keyword) {
                keyword_hits += 1;
            }
            if request
                .context
                .terms
                .iter()
                .any(|term| term.to_lowercase() == keyword)
            {
                term_hits += 1;
            }
        }

        (types + priorities + keyword_hits + term_hits) as u32
    }
}

/// A rule that scored above zero for a request
#[derive(Debug, Clone, Copy)]
pub struct RuleMatch<'a> {
    pub rule: &'a RoutingRule,
    pub score: u32,
}

/// Matches routing requests against an ordered set of rules
///
/// Rules keep their declaration order, which breaks ties between equal
/// scores.
#[derive(Debug, Clone, Default)]
pub struct RouteMatcher {
    rules: Vec<RoutingRule>,
}

impl RouteMatcher {
    /// Create a matcher with no rules
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create a matcher from rules in declaration order
    pub fn with_rules(rules: Vec<RoutingRule>) -> Result<Self, RoutingError> {
        let mut matcher = Self::new();
        for rule in rules {
            matcher.add_rule(rule)?;
        }
        Ok(matcher)
    }

    /// Append a rule after all existing ones
    pub fn add_rule(&mut self, rule: RoutingRule) -> Result<(), RoutingError> {
        rule.validate()?;
        if self.rules.iter().any(|r| r.name == rule.name) {
            return Err(RoutingError::InvalidRule(format!(
                "duplicate rule name '{}'",
                rule.name
            )));
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    /// Rules with a positive score, best first
    pub fn matches(&self, request: &RoutingRequest) -> Vec<RuleMatch<'_>> {
        if request.is_blank() {
            debug!("Blank routing request, nothing to match");
            return Vec::new();
        }

        let lowered_text = request.text.to_lowercase();

        let mut matches: Vec<RuleMatch<'_>> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let score = rule.score(request, &lowered_text);
                debug!(rule = %rule.name, score, "Scored routing rule");
                (score > 0).then_some(RuleMatch { rule, score })
            })
            .collect();

        // Stable sort keeps declaration order among equal scores
        matches.sort_by(|a, b| b.score.cmp(&a.score));
        matches
    }

    /// Build the recommendation skeleton for a request
    ///
    /// Individual contacts are left empty; they come from contact resolution.
    pub fn recommend(&self, request: &RoutingRequest) -> Recommendation {
        let mut recommendation = Recommendation::new();
        for m in self.matches(request) {
            recommendation.extend_from_rule(m.rule);
        }

        debug!(
            documents = recommendation.documents.len(),
            service_contacts = recommendation.service_contacts.len(),
            team_contacts = recommendation.team_contacts.len(),
            "Built recommendation"
        );

        recommendation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infra_rule() -> RoutingRule {
        RoutingRule::new("infra-database")
            .with_incident_type("infra")
            .with_keyword("database")
            .with_document(DocumentReference::new("D1", "https://docs.example.com/d1"))
            .with_service_contact(ServiceContact::new("ldap", "svc42"))
    }

    #[test]
    fn test_empty_request_matches_nothing() {
        let matcher = RouteMatcher::with_rules(vec![
            infra_rule(),
            RoutingRule::new("p1").with_incident_priority("P1"),
        ])
        .unwrap();

        let request = RoutingRequest::builder().build().unwrap();
        let recommendation = matcher.recommend(&request);
        assert!(recommendation.is_empty());
    }

    #[test]
    fn test_whitespace_only_request_matches_nothing() {
        let matcher = RouteMatcher::with_rules(vec![infra_rule()]).unwrap();
        let request = RoutingRequest::builder().text("   ").build().unwrap();

        assert!(request.is_blank());
        assert!(matcher.matches(&request).is_empty());
    }

    #[test]
    fn test_scenario_database_outage() {
        let matcher = RouteMatcher::with_rules(vec![infra_rule()]).unwrap();
        let request = RoutingRequest::builder()
            .text("database outage")
            .incident_type("infra")
            .incident_priority("P1")
            .build()
            .unwrap();

        let recommendation = matcher.recommend(&request);
        assert_eq!(recommendation.documents.len(), 1);
        assert_eq!(recommendation.documents[0].name, "D1");
        assert_eq!(
            recommendation.service_contacts,
            vec![ServiceContact::new("ldap", "svc42")]
        );
        assert!(recommendation.individual_contacts.is_empty());
    }

    #[test]
    fn test_keyword_in_text_is_case_insensitive() {
        let matcher = RouteMatcher::with_rules(vec![infra_rule()]).unwrap();
        let request = RoutingRequest::builder()
            .text("The DATABASE replica is lagging")
            .build()
            .unwrap();

        let matches = matcher.matches(&request);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].score, 1);
    }

    #[test]
    fn test_keyword_matches_request_terms() {
        let matcher = RouteMatcher::with_rules(vec![infra_rule()]).unwrap();
        let request = RoutingRequest::builder().term("Database").build().unwrap();

        let matches = matcher.matches(&request);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_scores_combine_signals() {
        let matcher = RouteMatcher::with_rules(vec![infra_rule()]).unwrap();
        let request = RoutingRequest::builder()
            .text("database outage")
            .incident_type("infra")
            .term("database")
            .build()
            .unwrap();

        let matches = matcher.matches(&request);
        // type + keyword in text + keyword in terms
        assert_eq!(matches[0].score, 3);
    }

    #[test]
    fn test_higher_score_first_and_ties_by_declaration_order() {
        let matcher = RouteMatcher::with_rules(vec![
            RoutingRule::new("low-a")
                .with_incident_priority("P1")
                .with_document(DocumentReference::new("A", "https://a")),
            RoutingRule::new("high")
                .with_incident_priority("P1")
                .with_keyword("outage")
                .with_document(DocumentReference::new("H", "https://h")),
            RoutingRule::new("low-b")
                .with_incident_priority("P1")
                .with_document(DocumentReference::new("B", "https://b")),
        ])
        .unwrap();

        let request = RoutingRequest::builder()
            .text("full outage")
            .incident_priority("P1")
            .build()
            .unwrap();

        let names: Vec<&str> = matcher
            .matches(&request)
            .iter()
            .map(|m| m.rule.name.as_str())
            .collect();
        assert_eq!(names, vec!["high", "low-a", "low-b"]);

        let docs: Vec<String> = matcher
            .recommend(&request)
            .documents
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(docs, vec!["H", "A", "B"]);
    }

    #[test]
    fn test_duplicates_across_rules_keep_first_seen() {
        let shared = DocumentReference::new("runbook", "https://runbook");
        let matcher = RouteMatcher::with_rules(vec![
            RoutingRule::new("first")
                .with_incident_type("infra")
                .with_document(shared.clone())
                .with_service_contact(ServiceContact::new("ldap", "svc42"))
                .with_team_contact(TeamContact::new("SRE", "sre@x.com")),
            RoutingRule::new("second")
                .with_incident_type("infra")
                .with_document(DocumentReference::new("other", "https://other"))
                .with_document(shared)
                .with_service_contact(ServiceContact::new("ldap", "svc42"))
                .with_team_contact(TeamContact::new("SRE", "sre@x.com")),
        ])
        .unwrap();

        let request = RoutingRequest::builder()
            .incident_type("infra")
            .build()
            .unwrap();
        let recommendation = matcher.recommend(&request);

        let docs: Vec<&str> = recommendation
            .documents
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(docs, vec!["runbook", "other"]);
        assert_eq!(recommendation.service_contacts.len(), 1);
        assert_eq!(recommendation.team_contacts.len(), 1);
    }

    #[test]
    fn test_non_matching_rules_excluded() {
        let matcher = RouteMatcher::with_rules(vec![infra_rule()]).unwrap();
        let request = RoutingRequest::builder()
            .text("login page is slow")
            .incident_type("frontend")
            .build()
            .unwrap();

        assert!(matcher.matches(&request).is_empty());
        assert!(matcher.recommend(&request).is_empty());
    }

    #[test]
    fn test_blank_keywords_never_match() {
        let rule = RoutingRule::new("blank")
            .with_incident_type("infra")
            .with_keyword("  ");
        let matcher = RouteMatcher::with_rules(vec![rule]).unwrap();

        let request = RoutingRequest::builder().text("anything").build().unwrap();
        assert!(matcher.matches(&request).is_empty());
    }

    #[test]
    fn test_rule_validation() {
        let mut matcher = RouteMatcher::new();
        assert!(matcher.add_rule(RoutingRule::new("")).is_err());
        assert!(matcher.add_rule(RoutingRule::new("no-criteria")).is_err());

        matcher.add_rule(infra_rule()).unwrap();
        let duplicate = matcher.add_rule(infra_rule());
        assert!(matches!(duplicate, Err(RoutingError::InvalidRule(_))));
        assert_eq!(matcher.rules().len(), 1);
    }
}
