//! Keyword classifier. Substring matching only, no I/O.
//!
//! Two questions are answered from the same case-folded text:
//! - is this a recruiting inquiry? (any recruiting keyword present)
//! - which role does it imply? (first vocabulary in priority order with a hit)
//!
//! Matching is plain substring search. A keyword inside an unrelated word
//! still counts.

use tracing::debug;

use crate::config::TriageConfig;
use crate::pipeline::types::RoleTag;

/// Pure keyword classifier.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    recruiting: Vec<String>,
    /// Vocabularies in `RoleTag::PRIORITY` order.
    roles: Vec<(RoleTag, Vec<String>)>,
}

impl KeywordClassifier {
    /// Build from the keyword lists in `config`.
    pub fn new(config: &TriageConfig) -> Self {
        let recruiting = fold_all(&config.keywords);
        let roles = RoleTag::PRIORITY
            .iter()
            .map(|role| (*role, fold_all(config.roles.terms(*role))))
            .collect();
        Self { recruiting, roles }
    }

    /// Whether subject, body or sender contain any recruiting keyword.
    pub fn is_recruiting_signal(&self, subject: &str, body: &str, sender: &str) -> bool {
        let text = format!("{subject} {body} {sender}").to_lowercase();
        let hit = self.recruiting.iter().find(|k| text.contains(k.as_str()));
        if let Some(keyword) = hit {
            debug!(keyword = %keyword, "Recruiting keyword matched");
        }
        hit.is_some()
    }

    /// First role (in priority order) whose vocabulary matches, if any.
    pub fn detect_role(&self, subject: &str, body: &str) -> Option<RoleTag> {
        let text = format!("{subject} {body}").to_lowercase();
        for (role, terms) in &self.roles {
            if let Some(term) = terms.iter().find(|t| text.contains(t.as_str())) {
                debug!(role = %role, term = %term, "Role vocabulary matched");
                return Some(*role);
            }
        }
        None
    }
}

/// Whether `address` contains any exclusion pattern (case-insensitive).
pub fn is_excluded(address: &str, patterns: &[String]) -> bool {
    let address = address.to_lowercase();
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .any(|p| address.contains(&p.to_lowercase()))
}

fn fold_all(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::config::{ContactDetails, RoleVocabularies};

    fn config() -> TriageConfig {
        TriageConfig::with_contact(ContactDetails {
            name: "Test".into(),
            email: "me@example.com".into(),
            phone: None,
            profile_url: None,
            rate: "$60/hour".into(),
            availability: "Now".into(),
        })
    }

    /// Vocabularies with no shared substrings, for priority tests.
    fn disjoint_config() -> TriageConfig {
        let mut config = config();
        config.roles = RoleVocabularies {
            dft: vec!["atpg".into()],
            physical_design: vec!["floorplan".into()],
            verification: vec!["testbench".into()],
            devops: vec!["kubernetes".into()],
        };
        config
    }

    #[test]
    fn recruiting_keyword_in_subject() {
        let c = KeywordClassifier::new(&config());
        assert!(c.is_recruiting_signal("Hiring now", "", "a@b.com"));
    }

    #[test]
    fn recruiting_keyword_case_insensitive() {
        let c = KeywordClassifier::new(&config());
        assert!(c.is_recruiting_signal("", "We have a DEVOPS opening", "a@b.com"));
    }

    #[test]
    fn recruiting_keyword_in_sender() {
        let c = KeywordClassifier::new(&config());
        assert!(c.is_recruiting_signal("Hello", "Quick note", "recruiter@agency.com"));
    }

    #[test]
    fn newsletter_is_not_recruiting() {
        let c = KeywordClassifier::new(&config());
        assert!(!c.is_recruiting_signal(
            "Quarterly Newsletter",
            "Here is what happened this quarter.",
            "news@company.com"
        ));
    }

    #[test]
    fn substring_false_positive_is_accepted() {
        // "role" inside "controller" still counts.
        let c = KeywordClassifier::new(&config());
        assert!(c.is_recruiting_signal("Your controller", "", "x@y.com"));
    }

    #[test]
    fn detects_devops_scenario() {
        let c = KeywordClassifier::new(&config());
        let role = c.detect_role(
            "DevOps Contract Role",
            "We are hiring a Kubernetes and Terraform engineer. Remote.",
        );
        assert_eq!(role, Some(RoleTag::Devops));
    }

    #[test]
    fn detects_dft() {
        let c = KeywordClassifier::new(&config());
        assert_eq!(
            c.detect_role("Opening", "ATPG and JTAG experience required"),
            Some(RoleTag::Dft)
        );
    }

    #[test]
    fn dft_beats_devops_when_both_match() {
        let c = KeywordClassifier::new(&config());
        assert_eq!(
            c.detect_role("DFT engineer", "Jenkins and docker a plus"),
            Some(RoleTag::Dft)
        );
    }

    #[test]
    fn verification_beats_devops() {
        let c = KeywordClassifier::new(&disjoint_config());
        assert_eq!(
            c.detect_role("kubernetes", "testbench"),
            Some(RoleTag::Verification)
        );
    }

    #[test]
    fn no_role_detected() {
        let c = KeywordClassifier::new(&disjoint_config());
        assert_eq!(c.detect_role("Hello", "Nothing relevant here"), None);
    }

    #[test]
    fn empty_vocabulary_never_matches() {
        let mut config = disjoint_config();
        config.roles.dft = vec!["".into(), "   ".into()];
        let c = KeywordClassifier::new(&config);
        assert_eq!(c.detect_role("anything", "at all"), None);
    }

    #[test]
    fn exclusion_is_case_insensitive_substring() {
        let patterns = vec!["noreply@".to_string(), "LinkedIn.com".to_string()];
        assert!(is_excluded("NoReply@service.io", &patterns));
        assert!(is_excluded("jobs-listings@linkedin.com", &patterns));
        assert!(!is_excluded("recruiter@acme.com", &patterns));
    }

    #[test]
    fn empty_exclusion_pattern_is_ignored() {
        assert!(!is_excluded("a@b.com", &[String::new()]));
    }

    const TERMS: [(&str, RoleTag); 4] = [
        ("atpg", RoleTag::Dft),
        ("floorplan", RoleTag::PhysicalDesign),
        ("testbench", RoleTag::Verification),
        ("kubernetes", RoleTag::Devops),
    ];

    proptest! {
        #[test]
        fn highest_priority_vocabulary_wins(
            picks in proptest::collection::vec(0usize..4, 1..8),
            filler in "[x-z ]{0,20}",
        ) {
            let c = KeywordClassifier::new(&disjoint_config());
            let body = picks
                .iter()
                .map(|i| TERMS[*i].0)
                .collect::<Vec<_>>()
                .join(&filler);
            let expected = RoleTag::PRIORITY
                .iter()
                .copied()
                .find(|role| picks.iter().any(|i| TERMS[*i].1 == *role));
            prop_assert_eq!(c.detect_role("", &body), expected);
        }

        #[test]
        fn detection_is_deterministic(subject in ".{0,40}", body in ".{0,200}") {
            let c = KeywordClassifier::new(&config());
            prop_assert_eq!(c.detect_role(&subject, &body), c.detect_role(&subject, &body));
            prop_assert_eq!(
                c.is_recruiting_signal(&subject, &body, "a@b.com"),
                c.is_recruiting_signal(&subject, &body, "a@b.com")
            );
        }

        #[test]
        fn text_without_vocabulary_letters_has_no_role(body in "[0-9 ]{0,100}") {
            let c = KeywordClassifier::new(&disjoint_config());
            prop_assert_eq!(c.detect_role("", &body), None);
        }
    }
}
