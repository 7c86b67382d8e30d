//! Compliance rules form
//!
//! The rules editor is a set of `{category, enabled}` toggles. Saving turns
//! the toggles back into a [`ComplianceRules`] document in which exactly the
//! enabled categories are switched on; thresholds are carried over untouched.

use mpol_common::api::ComplianceRules;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bias groups always offered by the form
pub const KNOWN_BIAS_GROUPS: [&str; 4] = ["gender", "race", "age", "religion"];

/// One toggleable rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Copyright,
    BiasDetection,
    ExplicitContent,
    HateSpeech,
    /// A lyric bias group checked when bias detection runs
    BiasGroup(String),
}

impl RuleCategory {
    /// Parse `copyright`, `bias_detection`, `explicit_content`, `hate_speech` or `bias:<group>`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "copyright" => Some(RuleCategory::Copyright),
            "bias_detection" | "bias" => Some(RuleCategory::BiasDetection),
            "explicit_content" => Some(RuleCategory::ExplicitContent),
            "hate_speech" => Some(RuleCategory::HateSpeech),
            other => other
                .strip_prefix("bias:")
                .filter(|g| !g.is_empty())
                .map(|g| RuleCategory::BiasGroup(g.to_string())),
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCategory::Copyright => write!(f, "copyright"),
            RuleCategory::BiasDetection => write!(f, "bias_detection"),
            RuleCategory::ExplicitContent => write!(f, "explicit_content"),
            RuleCategory::HateSpeech => write!(f, "hate_speech"),
            RuleCategory::BiasGroup(group) => write!(f, "bias:{group}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryToggle {
    pub category: RuleCategory,
    pub enabled: bool,
}

/// Editable rules form
#[derive(Debug, Clone, PartialEq)]
pub struct RulesForm {
    toggles: Vec<CategoryToggle>,
    base: ComplianceRules,
}

impl RulesForm {
    /// Build the toggles shown for `rules`
    pub fn from_rules(rules: &ComplianceRules) -> Self {
        let mut toggles = vec![
            CategoryToggle {
                category: RuleCategory::Copyright,
                enabled: rules.copyright_rules.enabled,
            },
            CategoryToggle {
                category: RuleCategory::BiasDetection,
                enabled: rules.bias_detection.enabled,
            },
            CategoryToggle {
                category: RuleCategory::ExplicitContent,
                enabled: rules.content_filtering.explicit_content,
            },
            CategoryToggle {
                category: RuleCategory::HateSpeech,
                enabled: rules.content_filtering.hate_speech,
            },
        ];

        let mut groups: Vec<String> = KNOWN_BIAS_GROUPS.iter().map(|g| g.to_string()).collect();
        for group in &rules.bias_detection.categories {
            let group = group.to_lowercase();
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        for group in groups {
            let enabled = rules
                .bias_detection
                .categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&group));
            toggles.push(CategoryToggle {
                category: RuleCategory::BiasGroup(group),
                enabled,
            });
        }

        Self {
            toggles,
            base: rules.clone(),
        }
    }

    pub fn toggles(&self) -> &[CategoryToggle] {
        &self.toggles
    }

    /// Set one toggle, adding it if the category is new
    pub fn set(&mut self, category: RuleCategory, enabled: bool) {
        match self.toggles.iter_mut().find(|t| t.category == category) {
            Some(toggle) => toggle.enabled = enabled,
            None => self.toggles.push(CategoryToggle { category, enabled }),
        }
    }

    /// Apply a batch of toggles
    pub fn apply(&mut self, toggles: impl IntoIterator<Item = CategoryToggle>) {
        for toggle in toggles {
            self.set(toggle.category, toggle.enabled);
        }
    }

    pub fn is_enabled(&self, category: &RuleCategory) -> bool {
        self.toggles
            .iter()
            .any(|t| &t.category == category && t.enabled)
    }

    pub fn enabled_categories(&self) -> Vec<RuleCategory> {
        self.toggles
            .iter()
            .filter(|t| t.enabled)
            .map(|t| t.category.clone())
            .collect()
    }

    /// Rules document with exactly the enabled categories switched on
    pub fn to_rules(&self) -> ComplianceRules {
        let mut rules = self.base.clone();
        rules.copyright_rules.enabled = self.is_enabled(&RuleCategory::Copyright);
        rules.bias_detection.enabled = self.is_enabled(&RuleCategory::BiasDetection);
        rules.content_filtering.explicit_content = self.is_enabled(&RuleCategory::ExplicitContent);
        rules.content_filtering.hate_speech = self.is_enabled(&RuleCategory::HateSpeech);
        rules.bias_detection.categories = self
            .toggles
            .iter()
            .filter(|t| t.enabled)
            .filter_map(|t| match &t.category {
                RuleCategory::BiasGroup(group) => Some(group.clone()),
                _ => None,
            })
            .collect();
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_reflects_rules() {
        let form = RulesForm::from_rules(&ComplianceRules::default());
        assert!(!form.is_enabled(&RuleCategory::Copyright));
        assert!(form.is_enabled(&RuleCategory::HateSpeech));
        assert!(form.is_enabled(&RuleCategory::BiasGroup("race".to_string())));
        assert!(!form.is_enabled(&RuleCategory::BiasGroup("religion".to_string())));
    }

    #[test]
    fn test_persists_exactly_enabled_set() {
        let mut form = RulesForm::from_rules(&ComplianceRules::default());
        form.apply([
            CategoryToggle { category: RuleCategory::Copyright, enabled: true },
            CategoryToggle { category: RuleCategory::HateSpeech, enabled: false },
            CategoryToggle {
                category: RuleCategory::BiasGroup("race".to_string()),
                enabled: false,
            },
            CategoryToggle {
                category: RuleCategory::BiasGroup("religion".to_string()),
                enabled: true,
            },
        ]);

        let rules = form.to_rules();
        assert!(rules.copyright_rules.enabled);
        assert!(!rules.content_filtering.hate_speech);
        assert_eq!(rules.bias_detection.categories, vec!["gender", "age", "religion"]);
        assert_eq!(rules.copyright_rules.similarity_threshold, 0.7);
    }

    #[test]
    fn test_unknown_group_from_backend_is_kept() {
        let mut rules = ComplianceRules::default();
        rules.bias_detection.categories.push("Disability".to_string());
        let form = RulesForm::from_rules(&rules);
        assert!(form.is_enabled(&RuleCategory::BiasGroup("disability".to_string())));
    }

    #[test]
    fn test_category_parse_round_trip() {
        for name in ["copyright", "bias_detection", "explicit_content", "hate_speech", "bias:age"] {
            let category = RuleCategory::parse(name).unwrap();
            assert_eq!(category.to_string(), name);
        }
        assert_eq!(RuleCategory::parse("bias:"), None);
        assert_eq!(RuleCategory::parse("volume"), None);
    }
}
