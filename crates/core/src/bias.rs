//! Phrase-bias groups.
//!
//! Bias values are applied by the generation layer, not here. The context
//! engine only decides which groups are *active* for a pass, based on whether
//! the field that owns a group ended up in the context.

use serde::{Deserialize, Serialize};

/// A group of phrases biased together, optionally owned by a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasGroup {
    /// Identifier of the owning field; `None` for a global group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    pub phrases: Vec<String>,

    #[serde(default)]
    pub bias: f32,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Active when the owner is *excluded* instead of included.
    #[serde(default)]
    pub when_inactive: bool,
}

fn default_true() -> bool {
    true
}

/// Summary of a group that is active for a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveBias {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub phrases: Vec<String>,
    pub bias: f32,
    pub when_inactive: bool,
}

impl BiasGroup {
    /// Whether the group applies, given a lookup of each field's inclusion.
    ///
    /// `included` returns `None` for identifiers not considered in the pass;
    /// groups owned by such identifiers stay inactive.
    pub fn is_active<F>(&self, included: F) -> bool
    where
        F: Fn(&str) -> Option<bool>,
    {
        if !self.enabled {
            return false;
        }
        match &self.owner {
            None => true,
            Some(owner) => match included(owner) {
                Some(true) => !self.when_inactive,
                Some(false) => self.when_inactive,
                None => false,
            },
        }
    }

    pub fn summary(&self) -> ActiveBias {
        ActiveBias {
            owner: self.owner.clone(),
            phrases: self.phrases.clone(),
            bias: self.bias,
            when_inactive: self.when_inactive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(owner: Option<&str>, when_inactive: bool) -> BiasGroup {
        BiasGroup {
            owner: owner.map(str::to_string),
            phrases: vec!["dragon".into()],
            bias: 0.5,
            enabled: true,
            when_inactive,
        }
    }

    #[test]
    fn global_group_is_active_when_enabled() {
        assert!(group(None, false).is_active(|_| None));
        let mut disabled = group(None, false);
        disabled.enabled = false;
        assert!(!disabled.is_active(|_| None));
    }

    #[test]
    fn owned_group_follows_owner() {
        let g = group(Some("dragon"), false);
        assert!(g.is_active(|id| (id == "dragon").then_some(true)));
        assert!(!g.is_active(|_| Some(false)));
    }

    #[test]
    fn when_inactive_inverts() {
        let g = group(Some("dragon"), true);
        assert!(g.is_active(|_| Some(false)));
        assert!(!g.is_active(|_| Some(true)));
    }

    #[test]
    fn unknown_owner_stays_inactive() {
        assert!(!group(Some("ghost"), true).is_active(|_| None));
    }
}
