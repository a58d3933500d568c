// Per-principal folder access rules

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{GalleryError, Result};

/// Decides whether a principal may see a file or folder.
pub trait AccessControl: Send + Sync {
    fn is_allowed(&self, principal: &str, path: &Path) -> bool;
}

/// Everything is visible to everyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessControl for AllowAll {
    fn is_allowed(&self, _principal: &str, _path: &Path) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Deny,
}

impl Action {
    fn allows(self) -> bool {
        self == Action::Allow
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrincipalRules {
    pub principal: String,
    pub action: Action,
    #[serde(default)]
    pub folder_whitelist: Vec<PathBuf>,
    #[serde(default)]
    pub folder_blacklist: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RulesAccessControl {
    pub default_action: Action,
    #[serde(default)]
    pub rules: Vec<PrincipalRules>,
}

impl RulesAccessControl {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| GalleryError::Config(format!("access rules: {}", e)))
    }

    /// Read a rules file. A missing or broken file allows everything.
    pub fn load(path: &Path) -> Self {
        let parsed = std::fs::read_to_string(path)
            .map_err(GalleryError::from)
            .and_then(|content| Self::from_toml(&content));

        match parsed {
            Ok(rules) => {
                log::info!("Loaded {} access rules from {}", rules.rules.len(), path.display());
                rules
            }
            Err(e) => {
                log::warn!("No usable rules file at {} ({}), allowing all", path.display(), e);
                Self::allow_all()
            }
        }
    }

    pub fn allow_all() -> Self {
        Self { default_action: Action::Allow, rules: Vec::new() }
    }

    fn rules_for(&self, principal: &str) -> Option<&PrincipalRules> {
        self.rules.iter().find(|r| r.principal == principal)
    }
}

impl AccessControl for RulesAccessControl {
    fn is_allowed(&self, principal: &str, path: &Path) -> bool {
        let Some(rules) = self.rules_for(principal) else {
            return self.default_action.allows();
        };

        if rules.folder_blacklist.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }

        // A directory above a whitelisted folder stays reachable
        let is_dir = path.is_dir();
        if rules
            .folder_whitelist
            .iter()
            .any(|dir| path.starts_with(dir) || (is_dir && dir.starts_with(path)))
        {
            return true;
        }

        rules.action.allows()
    }
}

/// Rules from the configured file, or allow-all when none is configured.
pub fn from_settings(rules_file: Option<&Path>) -> Box<dyn AccessControl> {
    match rules_file {
        Some(path) => Box::new(RulesAccessControl::load(path)),
        None => Box::new(AllowAll),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RULES: &str = r#"
        default_action = "deny"

        [[rules]]
        principal = "1@1"
        action = "deny"
        folder_whitelist = ["/a/w1", "/a/w2"]
        folder_blacklist = ["/a/b1", "/a/b2"]

        [[rules]]
        principal = "2@2"
        action = "allow"
        folder_whitelist = ["/a/w3", "/a/w4"]
        folder_blacklist = ["/a/b3", "/a/b4"]
    "#;

    #[test]
    fn test_parses_rules() {
        let rules = RulesAccessControl::from_toml(RULES).unwrap();
        assert_eq!(rules.default_action, Action::Deny);
        assert_eq!(rules.rules.len(), 2);
        assert_eq!(rules.rules[0].principal, "1@1");
        assert_eq!(rules.rules[0].action, Action::Deny);
        assert_eq!(rules.rules[0].folder_whitelist, vec![PathBuf::from("/a/w1"), PathBuf::from("/a/w2")]);
        assert_eq!(rules.rules[1].folder_blacklist, vec![PathBuf::from("/a/b3"), PathBuf::from("/a/b4")]);
    }

    #[test]
    fn test_decision_matrix() {
        let rules = RulesAccessControl::from_toml(RULES).unwrap();
        let cases = [
            ("1@1", "/a/", false),
            ("1@1", "/a/w1", true),
            ("1@1", "/a/w2/photo.jpg", true),
            ("1@1", "/a/w3", false),
            ("1@1", "/a/b1", false),
            ("1@1", "/a/b2", false),
            ("2@2", "/a/", true),
            ("2@2", "/a/w1", true),
            ("2@2", "/a/w3", true),
            ("2@2", "/a/b1", true),
            ("2@2", "/a/b3", false),
            ("2@2", "/a/b4/deep/x.jpg", false),
            ("3@3", "/a/", false),
        ];
        for (principal, path, expected) in cases {
            assert_eq!(
                rules.is_allowed(principal, Path::new(path)),
                expected,
                "{} on {}",
                principal,
                path
            );
        }
    }

    #[test]
    fn test_prefix_is_by_component() {
        let rules = RulesAccessControl::from_toml(RULES).unwrap();
        // "/a/b30" is not inside "/a/b3"
        assert!(rules.is_allowed("2@2", Path::new("/a/b30")));
    }

    #[test]
    fn test_parent_of_whitelisted_dir_is_visible() {
        let tmp = TempDir::new().unwrap();
        let parent = tmp.path().join("family");
        let shared = parent.join("shared");
        std::fs::create_dir_all(&shared).unwrap();

        let rules = RulesAccessControl {
            default_action: Action::Deny,
            rules: vec![PrincipalRules {
                principal: "guest".into(),
                action: Action::Deny,
                folder_whitelist: vec![shared.clone()],
                folder_blacklist: vec![],
            }],
        };

        assert!(rules.is_allowed("guest", &parent));
        assert!(rules.is_allowed("guest", &shared.join("a.jpg")));
        assert!(!rules.is_allowed("guest", &tmp.path().join("other")));
    }

    #[test]
    fn test_missing_or_invalid_file_allows_all() {
        let tmp = TempDir::new().unwrap();
        let missing = RulesAccessControl::load(&tmp.path().join("rules.toml"));
        assert!(missing.is_allowed("anyone", Path::new("/x")));

        let broken = tmp.path().join("broken.toml");
        std::fs::write(&broken, "default_action = maybe").unwrap();
        assert!(RulesAccessControl::load(&broken).is_allowed("anyone", Path::new("/x")));
    }

    #[test]
    fn test_allow_all() {
        assert!(AllowAll.is_allowed("", Path::new("/")));
        assert!(from_settings(None).is_allowed("x", Path::new("/y")));
    }
}
