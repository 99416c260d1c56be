//! Load rule packs from TOML

use std::fs;
use std::path::Path;

use crate::core::error::{HearthError, Result};
use crate::rules::pack::RulePack;

const HOME_PACK: &str = include_str!("../../data/rule_packs/home.toml");
const QUIET_HOURS_PACK: &str = include_str!("../../data/rule_packs/quiet_hours.toml");
const HOSPITAL_PACK: &str = include_str!("../../data/rule_packs/hospital.toml");
const OFFICE_PACK: &str = include_str!("../../data/rule_packs/office.toml");

/// Parse a single pack
pub fn parse_rule_pack(content: &str) -> Result<RulePack> {
    let pack: RulePack = toml::from_str(content)
        .map_err(|e| HearthError::InvalidRulePack(format!("Invalid TOML: {}", e)))?;

    if pack.id.trim().is_empty() {
        return Err(HearthError::InvalidRulePack("pack id is empty".into()));
    }
    if let Some(rule) = pack.rules.iter().find(|r| r.id.trim().is_empty()) {
        return Err(HearthError::InvalidRulePack(format!(
            "{}: rule with empty id (explain: '{}')",
            pack.id, rule.explain
        )));
    }

    for rule in &pack.rules {
        for key in rule.predicates().flat_map(|p| p.unknown_keys()) {
            tracing::debug!("{}: rule '{}' uses unrecognized predicate '{}'", pack.id, rule.id, key);
        }
    }

    Ok(pack)
}

/// Load a pack from a file
pub fn load_rule_pack(path: &Path) -> Result<RulePack> {
    let content = fs::read_to_string(path).map_err(|e| {
        HearthError::InvalidRulePack(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_rule_pack(&content)
}

/// Load every `*.toml` pack in a directory, ordered by file name
pub fn load_rule_packs_dir(dir: &Path) -> Result<Vec<RulePack>> {
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    paths.iter().map(|path| load_rule_pack(path)).collect()
}

/// Packs compiled into the binary
pub mod builtin {
    use super::*;

    pub fn home() -> Result<RulePack> {
        parse_rule_pack(HOME_PACK)
    }

    pub fn quiet_hours() -> Result<RulePack> {
        parse_rule_pack(QUIET_HOURS_PACK)
    }

    pub fn hospital() -> Result<RulePack> {
        parse_rule_pack(HOSPITAL_PACK)
    }

    pub fn office() -> Result<RulePack> {
        parse_rule_pack(OFFICE_PACK)
    }

    /// Home defaults plus quiet hours
    pub fn household() -> Result<Vec<RulePack>> {
        Ok(vec![home()?, quiet_hours()?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Variable;
    use crate::rules::pack::Scope;

    #[test]
    fn test_builtin_packs_parse() {
        let home = builtin::home().unwrap();
        assert_eq!(home.id, "home");
        assert!(home.active);
        assert!(home.rules.iter().any(|r| r.hard && r.then.target == Some(Variable::Temperature)));

        let quiet = builtin::quiet_hours().unwrap();
        assert!(quiet.rules.iter().all(|r| r.scope == Scope::Room));

        assert!(!builtin::hospital().unwrap().active);
        assert!(builtin::office().unwrap().active);
    }

    #[test]
    fn test_builtin_packs_have_no_unknown_predicates() {
        for pack in [
            builtin::home().unwrap(),
            builtin::quiet_hours().unwrap(),
            builtin::hospital().unwrap(),
            builtin::office().unwrap(),
        ] {
            for rule in &pack.rules {
                assert_eq!(rule.predicates().flat_map(|p| p.unknown_keys()).count(), 0, "{}", rule.id);
            }
        }
    }

    #[test]
    fn test_invalid_packs_rejected() {
        assert!(parse_rule_pack("id = ").is_err());
        assert!(parse_rule_pack("id = \"\"").is_err());
        assert!(parse_rule_pack("id = \"p\"\n[[rules]]\nid = \"\"\nscope = \"room\"").is_err());
        assert!(parse_rule_pack("id = \"p\"\n[[rules]]\nid = \"x\"\nscope = \"galaxy\"").is_err());
    }

    #[test]
    fn test_unknown_predicate_does_not_fail_parse() {
        let pack = parse_rule_pack(
            r#"
            id = "odd"
            [[rules]]
            id = "odd.moon"
            scope = "world"
            if = { moon_phase = "full" }
            "#,
        )
        .unwrap();
        assert_eq!(pack.rules[0].predicates().flat_map(|p| p.unknown_keys()).count(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_rule_pack(Path::new("/nonexistent/pack.toml"));
        assert!(matches!(result, Err(HearthError::InvalidRulePack(_))));
    }
}
