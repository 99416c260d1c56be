//! Indexed storage for the active rule set

use ahash::AHashMap;

use crate::rules::pack::{RulePack, Scope, WorldRule};
use crate::world::device::DeviceKind;

/// Active rules bucketed by `<scope>_<device type or "all">`
///
/// Buckets are ordered by descending priority, then rule id, so evaluation
/// order never depends on pack load order.
#[derive(Debug, Default)]
pub struct RuleStore {
    packs: Vec<RulePack>,
    cache: AHashMap<String, Vec<WorldRule>>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_packs(packs: Vec<RulePack>) -> Self {
        let mut store = Self::new();
        store.load_rule_packs(packs);
        store
    }

    /// Replace every loaded pack and rebuild the index from the active ones
    pub fn load_rule_packs(&mut self, packs: Vec<RulePack>) {
        self.cache.clear();
        self.packs = packs;

        let mut seen = std::collections::BTreeSet::new();
        for pack in self.packs.iter().filter(|p| p.active) {
            for rule in &pack.rules {
                if !seen.insert(rule.id.clone()) {
                    tracing::warn!("Duplicate rule id '{}' in pack '{}'", rule.id, pack.id);
                }
                if rule.hard && rule.then.target.is_none() && rule.then.alarm.is_none() {
                    tracing::warn!("Hard rule '{}' has neither a target nor an alarm", rule.id);
                }
                self.cache
                    .entry(rule.cache_key())
                    .or_default()
                    .push(rule.clone());
            }
        }

        for bucket in self.cache.values_mut() {
            bucket.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        }

        tracing::info!(
            "Loaded {} rule packs ({} active, {} rules indexed)",
            self.packs.len(),
            self.packs.iter().filter(|p| p.active).count(),
            self.rule_count()
        );
    }

    pub fn bucket(&self, key: &str) -> &[WorldRule] {
        self.cache.get(key).map(|r| r.as_slice()).unwrap_or(&[])
    }

    pub fn world_rules(&self) -> &[WorldRule] {
        self.bucket("world_all")
    }

    pub fn room_rules(&self) -> &[WorldRule] {
        self.bucket("room_all")
    }

    /// Generic device rules followed by rules for this device kind
    pub fn device_rules(&self, kind: DeviceKind) -> impl Iterator<Item = &WorldRule> {
        let specific = format!("{}_{}", Scope::Device.as_str(), kind.as_str());
        self.bucket("device_all")
            .iter()
            .chain(self.bucket(&specific).iter())
    }

    pub fn rule_count(&self) -> usize {
        self.cache.values().map(Vec::len).sum()
    }

    pub fn packs(&self) -> &[RulePack] {
        &self.packs
    }

    pub fn active_pack_ids(&self) -> Vec<&str> {
        self.packs
            .iter()
            .filter(|p| p.active)
            .map(|p| p.id.as_str())
            .collect()
    }

    pub fn find(&self, rule_id: &str) -> Option<&WorldRule> {
        self.cache.values().flatten().find(|r| r.id == rule_id)
    }
}
