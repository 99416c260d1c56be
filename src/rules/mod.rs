//! Rule packs: definitions, predicates, loading and the indexed store

pub mod loader;
pub mod pack;
pub mod predicate;
pub mod store;

pub use loader::{builtin, load_rule_pack, load_rule_packs_dir, parse_rule_pack};
pub use pack::{Environment, RulePack, Scope, Transform, WorldRule};
pub use predicate::{Condition, Pred, PredicateContext};
pub use store::RuleStore;
