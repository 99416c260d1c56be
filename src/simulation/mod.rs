pub mod analytics;
pub mod apply;
pub mod causal;
pub mod conflict;
pub mod director;
pub mod mediator;
pub mod rate_limit;
pub mod rule_eval;
pub mod runtime;
pub mod tick;
pub mod utility;

pub use analytics::{household_health, room_health, DivergenceEntry, DivergenceSample};
pub use causal::{CausalLink, CausalTracker};
pub use conflict::{detect_conflicts, ConflictRecord, ConflictType, Severity};
pub use director::{DirectorState, ForcedEvent};
pub use mediator::{mediate, ConflictResolution, Mediation, MediationContext};
pub use rate_limit::limit_action;
pub use rule_eval::{evaluate_rules, EvalContext, HardPass, RuleEvaluation, RuleFiring, SoftHint};
pub use runtime::{Runtime, RuntimeHandle};
pub use tick::TickReport;
pub use utility::{goal_alignment, score_action, UtilityScore};
