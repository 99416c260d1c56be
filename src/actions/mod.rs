//! Device actions: the catalog and the proposal wire format

pub mod catalog;
pub mod request;

pub use catalog::{ActionCategory, ActionKind};
pub use request::{ActionArgs, ActionRequest, DevicePlan, ProposedAction};
