mod bus;

pub use bus::{AutomationEvent, DropReason, EventBus};
