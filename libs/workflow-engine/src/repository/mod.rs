//! Typed CRUD wrappers over the generic `Store` (§2 items 4-7).

pub mod approval;
pub mod definition;
pub mod instance;
pub mod trigger;

pub use approval::ApprovalRepository;
pub use definition::DefinitionRepository;
pub use instance::InstanceRepository;
pub use trigger::TriggerRepository;
