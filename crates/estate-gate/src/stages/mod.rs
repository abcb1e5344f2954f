//! Built-in gate stages.

pub mod identity;
pub mod organization;
pub mod policy;

pub use identity::IdentityStage;
pub use organization::OrganizationStage;
pub use policy::PolicyStage;
