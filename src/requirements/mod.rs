//! Command preconditions.
//!
//! Each command declares what it needs in a [`CommandMetadata`]; the factory
//! turns that into an ordered [`RequirementChain`] that is evaluated before
//! the command does anything else.

mod chain;
mod factory;
mod requirement;

pub use chain::RequirementChain;
pub use factory::{CommandArgs, CommandMetadata, DeprecatedFlag, RequirementFactory};
pub use requirement::{Requirement, RequirementContext};
