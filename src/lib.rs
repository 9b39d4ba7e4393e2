// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # cfpush
//!
//! Declarative, idempotent application push for platform-as-a-service
//! control planes.
//!
//! ## Overview
//!
//! A push takes the applications described by a manifest and command-line
//! flags and makes the control plane match them, touching only what differs:
//!
//! - Check the command's preconditions (endpoint, login, target, API version)
//! - Resolve the desired state of every application
//! - Observe each application's current state and plan an ordered change set
//! - Apply the change set, staging and starting when needed
//! - Render the planned differences as a readable diff
//!
//! Applications are handled concurrently; one failing application never
//! affects another.
//!
//! ## Modules
//!
//! - [`requirements`]: Command preconditions
//! - [`config`]: Manifest loading, desired-state resolution, session and settings
//! - [`artifact`]: Application bits and their digest
//! - [`remote`]: Control plane client, state observation, retry and job polling
//! - [`planner`]: Diff planning and change set execution
//! - [`render`]: Diff rendering
//! - [`push`]: Multi-application orchestration
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! applications:
//!   - name: web
//!     path: ./web
//!     buildpacks:
//!       - ruby_buildpack
//!     instances: 2
//!     memory: 512M
//!     routes:
//!       - route: web.example.com
//!     env:
//!       RACK_ENV: production
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod artifact;
pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod push;
pub mod remote;
pub mod render;
pub mod requirements;

// ============================================================================
// Re-exports
// ============================================================================

pub use artifact::Artifact;
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ApplicationSpec, DesiredStateResolver, ManifestLoader, Session, SessionStore};
pub use error::{PushError, Result};
pub use planner::{ApplyExecutor, ChangeSet, DiffPlanner};
pub use push::{PushOptions, PushReport, Pusher};
pub use remote::{HttpRemoteClient, RemoteClient};
pub use render::DiffRenderer;
pub use requirements::{RequirementChain, RequirementFactory};
