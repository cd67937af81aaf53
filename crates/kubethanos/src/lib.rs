//! kubethanos - periodic pod chaos for Kubernetes clusters.
//!
//! Every interval the controller lists pods, narrows them down to the configured
//! namespace scope, drops pods that are already terminating, and deletes a random
//! share of what is left.
//!
//! # Architecture
//!
//! - [`selector`] parses the namespace scope expression (label-selector syntax)
//! - [`filter`] applies the scope and liveness rules to a pod list
//! - [`sampler`] draws the random victim subset
//! - [`store`] and [`events`] are the seams to the Kubernetes API
//! - [`executor`] terminates a single victim (or pretends to, in dry-run mode)
//! - [`engine`] composes selection and termination into one cycle
//! - [`control_loop`] runs cycles on a ticker until shutdown
//! - [`config`] and [`health`] are the process surface used by the binary

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod control_loop;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod filter;
pub mod health;
pub mod instance;
pub mod sampler;
pub mod selector;
pub mod store;

pub use config::{Args, ChaosConfig};
pub use control_loop::ControlLoop;
pub use engine::{ChaosEngine, CycleReport, Selection, SelectionEngine};
pub use error::{CycleError, ScopeError, SelectError, StoreError, TerminationError};
pub use events::{EventEmitter, EventKind, KubeEventEmitter};
pub use executor::TerminationExecutor;
pub use instance::Instance;
pub use selector::{Operator, Requirement, ScopeSelector};
pub use store::{InstanceStore, KubeInstanceStore};
