//! keg-lib: declarative, dependency-ordered formula builds.
//!
//! The pipeline for one formula runs top to bottom:
//! - `options`: resolve declared build options against user overrides
//! - `graph`: order the formula after its active dependencies
//! - `plan`: turn options and platform facts into concrete build steps
//! - `execute`: run those steps through an injected [`execute::Executor`]
//! - `link`: relink static archives into shared objects per variant
//! - `install`: copy into an isolated keg and expose narrow symlinks
//! - `verify`: exercise the installed tools in a later invocation

pub mod config;
pub mod consts;
pub mod execute;
pub mod formula;
pub mod graph;
pub mod install;
pub mod link;
pub mod options;
pub mod pipeline;
pub mod plan;
pub mod platform;
pub mod prefix;
pub mod prefix_lock;
pub mod record;
pub mod util;
pub mod variant;
pub mod verify;
