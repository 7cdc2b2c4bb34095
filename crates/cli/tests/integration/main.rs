//! CLI integration tests that install into an isolated prefix.

mod common;
mod install_tests;
