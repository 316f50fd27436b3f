//! Integration tests for artpack.
//!
//! Each test builds its own scratch project under a temp dir and drives the
//! library API end to end.

#[macro_use]
mod fixture;

mod bundle_tests;
mod loader_tests;
