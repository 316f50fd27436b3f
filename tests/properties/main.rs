//! Property-based tests for the bundle codec and the risk scanner.

mod roundtrip_tests;
mod safety_tests;
