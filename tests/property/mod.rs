//! Property-based tests for ordering and lifecycle guarantees
