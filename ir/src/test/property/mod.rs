//! Property-based tests for matching and rewriting.
//!
//! Uses proptest to check rewrite invariants over randomly grown graphs.

#[cfg(test)]
mod rewrite_props;
