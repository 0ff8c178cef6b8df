//! Workspace integration tests for the Mimir AIP core substrate (spec §8
//! seed scenarios). No public API of its own; see `tests/*.rs`.
