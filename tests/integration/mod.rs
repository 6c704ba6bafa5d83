//! Integration test suite for stampede.
//!
//! These tests exercise the full path from a plan file on disk through
//! parsing, store construction, and driver execution, plus the summary
//! reporting and git snapshot surfaces.
//!
//! # Test Categories
//!
//! - `scenarios`: End-to-end execution runs over plan files
//! - `plan_files`: Plan parsing from real files, including error cases
//! - `report`: Run summary JSON shape and rendering
//! - `snapshot_git`: Repository capture against real git repositories
//!
//! # CI Compatibility
//!
//! Execution uses the built-in instant and simulated executors; the git
//! tests create throwaway repositories under a temp directory. Nothing
//! touches the network or the user's home directory.


mod plan_files;
mod report;
mod scenarios;
mod snapshot_git;
