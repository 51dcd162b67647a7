//! Test utilities.
//!
//! This module provides:
//! - Test data factories and webhook payload builders
//! - An in-memory ledger standing in for Postgres
//! - A scripted payment gateway with catalog and merchant fakes
//! - `TestAppStateBuilder` for route tests

mod factories;
mod gateway_mocks;
mod ledger_mocks;

pub use app_state_builder::*;
pub use factories::*;
pub use gateway_mocks::*;
pub use ledger_mocks::*;
