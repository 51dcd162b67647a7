pub mod ledger;
pub mod reconciliation;
