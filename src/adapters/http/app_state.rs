use std::sync::Arc;

use crate::{
    infra::config::AppConfig,
    use_cases::{ledger::Ledgers, reconciliation::ReconciliationEngine},
};

pub struct AppState<S: Ledgers> {
    pub config: Arc<AppConfig>,
    pub engine: Arc<ReconciliationEngine<S>>,
}

// Manual impl: derive would demand `S: Clone`.
impl<S: Ledgers> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            engine: self.engine.clone(),
        }
    }
}
