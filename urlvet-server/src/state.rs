use std::{fmt, sync::Arc};

use urlvet_config::Config;
use urlvet_core::{ScanMetrics, ScanResolver, ScanStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub scans: Arc<dyn ScanStore>,
    pub users: Arc<dyn UserStore>,
    pub resolver: Arc<ScanResolver>,
    pub metrics: Arc<ScanMetrics>,
    pub config: Arc<Config>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
