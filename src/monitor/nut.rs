//! UPS status provider backed by the NUT `upsc` client.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::error;

use crate::config::types::NutSettings;
use crate::monitor::UpsStatusProvider;
use crate::system::executor::run_upsc;
use crate::system::parser::parse_upsc_vars;

pub struct NutUpsMonitor {
    username: Option<String>,
    password: Option<String>,
}

impl NutUpsMonitor {
    pub fn new(settings: &NutSettings) -> Self {
        Self {
            username: settings.username.clone(),
            password: settings.password.clone(),
        }
    }
}

#[async_trait]
impl UpsStatusProvider for NutUpsMonitor {
    async fn query(&self, ups_id: &str) -> HashMap<String, String> {
        match run_upsc(ups_id, self.username.as_deref(), self.password.as_deref()).await {
            Ok(out) => parse_upsc_vars(&out),
            Err(e) => {
                error!("Failed to get UPS status: {:#}", e);
                HashMap::new()
            }
        }
    }
}
