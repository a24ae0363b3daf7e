use std::sync::Arc;

use folio_kernel::{ActivityLogger, Kernel, SettingsStore};
use folio_policy::AccessGate;

use crate::auth::{AuthContext, HeaderAuth};

/// Shared by every handler. Cheap to clone: the storage services hold only
/// the database path and the gate holds an `Arc` of the loaded policy.
#[derive(Clone)]
pub(crate) struct AppState {
    settings: SettingsStore,
    activity: ActivityLogger,
    gate: AccessGate,
    auth: Arc<dyn AuthContext>,
}

impl AppState {
    pub fn new(kernel: Kernel, gate: AccessGate) -> Self {
        Self {
            settings: kernel.settings(),
            activity: kernel.activity(),
            gate,
            auth: Arc::new(HeaderAuth),
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn with_auth(mut self, auth: Arc<dyn AuthContext>) -> Self {
        self.auth = auth;
        self
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn activity(&self) -> &ActivityLogger {
        &self.activity
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    pub fn auth(&self) -> &dyn AuthContext {
        self.auth.as_ref()
    }
}
