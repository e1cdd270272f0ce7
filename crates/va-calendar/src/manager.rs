use std::collections::HashMap;

use tracing::info;

use crate::adapter::CalendarAdapter;

/// Holds one adapter per provider, keyed by [`CalendarAdapter::name`].
///
/// Unlike the channel-adapter manager this is grounded on, a calendar
/// adapter has no persistent connection to maintain — every call is a
/// one-shot HTTP request with its own token refresh — so there is no
/// connect/disconnect lifecycle or reconnect backoff here.
pub struct CalendarAdapterRegistry {
    adapters: HashMap<String, Box<dyn CalendarAdapter>>,
}

impl CalendarAdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Box<dyn CalendarAdapter>) {
        let name = adapter.name().to_string();
        info!(provider = %name, "registering calendar adapter");
        self.adapters.insert(name, adapter);
    }

    pub fn get(&self, provider: &str) -> Option<&dyn CalendarAdapter> {
        self.adapters.get(provider).map(|b| b.as_ref())
    }
}

impl Default for CalendarAdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
