use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use ishne_reader::IshneReader;

/// One exposed lead, registered under a globally unique name.
#[derive(Clone)]
pub struct LeadEntry {
    /// Reader for the recording this lead came from. Immutable after
    /// open, so shared without a lock.
    pub reader: Arc<IshneReader>,
    /// Recording the lead belongs to, assigned at read-file time.
    pub recording_id: String,
    /// Zero-based position of the lead inside the file.
    pub lead_index: usize,
    /// Designation from the header's lead-spec code (X, V1, ...).
    pub original_name: String,
}

#[derive(Clone)]
pub struct AppState {
    // Maps exposed_name -> LeadEntry
    pub leads: Arc<RwLock<HashMap<String, LeadEntry>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            leads: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
