use std::{fs::OpenOptions, io::Write, sync::Mutex};

use tracing::warn;

use crate::collab::analytics::{AnalyticsSink, LifecycleEvent};

/// Appends lifecycle events to a file, one JSON object per line.
pub struct JsonlAnalyticsSink {
    file: Option<Mutex<std::fs::File>>,
}

impl JsonlAnalyticsSink {
    pub fn new(path: &str) -> Self {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path);

        match file {
            Ok(f) => Self {
                file: Some(Mutex::new(f)),
            },
            Err(e) => {
                warn!(path, error = %e, "could not open analytics file, events will be dropped");
                Self { file: None }
            }
        }
    }
}

impl AnalyticsSink for JsonlAnalyticsSink {
    fn emit(&mut self, event: &LifecycleEvent) {
        let file_mutex = match &self.file {
            Some(f) => f,
            None => return,
        };

        let json = match serde_json::to_string(event) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "failed to serialize lifecycle event");
                return;
            }
        };

        let mut file = match file_mutex.lock() {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "analytics file lock poisoned");
                return;
            }
        };

        if let Err(e) = writeln!(file, "{}", json) {
            warn!(error = %e, "failed to write lifecycle event");
        }
    }
}
