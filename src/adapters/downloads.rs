//! Download activity tracking for the busy gate

use std::collections::HashSet;
use std::sync::Mutex;

use crate::observer::ActivityGuard;

/// Sensors currently held by a data download
#[derive(Debug, Default)]
pub struct DownloadTracker {
    busy: Mutex<HashSet<String>>,
}

impl DownloadTracker {
    pub fn begin(&self, sensor_id: &str) {
        self.lock().insert(sensor_id.to_string());
    }

    pub fn finish(&self, sensor_id: &str) {
        self.lock().remove(sensor_id);
    }

    pub fn downloading(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.lock().iter().cloned().collect();
        ids.sort();
        ids
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.busy.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ActivityGuard for DownloadTracker {
    fn is_busy(&self, sensor_id: &str) -> bool {
        self.lock().contains(sensor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_and_finish() {
        let tracker = DownloadTracker::default();
        assert!(!tracker.is_busy("s1"));

        tracker.begin("s1");
        tracker.begin("s0");
        assert!(tracker.is_busy("s1"));
        assert_eq!(tracker.downloading(), vec!["s0", "s1"]);

        tracker.finish("s1");
        assert!(!tracker.is_busy("s1"));
        assert!(tracker.is_busy("s0"));
    }
}
