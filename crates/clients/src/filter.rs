//! StaticFilterClient - export definitions loaded once from a file

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use config_loader::{load_export_definitions, validate_export};
use contracts::{
    ContractError, ExportArgs, ExportDefinition, ExportId, FilterClient, RawExportDefinition,
    SyncCallback,
};
use tracing::{info, warn};

enum SyncState {
    Pending(Vec<SyncCallback>),
    Done { error: bool },
}

/// Filter collaborator over a fixed set of export definitions
///
/// Synchronisation completes once, through `complete_sync`; callbacks
/// registered afterwards are invoked immediately with the stored result.
pub struct StaticFilterClient {
    definitions: RwLock<HashMap<ExportId, Arc<ExportArgs>>>,
    sync: Mutex<SyncState>,
}

impl Default for StaticFilterClient {
    fn default() -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            sync: Mutex::new(SyncState::Pending(Vec::new())),
        }
    }
}

impl StaticFilterClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client holding already-validated definitions
    pub fn from_definitions(definitions: impl IntoIterator<Item = ExportDefinition>) -> Self {
        let client = Self::new();
        for definition in definitions {
            client.insert(definition);
        }
        client
    }

    /// Validate raw definitions, skipping invalid ones
    pub fn from_raw(raw: &[RawExportDefinition]) -> Self {
        let client = Self::new();
        for definition in raw {
            match validate_export(definition) {
                Ok(valid) => client.insert(valid),
                Err(e) => warn!(export_id = %definition.id, error = %e, "skipping invalid export"),
            }
        }
        client
    }

    /// Load and validate definitions from a JSON array file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a JSON array of
    /// definitions. Individual invalid definitions are skipped, not errors.
    pub fn load(path: &Path) -> Result<Self, ContractError> {
        let raw = load_export_definitions(path)?;
        let client = Self::from_raw(&raw);
        info!(
            path = %path.display(),
            loaded = client.len(),
            skipped = raw.len() - client.len(),
            "export definitions loaded"
        );
        Ok(client)
    }

    /// Add or replace a definition
    pub fn insert(&self, definition: ExportDefinition) {
        self.write_definitions()
            .insert(definition.id, definition.args);
    }

    /// Remove a definition; records still referencing it are skipped
    pub fn remove(&self, export_id: &str) -> Option<Arc<ExportArgs>> {
        self.write_definitions().remove(export_id)
    }

    pub fn len(&self) -> usize {
        self.read_definitions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signal the end of the initial load
    ///
    /// Only the first call has an effect.
    pub fn complete_sync(&self, error: bool) {
        let callbacks = {
            let mut state = self.lock_sync();
            let callbacks = match &mut *state {
                SyncState::Done { .. } => return,
                SyncState::Pending(callbacks) => std::mem::take(callbacks),
            };
            *state = SyncState::Done { error };
            callbacks
        };
        info!(error, callbacks = callbacks.len(), "filter synchronisation complete");
        for callback in callbacks {
            callback(error);
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(*self.lock_sync(), SyncState::Done { .. })
    }

    fn read_definitions(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<ExportId, Arc<ExportArgs>>> {
        self.definitions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_definitions(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<ExportId, Arc<ExportArgs>>> {
        self.definitions.write().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_sync(&self) -> MutexGuard<'_, SyncState> {
        self.sync.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FilterClient for StaticFilterClient {
    fn export_args(&self, export_id: &str) -> Option<Arc<ExportArgs>> {
        self.read_definitions().get(export_id).cloned()
    }

    fn on_sync(&self, callback: SyncCallback) {
        let done = {
            let mut state = self.lock_sync();
            match &mut *state {
                SyncState::Pending(callbacks) => {
                    callbacks.push(callback);
                    return;
                }
                SyncState::Done { error } => *error,
            }
        };
        callback(done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::NamedTempFile;

    fn counting_callback(hits: &Arc<AtomicUsize>, errors: &Arc<AtomicUsize>) -> SyncCallback {
        let hits = Arc::clone(hits);
        let errors = Arc::clone(errors);
        Arc::new(move |error| {
            hits.fetch_add(1, Ordering::SeqCst);
            if error {
                errors.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    #[test]
    fn test_load_skips_invalid_definitions() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": "ok", "args": {{"db_name": "d1"}}}},
                {{"id": "no_db", "args": {{}}}},
                {{"id": "bad_time", "args": {{"db_name": "d1", "time_key": "t"}}, "mappings": {{}}}}
            ]"#
        )
        .unwrap();

        let client = StaticFilterClient::load(file.path()).unwrap();

        assert_eq!(client.len(), 1);
        assert_eq!(client.export_args("ok").unwrap().db_name, "d1");
        assert!(client.export_args("no_db").is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let result = StaticFilterClient::load(Path::new("/nonexistent/exports.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_callbacks_before_and_after_sync() {
        let client = StaticFilterClient::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        client.on_sync(counting_callback(&hits, &errors));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!client.is_synced());

        client.complete_sync(false);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // late registration fires immediately
        client.on_sync(counting_callback(&hits, &errors));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_first_sync_wins() {
        let client = StaticFilterClient::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        client.on_sync(counting_callback(&hits, &errors));

        client.complete_sync(true);
        client.complete_sync(false);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_removed_definition_disappears() {
        let client = StaticFilterClient::from_definitions([ExportDefinition {
            id: ExportId::from("e1"),
            args: Arc::new(ExportArgs::new("db")),
        }]);

        assert!(client.remove("e1").is_some());
        assert!(client.export_args("e1").is_none());
        assert!(client.is_empty());
    }
}
