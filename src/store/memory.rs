use crate::core::correlation::{CorrelationKind, CorrelationMatrix};
use crate::core::error::{PipelineError, Result};
use crate::core::panel::Panel;
use crate::core::series::{DataSource, SeriesTable};
use crate::core::store::{Artifacts, SeriesStore};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// In-memory store, used by tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<DataSource, SeriesTable>>,
    artifacts: RwLock<Option<Artifacts>>,
    offline: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails as unreachable.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<()> {
        if self.offline {
            return Err(PipelineError::StoreUnavailable(
                "memory store is offline".to_string(),
            ));
        }
        Ok(())
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| PipelineError::StoreUnavailable("memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| PipelineError::StoreUnavailable("memory store lock poisoned".to_string()))
}

impl SeriesStore for MemoryStore {
    fn replace_series(&self, table: &SeriesTable) -> Result<()> {
        self.check()?;
        write(&self.tables)?.insert(table.source, table.clone());
        debug!(source = %table.source, rows = table.len(), "Memory store REPLACE series");
        Ok(())
    }

    fn load_series(&self, source: DataSource) -> Result<SeriesTable> {
        self.check()?;
        Ok(read(&self.tables)?
            .get(&source)
            .cloned()
            .unwrap_or_else(|| SeriesTable::empty(source)))
    }

    fn replace_artifacts(&self, artifacts: &Artifacts) -> Result<()> {
        self.check()?;
        *write(&self.artifacts)? = Some(artifacts.clone());
        debug!("Memory store REPLACE artifacts");
        Ok(())
    }

    fn load_matrix(&self, kind: CorrelationKind) -> Result<Option<CorrelationMatrix>> {
        self.check()?;
        Ok(read(&self.artifacts)?
            .as_ref()
            .map(|a| a.correlations.get(kind).clone()))
    }

    fn load_panel(&self) -> Result<Option<Panel>> {
        self.check()?;
        Ok(read(&self.artifacts)?.as_ref().map(|a| a.panel.clone()))
    }
}
