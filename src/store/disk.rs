use crate::core::correlation::{CorrelationKind, CorrelationMatrix};
use crate::core::error::{PipelineError, Result};
use crate::core::panel::Panel;
use crate::core::series::{DataSource, RawObservation, SeriesTable};
use crate::core::store::{Artifacts, SeriesStore};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, error, info};

const ARTIFACTS_PARTITION: &str = "artifacts";
const PANEL_KEY: &str = "panel";

/// fjall-backed store. One handle per run: opened at the start, flushed and
/// closed when dropped.
pub struct DiskStore {
    keyspace: Keyspace,
    yahoo: PartitionHandle,
    fred: PartitionHandle,
    world_bank: PartitionHandle,
    artifacts: PartitionHandle,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            PipelineError::StoreUnavailable(format!("cannot create {}: {e}", path.display()))
        })?;

        let keyspace = Config::new(path).open()?;
        let open = |name: &str| keyspace.open_partition(name, PartitionCreateOptions::default());
        let yahoo = open(&series_partition_name(DataSource::Yahoo))?;
        let fred = open(&series_partition_name(DataSource::Fred))?;
        let world_bank = open(&series_partition_name(DataSource::WorldBank))?;
        let artifacts = open(ARTIFACTS_PARTITION)?;
        debug!("Opened store at {}", path.display());

        Ok(Self {
            keyspace,
            yahoo,
            fred,
            world_bank,
            artifacts,
        })
    }

    fn series_partition(&self, source: DataSource) -> &PartitionHandle {
        match source {
            DataSource::Yahoo => &self.yahoo,
            DataSource::Fred => &self.fred,
            DataSource::WorldBank => &self.world_bank,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.artifacts.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl Drop for DiskStore {
    fn drop(&mut self) {
        if let Err(e) = self.keyspace.persist(PersistMode::SyncAll) {
            error!("Failed to flush store on close: {e}");
        } else {
            debug!("Store flushed and closed");
        }
    }
}

fn series_partition_name(source: DataSource) -> String {
    format!("series_{}", source.slug())
}

fn matrix_key(kind: CorrelationKind) -> String {
    format!("correlation_{}", kind.slug())
}

fn observation_key(obs: &RawObservation) -> Vec<u8> {
    format!("{}\u{1f}{}", obs.name, obs.date).into_bytes()
}

impl SeriesStore for DiskStore {
    fn replace_series(&self, table: &SeriesTable) -> Result<()> {
        let partition = self.series_partition(table.source);
        let mut batch = self.keyspace.batch();

        let mut fresh = HashSet::with_capacity(table.len());
        for obs in table.observations() {
            let key = observation_key(obs);
            batch.insert(partition, key.clone(), serde_json::to_vec(obs)?);
            fresh.insert(key);
        }

        let mut removed = 0usize;
        for key in partition.keys() {
            let key = key?.to_vec();
            if !fresh.contains(&key) {
                batch.remove(partition, key);
                removed += 1;
            }
        }

        batch.commit()?;
        info!(
            source = %table.source,
            rows = table.len(),
            removed,
            "Replaced staged table"
        );
        Ok(())
    }

    fn load_series(&self, source: DataSource) -> Result<SeriesTable> {
        let mut observations = Vec::new();
        for item in self.series_partition(source).iter() {
            let (_, value) = item?;
            observations.push(serde_json::from_slice::<RawObservation>(&value)?);
        }
        debug!(%source, rows = observations.len(), "Loaded staged table");
        Ok(SeriesTable::new(source, observations))
    }

    fn replace_artifacts(&self, artifacts: &Artifacts) -> Result<()> {
        let mut batch = self.keyspace.batch();
        batch.insert(
            &self.artifacts,
            PANEL_KEY,
            serde_json::to_vec(&artifacts.panel)?,
        );
        for kind in CorrelationKind::ALL {
            batch.insert(
                &self.artifacts,
                matrix_key(kind),
                serde_json::to_vec(artifacts.correlations.get(kind))?,
            );
        }
        batch.commit()?;
        Ok(())
    }

    fn load_matrix(&self, kind: CorrelationKind) -> Result<Option<CorrelationMatrix>> {
        self.get_json(&matrix_key(kind))
    }

    fn load_panel(&self) -> Result<Option<Panel>> {
        self.get_json(PANEL_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::correlation;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn obs(y: i32, m: u32, name: &str, value: f64) -> RawObservation {
        RawObservation {
            date: NaiveDate::from_ymd_opt(y, m, 1).unwrap(),
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn test_replace_series_overwrites_previous_extract() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        store
            .replace_series(&SeriesTable::new(
                DataSource::Fred,
                vec![obs(2020, 1, "GDP", 1.0), obs(2020, 1, "UNRATE", 3.5)],
            ))
            .unwrap();
        let second = SeriesTable::new(
            DataSource::Fred,
            vec![obs(2020, 1, "GDP", 1.5), obs(2020, 2, "GDP", 2.0)],
        );
        store.replace_series(&second).unwrap();

        assert_eq!(store.load_series(DataSource::Fred).unwrap(), second);
        assert!(store.load_series(DataSource::Yahoo).unwrap().is_empty());
    }

    #[test]
    fn test_tables_and_artifacts_survive_reopen() {
        let dir = tempdir().unwrap();
        let panel = Panel::from_rows(
            vec!["a".to_string(), "b".to_string()],
            (1..=4)
                .map(|m| {
                    let period = NaiveDate::from_ymd_opt(2020, m, 1).unwrap();
                    (period, vec![Some(m as f64), Some((m * m) as f64 + 0.1)])
                })
                .collect(),
        );
        let correlations = correlation::correlate(&panel).unwrap();
        let table = SeriesTable::new(DataSource::WorldBank, vec![obs(2015, 1, "inflation", 0.1)]);

        {
            let store = DiskStore::open(dir.path()).unwrap();
            assert!(store.load_panel().unwrap().is_none());
            store.replace_series(&table).unwrap();
            store
                .replace_artifacts(&Artifacts {
                    panel: panel.clone(),
                    correlations: correlations.clone(),
                })
                .unwrap();
        }

        let store = DiskStore::open(dir.path()).unwrap();
        assert_eq!(store.load_series(DataSource::WorldBank).unwrap(), table);
        assert_eq!(store.load_panel().unwrap(), Some(panel));
        assert_eq!(
            store.load_matrix(CorrelationKind::Spearman).unwrap(),
            Some(correlations.spearman)
        );
    }
}
