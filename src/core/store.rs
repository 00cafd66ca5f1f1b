//! Persistence contract between the pipeline and its storage backend.

use crate::core::correlation::{CorrelationKind, CorrelationMatrix, CorrelationSet};
use crate::core::error::Result;
use crate::core::panel::Panel;
use crate::core::series::{DataSource, SeriesTable};

/// Terminal output of one correlation run, written as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub panel: Panel,
    pub correlations: CorrelationSet,
}

/// Whole-table storage. Every write replaces the previous content for its key
/// wholesale; there are no partial or incremental updates.
pub trait SeriesStore {
    fn replace_series(&self, table: &SeriesTable) -> Result<()>;

    /// The staged table, or an empty one if the source was never staged.
    fn load_series(&self, source: DataSource) -> Result<SeriesTable>;

    fn replace_artifacts(&self, artifacts: &Artifacts) -> Result<()>;

    fn load_matrix(&self, kind: CorrelationKind) -> Result<Option<CorrelationMatrix>>;

    fn load_panel(&self) -> Result<Option<Panel>>;
}
