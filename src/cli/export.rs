use super::ui;
use crate::core::store::SeriesStore;
use crate::store::export::export_all;
use anyhow::Result;
use std::path::Path;

pub fn run(store: &dyn SeriesStore, dir: &Path) -> Result<()> {
    let written = export_all(store, dir)?;
    if written.is_empty() {
        println!(
            "{}",
            ui::style_text("Nothing to export yet.", ui::StyleType::Subtle)
        );
        return Ok(());
    }
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
