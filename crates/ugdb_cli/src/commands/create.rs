//! Create command implementation.

use std::path::Path;
use tracing::info;
use ugdb_corpus::Corpus;

/// Runs the create command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    Corpus::create(path)?.close()?;
    info!("Created corpus at {}", path.display());
    Ok(())
}
