//! JSON persistence of run metrics and archives.

use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::schema::RunHistory;

use super::{Archive, ArchiveError, ArchiveSnapshot, Solution};

/// File name of the metrics written by [`save_run`].
pub const METRICS_FILE: &str = "metrics.json";
/// File name of the archive written by [`save_run`].
pub const ARCHIVE_FILE: &str = "archive.json";

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Write a value as pretty JSON, creating parent directories.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

/// Read a JSON value.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, PersistError> {
    let reader = BufReader::new(fs::File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Write `metrics.json` and `archive.json` into `dir`.
///
/// Metadata is dropped from the saved elites unless `include_metadata` is set.
pub fn save_run<S, M>(
    dir: &Path,
    history: &RunHistory,
    archive: &Archive<S, M>,
    include_metadata: bool,
) -> Result<(), PersistError>
where
    S: Solution + Serialize + DeserializeOwned,
    M: Clone + Serialize + DeserializeOwned,
{
    fs::create_dir_all(dir)?;
    save_json(&dir.join(METRICS_FILE), history)?;

    let mut snapshot = archive.snapshot();
    if !include_metadata {
        snapshot.elites.iter_mut().for_each(|e| e.metadata = None);
    }
    save_json(&dir.join(ARCHIVE_FILE), &snapshot)?;

    debug!(
        "Saved {} elites and {} metric rows to {}",
        snapshot.elites.len(),
        history.len(),
        dir.display()
    );
    Ok(())
}

/// Load an archive written by [`save_run`].
pub fn load_archive<S, M>(path: &Path) -> Result<Archive<S, M>, PersistError>
where
    S: Solution + Serialize + DeserializeOwned,
    M: Clone + Serialize + DeserializeOwned,
{
    let snapshot: ArchiveSnapshot<S, M> = load_json(path)?;
    Ok(Archive::from_snapshot(snapshot)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ArchiveConfig, ArchiveStats};

    #[test]
    fn test_save_and_load_run() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");

        let mut archive: Archive<Vec<f64>, String> =
            Archive::new(ArchiveConfig::grid(vec![3, 3], vec![(0.0, 1.0), (0.0, 1.0)])).unwrap();
        archive.insert(vec![1.0, 2.0], 0.5, vec![0.2, 0.2], Some("kept?".into()));
        archive.insert(vec![3.0, 4.0], 1.5, vec![0.8, 0.8], None);

        let mut history = RunHistory::default();
        history.record(0, 2, 0.0, &archive.stats(), Vec::new());

        save_run(&out, &history, &archive, false).unwrap();

        let metrics: RunHistory = load_json(&out.join(METRICS_FILE)).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics.qd_score, vec![2.0]);

        let loaded: Archive<Vec<f64>, String> = load_archive(&out.join(ARCHIVE_FILE)).unwrap();
        assert_eq!(loaded.stats(), archive.stats());
        assert!(loaded.elites().all(|e| e.metadata.is_none()));
    }

    #[test]
    fn test_out_of_range_descriptor_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive: Archive<Vec<f64>> =
            Archive::new(ArchiveConfig::grid(vec![2, 2], vec![(0.0, 1.0), (0.0, 1.0)])).unwrap();
        archive.insert(vec![1.0], 2.0, vec![f64::INFINITY, 0.5], None);
        archive.insert(vec![2.0], 1.0, vec![f64::NAN, 0.2], None);

        save_run(dir.path(), &RunHistory::default(), &archive, false).unwrap();
        let loaded: Archive<Vec<f64>> = load_archive(&dir.path().join(ARCHIVE_FILE)).unwrap();

        let mut descriptors: Vec<Vec<f64>> = loaded.elites().map(|e| e.descriptor).collect();
        descriptors.sort_by(|a, b| a[0].total_cmp(&b[0]));
        assert_eq!(descriptors, vec![vec![0.0, 0.2], vec![1.0, 0.5]]);
        assert_eq!(loaded.stats(), archive.stats());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Archive<Vec<f64>>, _> = load_archive(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(PersistError::Io(_))));

        let stats: ArchiveStats = ArchiveStats::default();
        save_json(&dir.path().join("stats.json"), &stats).unwrap();
        assert_eq!(load_json::<ArchiveStats>(&dir.path().join("stats.json")).unwrap(), stats);
    }
}
