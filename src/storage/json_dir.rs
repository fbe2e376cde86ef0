use super::ReportBackend;
use crate::error::{Result, ScanDiffError};
use crate::model::Report;
use std::fs;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// Directory backend storing one `<id>.json` file per report.
///
/// Identifiers are the hex xxh3 digest of the stored JSON, so saving the same
/// report twice yields the same identifier and a single file.
#[derive(Debug, Clone)]
pub struct JsonDirBackend {
    dir: PathBuf,
}

impl JsonDirBackend {
    /// Open a backend rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| ScanDiffError::io(&dir, e))?;
        }
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file for `id`, or `None` if `id` cannot be one of ours.
    fn path_for(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty() && id.bytes().all(|b| b.is_ascii_hexdigit());
        valid.then(|| self.dir.join(format!("{id}.json")))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "json")
}

impl ReportBackend for JsonDirBackend {
    fn name(&self) -> &str {
        "json-dir"
    }

    fn insert(&self, report: &Report) -> Result<String> {
        let data = report.to_json()?;
        let id = format!("{:016x}", xxh3_64(data.as_bytes()));
        let path = self.dir.join(format!("{id}.json"));
        fs::write(&path, data).map_err(|e| ScanDiffError::io(&path, e))?;
        tracing::debug!("Wrote report {id} to {}", path.display());
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Option<Report>> {
        let Some(path) = self.path_for(id) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path).map_err(|e| ScanDiffError::io(&path, e))?;
        Report::from_json(&data).map(Some)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        match self.path_for(id) {
            Some(path) if path.exists() => {
                fs::remove_file(&path).map_err(|e| ScanDiffError::io(&path, e))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| ScanDiffError::io(&self.dir, e))?;
        let mut ids: Vec<String> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_json(path))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Host, HostCounts, HostStatus, RunInfo, RunStats, ScanInfo, Service};
    use tempfile::TempDir;

    fn sample() -> Report {
        Report::new()
            .with_run_info(RunInfo {
                scanner: "nmap".to_string(),
                version: "7.94".to_string(),
                ..RunInfo::default()
            })
            .with_scan_info(ScanInfo::default())
            .with_host(
                Host::new("192.168.1.10")
                    .with_status(HostStatus::new("up", "arp-response"))
                    .with_service(Service::new(22, "tcp")),
            )
            .with_run_stats(RunStats {
                hosts: Some(HostCounts { up: 1, down: 0, total: 1 }),
                ..RunStats::default()
            })
    }

    #[test]
    fn test_insert_get_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let backend = JsonDirBackend::new(tmp.path().join("reports")).unwrap();

        let report = sample();
        let id = backend.insert(&report).unwrap();
        assert_eq!(id.len(), 16);
        assert!(backend.dir().join(format!("{id}.json")).exists());

        let loaded = backend.get(&id).unwrap().expect("stored report");
        assert_eq!(loaded, report);
        assert_eq!(loaded.version(), "7.94");
    }

    #[test]
    fn test_content_addressed_ids() {
        let tmp = TempDir::new().unwrap();
        let backend = JsonDirBackend::new(tmp.path()).unwrap();

        let first = backend.insert(&sample()).unwrap();
        let second = backend.insert(&sample()).unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.list().unwrap(), vec![first]);
    }

    #[test]
    fn test_delete_and_missing() {
        let tmp = TempDir::new().unwrap();
        let backend = JsonDirBackend::new(tmp.path()).unwrap();
        let id = backend.insert(&sample()).unwrap();

        assert!(backend.delete(&id).unwrap());
        assert!(!backend.delete(&id).unwrap());
        assert!(backend.get(&id).unwrap().is_none());
        assert!(backend.list().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let tmp = TempDir::new().unwrap();
        let backend = JsonDirBackend::new(tmp.path()).unwrap();
        assert!(backend.get("../etc/passwd").unwrap().is_none());
        assert!(!backend.delete("../x").unwrap());
    }

    #[test]
    fn test_list_ignores_other_files() {
        let tmp = TempDir::new().unwrap();
        let backend = JsonDirBackend::new(tmp.path()).unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        let id = backend.insert(&sample()).unwrap();
        assert_eq!(backend.list().unwrap(), vec![id]);
    }

    #[test]
    fn test_save_through_backend() {
        let tmp = TempDir::new().unwrap();
        let backend = JsonDirBackend::new(tmp.path()).unwrap();
        let id = sample().save(&backend).unwrap();
        assert!(backend.get(&id).unwrap().is_some());

        let err = Report::new().save(&backend).unwrap_err();
        assert!(matches!(err, ScanDiffError::Persistence { .. }));
    }
}
