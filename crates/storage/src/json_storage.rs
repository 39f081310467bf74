//! JSON file storage implementation.
//!
//! Stores one pretty-printed document per workload under `workloads/` and
//! keeps a small per-workload meta marker (version + updated_at) under
//! `meta/`.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use wmspec_core::{TaskNode, TaskTree};

use super::{Result, StorageError, WorkloadStore};

/// File-based JSON storage backend.
pub struct JsonWorkloadStore {
    root: PathBuf,
}

impl JsonWorkloadStore {
    /// Create storage, creating the `workloads/` and `meta/` directories.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("workloads")).await?;
        fs::create_dir_all(root.join("meta")).await?;

        Ok(Self { root })
    }

    fn workload_path(&self, name: &str) -> PathBuf {
        self.root.join("workloads").join(format!("{}.json", name))
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.root.join("meta").join(format!("{}.meta.json", name))
    }

    /// Current version of a stored workload, 0 if never saved.
    pub async fn version(&self, name: &str) -> Result<u64> {
        check_name(name)?;
        match fs::read_to_string(self.meta_path(name)).await {
            Ok(s) => {
                let json: serde_json::Value = serde_json::from_str(&s)?;
                Ok(json.get("version").and_then(|v| v.as_u64()).unwrap_or(0))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and increment the workload version, return the new version.
    async fn bump_version(&self, name: &str) -> Result<u64> {
        let version = self.version(name).await? + 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(self.meta_path(name), serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }
}

#[async_trait::async_trait]
impl WorkloadStore for JsonWorkloadStore {
    async fn save(&mut self, tree: &TaskTree) -> Result<u64> {
        let name = tree.name();
        check_name(name)?;
        let json = serde_json::to_string_pretty(tree)?;
        fs::write(self.workload_path(name), json.as_bytes()).await?;

        let version = self.bump_version(name).await?;
        debug!(workload = name, version, "saved workload");
        Ok(version)
    }

    async fn load(&self, name: &str) -> Result<Option<TaskTree>> {
        check_name(name)?;
        match fs::read_to_string(self.workload_path(name)).await {
            Ok(json) => {
                let root: TaskNode = serde_json::from_str(&json)?;
                Ok(Some(TaskTree::from_checked_root(root)?))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut rd = fs::read_dir(self.root.join("workloads")).await?;
        while let Some(entry) = rd.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&mut self, name: &str) -> Result<()> {
        check_name(name)?;
        fs::remove_file(self.workload_path(name)).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(name.to_string())
            } else {
                e.into()
            }
        })?;
        fs::remove_file(self.meta_path(name)).await.or_else(|e| {
            if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }
        })?;
        debug!(workload = name, "deleted workload");
        Ok(())
    }
}

/// Workload names become file names; keep them to a single path component.
fn check_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wmspec_core::{ConfigSection, SpecError, TaskType};

    fn sample_tree(name: &str) -> TaskTree {
        let mut tree = TaskTree::new(name);
        let root = tree.root_mut();
        root.set_task_type(TaskType::Processing);
        root.set_splitting_algorithm("LumiBased", &ConfigSection::new().with("lumis_per_job", 8));
        root.add_task("MergeAOD").unwrap().set_task_type(TaskType::Merge);
        tree
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonWorkloadStore::new(dir.path()).await.unwrap();
        let tree = sample_tree("ReReco_Run2024A");

        assert_eq!(store.save(&tree).await.unwrap(), 1);
        assert_eq!(store.save(&tree).await.unwrap(), 2);
        assert_eq!(store.version("ReReco_Run2024A").await.unwrap(), 2);

        let loaded = store.load("ReReco_Run2024A").await.unwrap().unwrap();
        assert_eq!(loaded, tree);
        assert!(loaded.find("/ReReco_Run2024A/MergeAOD").is_some());
    }

    #[tokio::test]
    async fn test_missing_workload() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonWorkloadStore::new(dir.path()).await.unwrap();

        assert!(store.load("nope").await.unwrap().is_none());
        assert!(matches!(store.delete("nope").await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonWorkloadStore::new(dir.path()).await.unwrap();
        store.save(&sample_tree("b_workload")).await.unwrap();
        store.save(&sample_tree("a_workload")).await.unwrap();

        assert_eq!(store.list_names().await.unwrap(), vec!["a_workload", "b_workload"]);

        store.delete("a_workload").await.unwrap();
        assert_eq!(store.list_names().await.unwrap(), vec!["b_workload"]);
        assert_eq!(store.version("a_workload").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonWorkloadStore::new(dir.path()).await.unwrap();
        assert!(matches!(store.load("../etc").await, Err(StorageError::InvalidName(_))));
    }

    #[tokio::test]
    async fn test_load_reports_duplicate_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonWorkloadStore::new(dir.path()).await.unwrap();

        let mut doc = serde_json::to_value(sample_tree("ReReco")).unwrap();
        let merge = doc["children"][0].clone();
        doc["children"].as_array_mut().unwrap().push(merge);
        fs::write(store.workload_path("ReReco"), doc.to_string()).await.unwrap();

        assert!(matches!(
            store.load("ReReco").await,
            Err(StorageError::Spec(SpecError::DuplicateName { .. }))
        ));
    }
}
