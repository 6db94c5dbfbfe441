use fangjia_domain::entities::dataset::Dataset;
use fangjia_domain::errors::PersistenceError;
use fangjia_domain::repositories::dataset_store::DatasetStore;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const DEFAULT_DATA_FILE: &str = "crawl_data.json";

/// Dataset persisted as one pretty-printed UTF-8 JSON document.
#[derive(Debug, Clone)]
pub struct JsonDatasetStore {
    path: PathBuf,
}

impl JsonDatasetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<Dataset>, PersistenceError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(PersistenceError::Io(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    err
                )))
            }
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let dataset: Dataset = serde_json::from_str(&raw).map_err(|err| {
            PersistenceError::Serialize(format!("failed to parse {}: {}", self.path.display(), err))
        })?;
        dataset.validate().map_err(|err| {
            PersistenceError::Serialize(format!("invalid dataset in {}: {}", self.path.display(), err))
        })?;
        Ok(Some(dataset))
    }

    fn write_atomic(&self, dataset: &Dataset) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                PersistenceError::Io(format!("failed to create dir {}: {}", parent.display(), err))
            })?;
        }

        let json = serde_json::to_string_pretty(dataset)
            .map_err(|err| PersistenceError::Serialize(format!("failed to serialize dataset: {err}")))?;

        let tmp = tmp_path(&self.path);
        write_and_rename(&tmp, &self.path, json.as_bytes()).map_err(|err| {
            let _ = fs::remove_file(&tmp);
            PersistenceError::Io(format!("failed to write {}: {}", self.path.display(), err))
        })
    }
}

fn write_and_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(tmp, path)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| DEFAULT_DATA_FILE.into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn record_store_metrics(op: &'static str, start: Instant, ok: bool) {
    let result_label = if ok { "ok" } else { "err" };
    metrics::counter!("fangjia.infra.store.calls_total", "op" => op, "result" => result_label)
        .increment(1);
    metrics::histogram!("fangjia.infra.store.call_ms", "op" => op, "result" => result_label)
        .record(start.elapsed().as_millis() as f64);
}

impl DatasetStore for JsonDatasetStore {
    fn load(&self) -> Dataset {
        let start = Instant::now();
        let result = self.read();
        record_store_metrics("load", start, result.is_ok());
        match result {
            Ok(Some(dataset)) => {
                tracing::info!(
                    path = %self.path.display(),
                    districts = dataset.district_count(),
                    "dataset loaded"
                );
                dataset
            }
            Ok(None) => {
                tracing::info!(path = %self.path.display(), "no dataset yet, starting empty");
                Dataset::new()
            }
            Err(err) => {
                tracing::warn!(error = %err, "dataset unreadable, starting empty");
                Dataset::new()
            }
        }
    }

    fn save(&self, dataset: &Dataset) -> Result<(), PersistenceError> {
        let start = Instant::now();
        let result = self.write_atomic(dataset);
        record_store_metrics("save", start, result.is_ok());
        if result.is_ok() {
            tracing::info!(
                path = %self.path.display(),
                districts = dataset.district_count(),
                records = dataset.record_count(),
                "dataset saved"
            );
        }
        result
    }
}
