//! File-backed task store using JSON lines for durability.
//!
//! New records are appended to the stream file as soon as they are created.
//! Every other mutation is held in memory and written out by `flush`, which
//! rewrites the file from the current state.

use std::fs::{self, create_dir_all, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;

use crate::core::task::{StoredTask, TaskId};
use crate::core::{SchedulerError, TaskStore};
use crate::infra::store::memory::StoreState;

fn io_error(e: impl std::fmt::Display) -> SchedulerError {
    SchedulerError::Store(e.to_string())
}

#[derive(Debug, Default)]
struct JsonlState {
    records: StoreState,
    dirty: bool,
}

/// File-backed store persisted to `<path>/<stream>_tasks.jsonl`.
#[derive(Debug)]
pub struct JsonlTaskStore {
    path: PathBuf,
    stream: String,
    state: Mutex<JsonlState>,
}

impl JsonlTaskStore {
    /// Open (or create) a store persisted to the given path/stream.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Store`] if the directory cannot be created or
    /// an existing stream file cannot be decoded.
    pub fn open(path: impl AsRef<Path>, stream: impl Into<String>) -> Result<Self, SchedulerError> {
        let path = path.as_ref().to_path_buf();
        create_dir_all(&path).map_err(io_error)?;
        let store = Self {
            path,
            stream: stream.into(),
            state: Mutex::new(JsonlState::default()),
        };
        store.load_from_disk()?;
        Ok(store)
    }

    /// Location of the stream file.
    #[must_use]
    pub fn file_path(&self) -> PathBuf {
        self.path.join(format!("{}_tasks.jsonl", self.stream))
    }

    fn load_from_disk(&self) -> Result<(), SchedulerError> {
        let file_path = self.file_path();
        if !file_path.exists() {
            return Ok(());
        }
        let file = OpenOptions::new().read(true).open(&file_path).map_err(io_error)?;
        let mut state = self.state.lock();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(io_error)?;
            if line.trim().is_empty() {
                continue;
            }
            let task: StoredTask = serde_json::from_str(&line).map_err(io_error)?;
            state.records.upsert(task);
        }
        tracing::debug!(path = %file_path.display(), records = state.records.len(), "task stream loaded");
        Ok(())
    }

    fn append_to_disk(&self, task: &StoredTask) -> Result<(), SchedulerError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_path())
            .map_err(io_error)?;
        let line = serde_json::to_string(task).map_err(io_error)?;
        writeln!(file, "{line}").map_err(io_error)
    }

    fn rewrite(&self, tasks: &[StoredTask]) -> Result<(), SchedulerError> {
        let target = self.file_path();
        let staging = self.path.join(format!("{}_tasks.jsonl.tmp", self.stream));
        {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&staging)
                .map_err(io_error)?;
            let mut writer = BufWriter::new(file);
            for task in tasks {
                let line = serde_json::to_string(task).map_err(io_error)?;
                writeln!(writer, "{line}").map_err(io_error)?;
            }
            writer.flush().map_err(io_error)?;
        }
        fs::rename(&staging, &target).map_err(io_error)
    }

    fn mutate(&self, f: impl FnOnce(&mut StoreState) -> bool) -> bool {
        let mut state = self.state.lock();
        let changed = f(&mut state.records);
        state.dirty |= changed;
        changed
    }
}

impl TaskStore for JsonlTaskStore {
    fn create(&self, task: &StoredTask) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        if state.records.get(task.id).is_some() {
            return Err(SchedulerError::Store(format!("task {} already exists", task.id)));
        }
        self.append_to_disk(task)?;
        state.records.upsert(task.clone());
        Ok(())
    }

    fn fetch(&self, id: TaskId) -> Result<Option<StoredTask>, SchedulerError> {
        Ok(self.state.lock().records.get(id).cloned())
    }

    fn update_payload(&self, id: TaskId, payload: Value) -> Result<bool, SchedulerError> {
        Ok(self.mutate(|records| records.get_mut(id).map(|task| task.payload = payload).is_some()))
    }

    fn try_claim(&self, id: TaskId) -> Result<bool, SchedulerError> {
        Ok(self.mutate(|records| match records.get_mut(id) {
            Some(task) if !task.active => {
                task.active = true;
                true
            }
            _ => false,
        }))
    }

    fn set_active(&self, id: TaskId, active: bool) -> Result<bool, SchedulerError> {
        Ok(self.mutate(|records| records.get_mut(id).map(|task| task.active = active).is_some()))
    }

    fn delete(&self, id: TaskId) -> Result<bool, SchedulerError> {
        Ok(self.mutate(|records| records.remove(id)))
    }

    fn list(&self) -> Result<Vec<StoredTask>, SchedulerError> {
        Ok(self.state.lock().records.list())
    }

    fn clear_active(&self) -> Result<usize, SchedulerError> {
        let mut cleared = 0;
        self.mutate(|records| {
            cleared = records.clear_active();
            cleared > 0
        });
        Ok(cleared)
    }

    fn flush(&self) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        if !state.dirty {
            return Ok(());
        }
        self.rewrite(&state.records.list())?;
        state.dirty = false;
        Ok(())
    }
}
