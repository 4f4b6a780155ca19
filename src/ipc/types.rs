use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::calc;
use crate::error::StoreResult;
use crate::model::{ComputedAverage, Grade, Student, Subject};
use crate::store::Store;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<Store>,
    /// Insert the default classes and subjects when a workspace opens empty.
    pub seed: bool,
    /// Derived from the store; rebuilt after every change to grades,
    /// students or subjects. Never persisted.
    pub averages: Vec<ComputedAverage>,
}

impl AppState {
    pub fn new(seed: bool) -> AppState {
        AppState {
            workspace: None,
            store: None,
            seed,
            averages: Vec::new(),
        }
    }

    pub fn open_workspace(&mut self, path: &Path) -> StoreResult<()> {
        let store = Store::open(path, self.seed)?;
        self.workspace = Some(path.to_path_buf());
        self.store = Some(store);
        self.recompute_averages()?;
        Ok(())
    }

    pub fn recompute_averages(&mut self) -> StoreResult<()> {
        let Some(store) = self.store.as_ref() else {
            self.averages.clear();
            return Ok(());
        };
        let students = store.list::<Student>()?;
        let subjects = store.list::<Subject>()?;
        let grades = store.list::<Grade>()?;
        self.averages = calc::compute_averages(&students, &subjects, &grades);
        Ok(())
    }
}
