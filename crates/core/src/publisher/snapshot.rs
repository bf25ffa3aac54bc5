//! Partitioning of scrape results into published files.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde::Serialize;

use crate::catalog::ConnectorRecord;

use super::PublishError;

pub const ALL_FILE: &str = "All.json";
pub const DEPRECATED_FILE: &str = "Deprecated.json";
pub const CURRENT_FILE: &str = "Current.json";
/// Directory holding one file per connector.
pub const CONNECTORS_DIR: &str = "connectors";

/// The complete set of files to publish, keyed by relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    files: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_files<I, K, V>(files: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            files: files
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn insert<T: Serialize + ?Sized>(&mut self, path: String, value: &T) -> Result<(), PublishError> {
        check_relative_path(&path)?;
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| PublishError::Serialization(e.to_string()))?;
        self.files.insert(path, json);
        Ok(())
    }
}

/// Path of a connector's own file within the snapshot.
pub fn connector_path(unique_name: &str) -> Result<String, PublishError> {
    let path = format!("{}/{}.json", CONNECTORS_DIR, unique_name);
    if matches!(unique_name, "" | "." | "..") || unique_name.contains(['/', '\\']) {
        return Err(PublishError::InvalidPath(path));
    }
    check_relative_path(&path)?;
    Ok(path)
}

/// Accept only relative paths made of plain segments, so publishers never
/// write outside their root.
pub fn check_relative_path(path: &str) -> Result<(), PublishError> {
    let plain = !path.is_empty()
        && !path.contains('\\')
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(())
    } else {
        Err(PublishError::InvalidPath(path.to_string()))
    }
}

/// Build the snapshot for `records`.
///
/// `Deprecated.json` keeps each connector's deprecated actions and drops
/// connectors with none; `Current.json` does the same for the rest.
pub fn partition(records: &[ConnectorRecord]) -> Result<Snapshot, PublishError> {
    let deprecated: Vec<ConnectorRecord> =
        records.iter().filter_map(|r| r.filtered(true)).collect();
    let current: Vec<ConnectorRecord> =
        records.iter().filter_map(|r| r.filtered(false)).collect();

    let mut snapshot = Snapshot::default();
    snapshot.insert(ALL_FILE.to_string(), records)?;
    snapshot.insert(DEPRECATED_FILE.to_string(), &deprecated)?;
    snapshot.insert(CURRENT_FILE.to_string(), &current)?;

    for record in records {
        snapshot.insert(connector_path(&record.unique_name)?, record)?;
    }

    Ok(snapshot)
}
