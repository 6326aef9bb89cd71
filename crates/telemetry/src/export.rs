// SPDX-License-Identifier: Apache-2.0

//! Artifact emission: one CSV file per metric, one column per node.

use crate::{MetricKind, MetricsRecorder};
use std::fmt::Write as _;
use std::path::Path;

/// Errors that can occur while emitting metric artifacts.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Writing an artifact file failed.
    #[error("Failed to write metric artifact `{path}`: {source}")]
    WriteError {
        /// The artifact path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl MetricsRecorder {
    /// Renders one metric as a CSV document (`time_ms` column plus one
    /// column per node).
    #[must_use]
    pub fn to_csv(&self, kind: MetricKind) -> String {
        let mut out = String::new();
        out.push_str("time_ms");
        for name in self.node_names() {
            let _ = write!(out, ",{name}");
        }
        out.push('\n');
        for (tick, time) in self.times().iter().enumerate() {
            let _ = write!(out, "{time}");
            for value in self.row(kind, tick) {
                let _ = write!(out, ",{value}");
            }
            out.push('\n');
        }
        out
    }

    /// Writes every metric's time series into `dir` as `<metric>.csv`.
    pub fn write_artifacts(&self, dir: impl AsRef<Path>) -> Result<(), Error> {
        let dir = dir.as_ref();
        for kind in MetricKind::ALL {
            let path = dir.join(format!("{}.csv", kind.key()));
            std::fs::write(&path, self.to_csv(kind)).map_err(|source| Error::WriteError {
                path: path.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }
}
