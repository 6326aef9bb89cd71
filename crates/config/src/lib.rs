// SPDX-License-Identifier: Apache-2.0

//! Configuration model for the Malcolm cluster simulator.
//!
//! Data model:
//! - cluster
//!   - Malcolm nodes (scheduler geometry, overhead, egress bandwidth)
//!   - workload (rate / runtime / io time / payload samplers)
//!
//! Files are dispatched on their extension (`json`, `yaml`, `yml`) and fully
//! validated before a simulation is allowed to start: every violation is
//! collected and reported in a single diagnostic.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub mod error;
pub mod iec;
pub mod sampler;

pub use error::Error;
pub use iec::IecInt;
pub use sampler::SamplerConfig;

/// The name of a Malcolm node, unique across the cluster.
pub type NodeName = String;

/// Configuration of a single Malcolm node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Unique node name.
    pub name: NodeName,
    /// Number of CPU cores (> 0).
    pub core_count: IecInt,
    /// Performance multiplier shared by all cores (> 0).
    #[serde(default = "default_perf")]
    pub core_perf: f64,
    /// Number of IO slots (> 0).
    pub io_count: IecInt,
    /// Performance multiplier shared by all IO slots (> 0).
    #[serde(default = "default_perf")]
    pub io_perf: f64,
    /// Per-dispatch scheduling overhead in milliseconds (>= 0).
    pub overhead: f64,
    /// Egress bandwidth in bits per second (> 0).
    pub bandwidth: IecInt,
}

fn default_perf() -> f64 {
    1.0
}

/// Samplers describing the generated workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkloadConfig {
    /// Task arrival rate sampler (tasks per millisecond).
    pub rate: SamplerConfig,
    /// CPU runtime sampler (milliseconds).
    pub runtime: SamplerConfig,
    /// IO time sampler (milliseconds).
    pub io_time: SamplerConfig,
    /// Payload size sampler (bytes).
    pub payload: SamplerConfig,
}

/// Complete configuration of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    /// The Malcolm nodes forming the cluster.
    #[serde(rename = "MalcolmNodes")]
    pub malcolm_nodes: Vec<NodeConfig>,
    /// The generated workload.
    #[serde(rename = "Tasks")]
    pub tasks: WorkloadConfig,
    /// Seed for every pseudo-random number generator in the run.
    #[serde(default)]
    pub seed: u64,
}

impl ClusterConfig {
    /// Loads and validates a configuration file, dispatching on its
    /// extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let text = std::fs::read_to_string(path).map_err(|e| Error::FileReadError {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;
        let config = match extension.as_str() {
            "json" => Self::from_json(&text)?,
            "yaml" | "yml" => Self::from_yaml(&text)?,
            _ => return Err(Error::UnsupportedExtension { extension }),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON configuration document. Does not validate.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::DeserializationError {
            format: "JSON".to_owned(),
            details: e.to_string(),
        })
    }

    /// Parses a YAML configuration document. Does not validate.
    pub fn from_yaml(text: &str) -> Result<Self, Error> {
        serde_yaml::from_str(text).map_err(|e| Error::DeserializationError {
            format: "YAML".to_owned(),
            details: e.to_string(),
        })
    }

    /// Checks every schema bound, collecting all violations.
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = Vec::new();

        if self.malcolm_nodes.is_empty() {
            errors.push(Error::EmptyCluster);
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for node in &self.malcolm_nodes {
            if !seen.insert(node.name.as_str()) {
                errors.push(Error::DuplicateNodeName {
                    name: node.name.clone(),
                });
            }
            node.validate(&mut errors);
        }

        self.tasks.rate.validate("rate", &mut errors);
        self.tasks.runtime.validate("runtime", &mut errors);
        self.tasks.io_time.validate("io_time", &mut errors);
        self.tasks.payload.validate("payload", &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfiguration { errors })
        }
    }
}

impl NodeConfig {
    fn validate(&self, errors: &mut Vec<Error>) {
        if self.core_count.get() == 0 {
            errors.push(Error::InvalidNodeField {
                node: self.name.clone(),
                field: "core_count",
                requirement: "positive",
                value: 0.0,
            });
        }
        if self.io_count.get() == 0 {
            errors.push(Error::InvalidNodeField {
                node: self.name.clone(),
                field: "io_count",
                requirement: "positive",
                value: 0.0,
            });
        }
        if self.core_perf <= 0.0 {
            errors.push(Error::InvalidNodeField {
                node: self.name.clone(),
                field: "core_perf",
                requirement: "positive",
                value: self.core_perf,
            });
        }
        if self.io_perf <= 0.0 {
            errors.push(Error::InvalidNodeField {
                node: self.name.clone(),
                field: "io_perf",
                requirement: "positive",
                value: self.io_perf,
            });
        }
        if self.overhead < 0.0 {
            errors.push(Error::InvalidNodeField {
                node: self.name.clone(),
                field: "overhead",
                requirement: "non-negative",
                value: self.overhead,
            });
        }
        if self.bandwidth.get() == 0 {
            errors.push(Error::InvalidNodeField {
                node: self.name.clone(),
                field: "bandwidth",
                requirement: "positive",
                value: 0.0,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const YAML: &str = r#"
MalcolmNodes:
  - name: alpha
    core_count: 4
    io_count: "1K"
    overhead: 0.5
    bandwidth: "8M"
  - name: beta
    core_count: "2"
    core_perf: 1.5
    io_count: 32
    io_perf: 0.5
    overhead: 0
    bandwidth: 8000
Tasks:
  rate: {type: const, value: 0.001}
  runtime: {type: gaussian, center: 3, scale: 1}
  io_time: {type: normal, center: 2, scale: 0.5}
  payload: {type: constant, value: 128}
seed: 7
"#;

    #[test]
    fn parses_yaml_document() {
        let config = ClusterConfig::from_yaml(YAML).expect("should parse");
        assert_eq!(config.malcolm_nodes.len(), 2);
        assert_eq!(config.malcolm_nodes[0].io_count.get(), 1024);
        assert_eq!(config.malcolm_nodes[0].core_perf, 1.0);
        assert_eq!(config.malcolm_nodes[1].core_perf, 1.5);
        assert_eq!(config.malcolm_nodes[1].bandwidth.get(), 8000);
        assert_eq!(config.seed, 7);
        config.validate().expect("should validate");
    }

    #[test]
    fn parses_json_document() {
        let json = r#"{
            "MalcolmNodes": [
                {"name": "a", "core_count": 1, "io_count": 1,
                 "overhead": 0.0, "bandwidth": "1G"}
            ],
            "Tasks": {
                "rate": {"type": "const", "value": 0.001},
                "runtime": {"type": "const", "value": 3.0},
                "io_time": {"type": "const", "value": 2.0},
                "payload": {"type": "const", "value": 128.0}
            }
        }"#;
        let config = ClusterConfig::from_json(json).expect("should parse");
        assert_eq!(config.malcolm_nodes[0].bandwidth.get(), 1 << 30);
        assert_eq!(config.seed, 0);
        config.validate().expect("should validate");
    }

    #[test]
    fn file_loader_dispatches_on_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let yaml_path = dir.path().join("cluster.yaml");
        std::fs::File::create(&yaml_path)
            .and_then(|mut f| f.write_all(YAML.as_bytes()))
            .expect("write yaml");

        let config = ClusterConfig::from_file(&yaml_path).expect("yaml file should load");
        assert_eq!(config.malcolm_nodes.len(), 2);

        let bad_path = dir.path().join("cluster.toml");
        std::fs::File::create(&bad_path)
            .and_then(|mut f| f.write_all(b"x = 1"))
            .expect("write toml");
        assert!(matches!(
            ClusterConfig::from_file(&bad_path),
            Err(Error::UnsupportedExtension { .. })
        ));

        assert!(matches!(
            ClusterConfig::from_file(dir.path().join("missing.yaml")),
            Err(Error::FileReadError { .. })
        ));
    }

    #[test]
    fn duplicate_node_names_are_rejected() {
        let mut config = ClusterConfig::from_yaml(YAML).expect("should parse");
        config.malcolm_nodes[1].name = "alpha".to_owned();
        let err = config.validate().expect_err("duplicate names should fail");
        match err {
            Error::InvalidConfiguration { errors } => {
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, Error::DuplicateNodeName { name } if name == "alpha")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn all_violations_are_collected() {
        let mut config = ClusterConfig::from_yaml(YAML).expect("should parse");
        config.malcolm_nodes[0].core_count = IecInt::new(0);
        config.malcolm_nodes[0].overhead = -1.0;
        config.malcolm_nodes[1].io_perf = 0.0;
        config.tasks.rate = SamplerConfig::Const { value: 0.0 };
        let err = config.validate().expect_err("should fail");
        match err {
            Error::InvalidConfiguration { errors } => assert_eq!(errors.len(), 4),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_cluster_is_rejected() {
        let mut config = ClusterConfig::from_yaml(YAML).expect("should parse");
        config.malcolm_nodes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let json = r#"{
            "MalcolmNodes": [
                {"name": "a", "core_count": 1, "io_count": 1,
                 "overhead": 0.0, "bandwidth": 1, "cores": 4}
            ],
            "Tasks": {
                "rate": {"type": "const", "value": 1},
                "runtime": {"type": "const", "value": 1},
                "io_time": {"type": "const", "value": 1},
                "payload": {"type": "const", "value": 1}
            }
        }"#;
        assert!(ClusterConfig::from_json(json).is_err());
    }
}
