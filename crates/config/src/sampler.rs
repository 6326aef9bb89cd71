// SPDX-License-Identifier: Apache-2.0

//! Sampler configurations for the workload generator.

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Configuration of a single random sampler.
///
/// Dispatched on the `type` field; `const`/`constant` and
/// `gaussian`/`normal` are accepted as synonyms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SamplerConfig {
    /// Emits a fixed value on every draw.
    #[serde(alias = "constant")]
    Const {
        /// The fixed value.
        value: f64,
    },
    /// Draws from a normal distribution.
    #[serde(alias = "normal")]
    Gaussian {
        /// Mean of the distribution.
        center: f64,
        /// Standard deviation of the distribution.
        scale: f64,
    },
}

impl SamplerConfig {
    /// Collects every bound violation of this sampler into `errors`.
    ///
    /// All parameters must be strictly positive.
    pub fn validate(&self, sampler: &'static str, errors: &mut Vec<Error>) {
        match *self {
            SamplerConfig::Const { value } => {
                if value <= 0.0 {
                    errors.push(Error::InvalidSampler {
                        sampler,
                        parameter: "value",
                        value,
                    });
                }
            }
            SamplerConfig::Gaussian { center, scale } => {
                if center <= 0.0 {
                    errors.push(Error::InvalidSampler {
                        sampler,
                        parameter: "center",
                        value: center,
                    });
                }
                if scale <= 0.0 {
                    errors.push(Error::InvalidSampler {
                        sampler,
                        parameter: "scale",
                        value: scale,
                    });
                }
            }
        }
    }
}
