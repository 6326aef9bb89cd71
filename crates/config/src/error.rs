// SPDX-License-Identifier: Apache-2.0

//! Errors for the config crate.
//!
//! Validation does not stop at the first violation: every problem found in a
//! configuration file is collected and reported together under
//! [`Error::InvalidConfiguration`].

use miette::Diagnostic;

/// Errors that can occur while reading, parsing, or validating a cluster
/// configuration.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// A collection of errors that occurred during parsing or validating the
    /// configuration.
    #[error("Invalid configuration: {errors:?}")]
    #[diagnostic(code(malcolm_sim::invalid_configuration))]
    InvalidConfiguration {
        /// A list of errors that occurred during parsing or validating the
        /// configuration.
        #[related]
        errors: Vec<Error>,
    },

    /// An error that occurred while reading a configuration file.
    #[error("Failed to read configuration file `{path}`: {details}")]
    #[diagnostic(code(malcolm_sim::file_read_error))]
    FileReadError {
        /// The path that could not be read.
        path: String,
        /// A description of the error that occurred.
        details: String,
    },

    /// The configuration file extension is not one the loader dispatches on.
    #[error("Unsupported configuration file extension `{extension}` (expected json, yaml or yml)")]
    #[diagnostic(code(malcolm_sim::unsupported_extension))]
    UnsupportedExtension {
        /// The offending extension (empty when the path has none).
        extension: String,
    },

    /// An error that occurred while deserializing a configuration file.
    #[error("{format} deserialization error: {details}")]
    #[diagnostic(code(malcolm_sim::deserialization_error))]
    DeserializationError {
        /// The format of the configuration file (e.g. "JSON").
        format: String,
        /// A description of the error that occurred.
        details: String,
    },

    /// A string did not match the IEC integer grammar.
    #[error("Invalid IEC integer literal `{literal}`")]
    #[diagnostic(code(malcolm_sim::invalid_iec_literal))]
    InvalidIecLiteral {
        /// The rejected literal.
        literal: String,
    },

    /// Two nodes share the same name.
    #[error("Duplicated node name `{name}`")]
    #[diagnostic(code(malcolm_sim::duplicate_node_name))]
    DuplicateNodeName {
        /// The name that was used more than once.
        name: String,
    },

    /// The node list is empty.
    #[error("Configuration declares no Malcolm nodes")]
    #[diagnostic(code(malcolm_sim::empty_cluster))]
    EmptyCluster,

    /// A numeric field violates its bound.
    #[error("Node `{node}`: field `{field}` must be {requirement} (got {value})")]
    #[diagnostic(code(malcolm_sim::invalid_node_field))]
    InvalidNodeField {
        /// The node the field belongs to.
        node: String,
        /// The offending field.
        field: &'static str,
        /// The bound the field violates.
        requirement: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A sampler parameter violates its bound.
    #[error("Sampler `{sampler}`: parameter `{parameter}` must be positive (got {value})")]
    #[diagnostic(code(malcolm_sim::invalid_sampler))]
    InvalidSampler {
        /// The workload sampler the parameter belongs to.
        sampler: &'static str,
        /// The offending parameter.
        parameter: &'static str,
        /// The rejected value.
        value: f64,
    },
}
