//! # chaos-types
//!
//! Experiment descriptor types for db-chaos.
//!
//! This crate provides the object model for the failure experiments db-chaos
//! submits to Chaos Mesh, and the pure builder functions that produce them:
//! - [`ExperimentKind`] - The fixed catalogue of failure classes
//! - [`ExperimentDescriptor`] - A serializable Chaos Mesh resource
//! - [`builder`] - Side-effect free construction, one function per kind
//! - [`DescriptorError`] - Malformed input to a builder

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
mod error;
mod experiment;

pub use builder::DiskLatency;
pub use error::DescriptorError;
pub use experiment::{
    Direction, ExperimentDescriptor, ExperimentKind, ExperimentSpec, IoSpec, LabelSelectors,
    Metadata, NetworkSpec, PodSpec, Selector, Target, API_VERSION, POD_NAME_LABEL, QUIESCENT,
};
