//! # chaos-kube
//!
//! Kubernetes orchestrator for db-chaos.
//!
//! Talks to the Kubernetes API directly over HTTP: pods are listed through
//! the core API and experiments are created and deleted as Chaos Mesh
//! custom resources. [`KubeClient`] implements
//! [`chaos_core::Orchestrator`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod client;
mod config;
mod error;

pub use client::{KubeClient, Pod, PodList, PodMetadata};
pub use config::{KubeConfig, DEFAULT_PROXY_URL, SERVICE_ACCOUNT_DIR};
pub use error::KubeError;
