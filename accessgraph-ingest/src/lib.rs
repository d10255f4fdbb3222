//! # AccessGraph Ingest — Authorization-Document Normalizers
//!
//! Three independent, side-effect-free parsers sharing one output shape:
//! - AWS IAM (roles, policies, attachments, trust documents)
//! - Kubernetes RBAC (ServiceAccounts, Roles, Bindings, NetworkPolicies)
//! - Terraform plan deltas (planned policies, wildcard expansions)
//!
//! A malformed record is skipped with a recorded diagnostic; a malformed
//! file fails its parser; a missing optional source yields an empty batch.
//! The pipeline driver composes the batches, builds the graph, and persists
//! it as one snapshot.

pub mod aws;
pub mod k8s;
pub mod pipeline;
pub mod terraform;

pub use aws::parse_aws;
pub use k8s::parse_k8s;
pub use pipeline::{run_ingest, IngestOptions, IngestReport};
pub use terraform::parse_terraform;
