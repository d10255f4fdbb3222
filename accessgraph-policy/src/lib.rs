//! # AccessGraph Policy Layer — Fact Projection & Rule Evaluation
//!
//! Projects a loaded graph into the compact fact object the external rule
//! engine consumes, and defines the evaluator seam:
//! - `build_facts`: principals-with-trust, policies-with-wildcards, K8s bindings
//! - `Evaluator`: the single-method interface the rule engine sits behind
//! - `HttpEvaluator`: the JSON-over-HTTP client (10 s default deadline)
//! - `FixedEvaluator`: a canned-findings fake for tests

pub mod evaluator;
pub mod facts;

pub use evaluator::{Evaluator, Finding, FixedEvaluator, HttpEvaluator, Severity};
pub use facts::{build_facts, BindingFact, K8sFacts, PolicyFact, PolicyFacts, RoleFact, TrustFact};
