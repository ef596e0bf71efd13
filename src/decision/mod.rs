//! Decision core: trend, guardrails, learned classifier and their composition.

pub mod classifier;
pub mod engine;
pub mod guardrail;
pub mod trend;
pub mod verdict;

pub use classifier::{AnomalyClassifier, AnomalyModel, ModelLabel};
pub use engine::{Decision, DecisionEngine};
pub use guardrail::GuardrailEngine;
pub use trend::{DecisionState, TrendTracker};
pub use verdict::{AnomalyCause, NormalCause, Severity, Verdict, VerdictKind, WaitReason};
