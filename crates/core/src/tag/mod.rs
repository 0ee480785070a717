//! Topic tagging: rule tables, subject configuration, scoring and the
//! classifier seam with optional HTTP escalation.

pub mod classify;
pub mod llm;
pub mod rules;
pub mod scorer;
pub mod subject;

pub use classify::{Classifier, ClassifyRequest, EscalatingClassifier, RuleBasedClassifier};
pub use llm::{HttpClassifier, HttpClassifierConfig};
pub use subject::{SubjectConfig, SubjectInfo};
