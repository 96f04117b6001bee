//! Severity policy: which fields may block acceptance.

use descriptor_model::DEFAULT_IDENTIFIER_KEY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Critical,
    NonCritical,
}

impl Severity {
    pub fn is_critical(&self) -> bool {
        matches!(self, Severity::Critical)
    }
}

/// Decides how serious an issue on a given field is.
pub trait SeverityPolicy: Send + Sync {
    fn severity(&self, field: &str) -> Severity;
}

impl<F> SeverityPolicy for F
where
    F: Fn(&str) -> Severity + Send + Sync,
{
    fn severity(&self, field: &str) -> Severity {
        self(field)
    }
}

/// Every field is critical except a fixed exempt set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExemptFields {
    exempt: BTreeSet<String>,
}

impl ExemptFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exempt: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_exempt(mut self, field: impl Into<String>) -> Self {
        self.exempt.insert(field.into());
        self
    }

    pub fn is_exempt(&self, field: &str) -> bool {
        self.exempt.contains(field)
    }
}

impl Default for ExemptFields {
    fn default() -> Self {
        Self::new([DEFAULT_IDENTIFIER_KEY])
    }
}

impl SeverityPolicy for ExemptFields {
    fn severity(&self, field: &str) -> Severity {
        if self.is_exempt(field) {
            Severity::NonCritical
        } else {
            Severity::Critical
        }
    }
}
