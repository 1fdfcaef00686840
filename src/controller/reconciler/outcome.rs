//! # Outcome
//!
//! Result of one reconciliation pass. Only [`Outcome::Retry`] crosses into
//! kube-runtime's error policy; terminal outcomes are reported through events
//! and logs and then absorbed.

use super::types::ReconcilerError;

/// Why a reconciliation finished without needing a retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Certificate uploaded and status written
    Synced,
    /// Secret unchanged since the last upload
    Unchanged,
    /// Nothing to do: resource gone or no upload target
    NoOp,
    /// Certificate or credential Secret missing
    AbsentDependency,
    /// Wrong secret type, missing keys or unusable credential configuration
    InvalidInput,
    /// Cloudflare answered with an error list
    ApplicationRejected,
}

impl Category {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Synced => "synced",
            Category::Unchanged => "unchanged",
            Category::NoOp => "no-op",
            Category::AbsentDependency => "absent-dependency",
            Category::InvalidInput => "invalid-input",
            Category::ApplicationRejected => "application-rejected",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum Outcome {
    Terminal(Category, String),
    Retry(ReconcilerError),
}

impl Outcome {
    pub fn terminal(category: Category, detail: impl Into<String>) -> Self {
        Outcome::Terminal(category, detail.into())
    }

    #[must_use]
    pub fn is_retry(&self) -> bool {
        matches!(self, Outcome::Retry(_))
    }

    #[must_use]
    pub fn category(&self) -> Option<Category> {
        match self {
            Outcome::Terminal(category, _) => Some(*category),
            Outcome::Retry(_) => None,
        }
    }

    /// Map to the shape kube-runtime expects
    ///
    /// # Errors
    ///
    /// Returns the retryable error of an [`Outcome::Retry`].
    pub fn into_result(self) -> Result<Category, ReconcilerError> {
        match self {
            Outcome::Terminal(category, _) => Ok(category),
            Outcome::Retry(e) => Err(e),
        }
    }
}

impl From<ReconcilerError> for Outcome {
    fn from(error: ReconcilerError) -> Self {
        Outcome::Retry(error)
    }
}
