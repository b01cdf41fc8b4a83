//! Validation issues reported during traversal
//!
//! Problems that do not stop traversal (template URI variables, availability
//! counts, branches skipped under `continue_on_error`) are reported through an
//! [`IssueSink`] instead of being returned as errors.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

/// Severity of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueSeverity {
    Error,
    Warning,
    Info,
}

/// Category of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    /// Template references a variable that the subdivision scheme does not define
    TemplateUriInvalidVariable,
    /// Template omits a variable that the subdivision scheme requires
    TemplateUriMissingVariable,
    /// Template has an unterminated `{`
    TemplateUriMalformed,
    /// `availableCount` disagrees with the decoded bitstream
    AvailableCountMismatch,
    /// Children of a tile could not be resolved and the branch was skipped
    TraversalBranchFailed,
}

impl IssueKind {
    pub fn severity(self) -> IssueSeverity {
        match self {
            Self::TemplateUriMissingVariable | Self::AvailableCountMismatch => {
                IssueSeverity::Warning
            }
            Self::TemplateUriInvalidVariable
            | Self::TemplateUriMalformed
            | Self::TraversalBranchFailed => IssueSeverity::Error,
        }
    }
}

/// A single issue with the tile path it was found at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub kind: IssueKind,
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    /// Create an issue with the default severity of its kind
    pub fn new(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: kind.severity(),
            kind,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Receiver for validation issues
pub trait IssueSink {
    fn add_issue(&self, issue: ValidationIssue);
}

/// Collects issues in memory
#[derive(Debug, Default)]
pub struct IssueCollector {
    issues: RefCell<Vec<ValidationIssue>>,
}

impl IssueCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.issues.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.borrow().is_empty()
    }

    /// Snapshot of the issues collected so far
    pub fn issues(&self) -> Vec<ValidationIssue> {
        self.issues.borrow().clone()
    }

    pub fn count_of(&self, kind: IssueKind) -> usize {
        self.issues.borrow().iter().filter(|i| i.kind == kind).count()
    }

    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues.into_inner()
    }
}

impl IssueSink for IssueCollector {
    fn add_issue(&self, issue: ValidationIssue) {
        self.issues.borrow_mut().push(issue);
    }
}

/// Forwards issues to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogIssueSink;

impl IssueSink for LogIssueSink {
    fn add_issue(&self, issue: ValidationIssue) {
        match issue.severity {
            IssueSeverity::Error => {
                log::error!("{:?} at {}: {}", issue.kind, issue.path, issue.message)
            }
            IssueSeverity::Warning => {
                log::warn!("{:?} at {}: {}", issue.kind, issue.path, issue.message)
            }
            IssueSeverity::Info => {
                log::info!("{:?} at {}: {}", issue.kind, issue.path, issue.message)
            }
        }
    }
}
