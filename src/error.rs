use std::fmt;

use crate::io::project_io::ProjectError;
use crate::io::task_store::StoreError;

/// Category of a surfaced error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parsing,
    Operation,
    Validation,
    Dependency,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Io => "I/O",
            ErrorKind::Parsing => "Parsing",
            ErrorKind::Operation => "Operation",
            ErrorKind::Validation => "Validation",
            ErrorKind::Dependency => "Dependency",
        }
    }
}

/// A structured error ready for display: title, message, optional details,
/// and recovery hints in the order they should be tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub title: String,
    pub message: String,
    pub details: Option<String>,
    pub hints: Vec<String>,
}

impl AppError {
    pub fn new(kind: ErrorKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        AppError {
            kind,
            title: title.into(),
            message: message.into(),
            details: None,
            hints: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// Convert a service error raised by a workflow. Returns `None` for
    /// cancellation, which is never shown as a failure.
    pub fn from_service(title: &str, err: &ServiceError) -> Option<AppError> {
        let converted = match err {
            ServiceError::Cancelled => return None,
            ServiceError::Validation(msg) => AppError::new(ErrorKind::Validation, title, msg)
                .with_hint("Check the input and try again"),
            ServiceError::NotFound(id) => {
                AppError::new(ErrorKind::Validation, title, format!("task {} not found", id))
                    .with_hint("Press r to reload the task list")
            }
            ServiceError::Dependency(msg) => AppError::new(ErrorKind::Dependency, title, msg)
                .with_hint("Remove or reassign the dependent tasks first")
                .with_hint("Or enable force to strip the references"),
            ServiceError::Operation(msg) => AppError::new(ErrorKind::Operation, title, msg)
                .with_hint("Retry the operation")
                .with_hint("See the log file under .taskdeck/logs for details"),
            ServiceError::UndoUnavailable => {
                AppError::new(ErrorKind::Operation, title, "undo unavailable")
                    .with_details("the undo token expired or was already used")
            }
            ServiceError::Store(store) => AppError::from(store).retitled(title),
        };
        Some(converted)
    }

    fn retitled(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<&StoreError> for AppError {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::Io { path, source } => {
                AppError::new(ErrorKind::Io, "Task file error", source.to_string())
                    .with_details(path.display().to_string())
                    .with_hint("Check that the file exists and is writable")
            }
            StoreError::Json { path, source } => AppError::new(
                ErrorKind::Parsing,
                "Task file is not valid JSON",
                source.to_string(),
            )
            .with_details(path.display().to_string())
            .with_hint("Fix the JSON by hand or restore it from version control"),
            StoreError::Lock(lock) => {
                AppError::new(ErrorKind::Io, "Task file is locked", lock.to_string())
                    .with_hint("Another taskdeck process may be writing; try again")
            }
            StoreError::DuplicateId(id) => AppError::new(
                ErrorKind::Operation,
                "Task already exists",
                format!("task {} was created again after the delete", id),
            )
            .with_hint("Delete or renumber the new task, then undo"),
            StoreError::NotFound(id) => AppError::new(
                ErrorKind::Validation,
                "Task not found",
                format!("task {} not found", id),
            )
            .with_hint("Press r to reload the task list"),
        }
    }
}

impl From<&ProjectError> for AppError {
    fn from(err: &ProjectError) -> Self {
        match err {
            ProjectError::NotAProject => AppError::new(
                ErrorKind::Io,
                "No project",
                "no .taskdeck/ directory found",
            )
            .with_hint("Run `td init` in your project root"),
            ProjectError::ConfigParse { path, source } => {
                AppError::new(ErrorKind::Parsing, "Invalid config", source.to_string())
                    .with_details(path.display().to_string())
                    .with_hint("Fix the file or delete it to use defaults")
            }
            ProjectError::Io(source) => {
                AppError::new(ErrorKind::Io, "Project error", source.to_string())
            }
        }
    }
}

/// Errors returned by the analysis, import, expansion, and delete services
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("operation cancelled")]
    Cancelled,
    #[error("{0}")]
    Validation(String),
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Dependency(String),
    #[error("{0}")]
    Operation(String),
    #[error("undo unavailable")]
    UndoUnavailable,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ServiceError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_never_an_app_error() {
        assert!(AppError::from_service("Analyze", &ServiceError::Cancelled).is_none());
    }

    #[test]
    fn dependency_errors_carry_hints() {
        let err = AppError::from_service(
            "Delete failed",
            &ServiceError::Dependency("has 3 dependents".into()),
        )
        .unwrap();
        assert_eq!(err.kind, ErrorKind::Dependency);
        assert_eq!(err.title, "Delete failed");
        assert_eq!(err.message, "has 3 dependents");
        assert_eq!(err.hints.len(), 2);
    }

    #[test]
    fn store_errors_keep_caller_title() {
        let err = AppError::from_service(
            "Import failed",
            &ServiceError::Store(StoreError::NotFound("4".into())),
        )
        .unwrap();
        assert_eq!(err.title, "Import failed");
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn recreated_id_blocks_undo_with_a_hint() {
        let err = AppError::from_service(
            "Undo delete failed",
            &ServiceError::Store(StoreError::DuplicateId("5".into())),
        )
        .unwrap();
        assert_eq!(err.kind, ErrorKind::Operation);
        assert_eq!(err.message, "task 5 was created again after the delete");
        assert!(!err.hints.is_empty());
    }

    #[test]
    fn display_includes_details() {
        let err = AppError::new(ErrorKind::Io, "Oops", "bad").with_details("file.json");
        assert_eq!(err.to_string(), "Oops: bad (file.json)");
    }
}
