//! Error types shared across the Strake crates

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Strake operations
pub type Result<T> = std::result::Result<T, Error>;

/// The policy a container tried to breach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyBreach {
    #[error("privileged execution")]
    Privileged,
    #[error("mounting the host docker socket")]
    DockerSocketMount,
}

/// Errors that can occur while loading configuration or executing jobs
#[derive(Debug, Error)]
pub enum Error {
    /// Config file could not be read
    #[error("error reading config file {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be parsed
    #[error("error parsing config file: {0}")]
    ConfigParse(#[from] serde_yml::Error),

    /// A pipeline stage references a job that does not exist
    #[error(
        "pipeline \"{pipeline}\" stage {stage_index} (zero-indexed) depends on undefined job \"{job}\""
    )]
    UnresolvedJobReference {
        pipeline: String,
        stage_index: usize,
        job: String,
    },

    /// A job declares no containers
    #[error("job \"{0}\" does not declare any containers")]
    EmptyJob(String),

    /// A requested job name does not exist
    #[error("job \"{0}\" not found")]
    JobNotFound(String),

    /// A requested pipeline name does not exist
    #[error("pipeline \"{0}\" not found")]
    PipelineNotFound(String),

    /// A selector pattern failed to compile
    #[error("invalid selector pattern \"{pattern}\"")]
    SelectorPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Secrets file could not be read
    #[error("error reading secrets file {path}")]
    SecretsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A container asked for something the project does not permit
    #[error("container \"{container}\" requested {breach}, but this is not permitted by the project")]
    PolicyViolation {
        container: String,
        breach: PolicyBreach,
    },

    /// An image could not be pulled
    #[error("error pulling image \"{image}\": {message}")]
    ImagePull { image: String, message: String },

    /// The cluster rejected creation of an execution unit
    #[error("error creating execution unit \"{unit}\": {message}")]
    UnitCreation { unit: String, message: String },

    /// The status feed for an execution unit could not be established
    #[error("error watching execution unit \"{unit}\": {message}")]
    WatchSubscription { unit: String, message: String },

    /// The primary container of an execution unit terminated uncleanly
    #[error("execution unit \"{unit}\" failed")]
    UnitFailed { unit: String },

    /// No terminal status was observed before the deadline
    #[error("execution unit \"{unit}\" timed out")]
    TimedOut { unit: String },

    /// A locally-run job's primary container exited non-zero
    #[error("job \"{job}\" failed with non-zero exit code {code}")]
    JobExitedNonZero { job: String, code: i32 },

    /// A backend process invocation failed before producing a job outcome
    #[error("{0}")]
    Runtime(String),

    /// Two or more jobs of one dispatch batch failed
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl Error {
    /// Check if this error is a job timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Check if this error is a policy violation
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, Self::PolicyViolation { .. })
    }
}

/// Two or more failures collected off one completion channel.
///
/// Entries are kept in arrival order (the order jobs finished, which is
/// unrelated to the order they were dispatched). Never empty: zero or one
/// failure is represented without this wrapper, see [`merge`].
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<Error>,
}

impl std::error::Error for AggregateError {}

impl AggregateError {
    /// The underlying errors, in arrival order
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Number of underlying errors
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false: an AggregateError holds at least two errors
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} errors occurred: ", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

/// Merges the failures of one dispatch batch into a single result.
///
/// Zero collected errors is success. Exactly one is returned as-is so the
/// caller can still branch on its concrete kind (a timeout stays a
/// timeout). Two or more are wrapped in an [`AggregateError`].
pub fn merge(errors: Vec<Error>) -> Result<()> {
    let mut errors = errors;
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(Error::Aggregate(AggregateError { errors })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_empty_is_ok() {
        assert!(merge(Vec::new()).is_ok());
    }

    #[test]
    fn test_merge_single_preserves_kind() {
        let errors = vec![Error::TimedOut {
            unit: "demo-unit".to_string(),
        }];
        let err = merge(errors).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_merge_many_wraps_in_aggregate() {
        let errors = vec![
            Error::UnitFailed {
                unit: "unit-a".to_string(),
            },
            Error::TimedOut {
                unit: "unit-b".to_string(),
            },
        ];
        match merge(errors).unwrap_err() {
            Error::Aggregate(agg) => {
                assert_eq!(agg.len(), 2);
                // Arrival order is preserved
                assert!(matches!(agg.errors()[0], Error::UnitFailed { .. }));
                assert!(matches!(agg.errors()[1], Error::TimedOut { .. }));
            }
            other => panic!("expected aggregate, got {other}"),
        }
    }

    #[test]
    fn test_aggregate_display_includes_all_messages() {
        let errors = vec![
            Error::UnitFailed {
                unit: "unit-a".to_string(),
            },
            Error::UnitFailed {
                unit: "unit-b".to_string(),
            },
        ];
        let err = merge(errors).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unit-a"));
        assert!(message.contains("unit-b"));
        assert!(message.starts_with("2 errors occurred"));
    }
}
