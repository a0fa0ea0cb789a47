//! Typed failures raised while building, resolving and launching daemon commands.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HerderError {
  /// Malformed or incomplete runner argv.
  #[error("{0}")]
  Usage(String),
  /// Strategy exclusivity or root-without-user violations.
  #[error("{0}")]
  Validation(String),
  /// Target file missing, unreadable or not locatable.
  #[error("{0}")]
  Resolution(String),
  /// Identity switch failed or could be undone.
  #[error("{0}")]
  Privilege(String),
  /// Host environment unusable, e.g. temp dir not writable.
  #[error("{0}")]
  Environment(String),
}

impl HerderError {
  /// Process exit code used by the binaries for this failure class.
  #[must_use]
  pub fn exit_code(&self) -> i32 {
    match self {
      Self::Usage(_) => 2,
      Self::Validation(_) => 3,
      Self::Resolution(_) => 4,
      Self::Privilege(_) => 5,
      Self::Environment(_) => 6,
    }
  }
}

/// Exit code for any error chain: typed failures map to their class, the rest to 1.
#[must_use]
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
  err
    .chain()
    .find_map(|cause| cause.downcast_ref::<HerderError>())
    .map_or(1, HerderError::exit_code)
}
