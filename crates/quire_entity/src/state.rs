//! Lifecycle states of change-tracked entities.

use std::fmt;
use std::str::FromStr;

use quire_foundation::{Error, Result};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a record.
///
/// `Unchanged` records have no changed fields. `Changed` records have at
/// least one changed field or were put in that state explicitly. `Detached`
/// records belong to no collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordState {
    /// Added to a collection and never accepted.
    Added,
    /// Modified since the last accept.
    Changed,
    /// No changes since the last accept.
    Unchanged,
    /// Marked for removal from its collection.
    Deleted,
    /// Not part of any collection.
    #[default]
    Detached,
}

impl RecordState {
    /// Name of the state.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Added => "Added",
            Self::Changed => "Changed",
            Self::Unchanged => "Unchanged",
            Self::Deleted => "Deleted",
            Self::Detached => "Detached",
        }
    }

    /// State after all changes were accepted.
    #[must_use]
    pub const fn accepted(self) -> Self {
        match self {
            Self::Added | Self::Changed => Self::Unchanged,
            Self::Deleted => Self::Detached,
            other => other,
        }
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RecordState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "Added" => Self::Added,
            "Changed" => Self::Changed,
            "Unchanged" => Self::Unchanged,
            "Deleted" => Self::Deleted,
            "Detached" => Self::Detached,
            _ => return Err(Error::invalid_value("record state", s)),
        })
    }
}
