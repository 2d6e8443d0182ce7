//! Results of tree operations that can be refused or degraded
//!
//! Expected policy outcomes (a name is taken, the caller cannot write here)
//! are not errors: they come back as [`Outcome::Refused`]. Operations that
//! succeeded only by falling back to a weaker assumption, such as treating a
//! held key as already unwrapped or serving a cached child list, come back as
//! [`Outcome::Degraded`]. Hard failures stay in `Result::Err`.

/// Why a mutation was not attempted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Refusal {
    #[error("not a directory")]
    NotDirectory,
    #[error("not writable by this session")]
    NotWritable,
    #[error("illegal name: {0:?}")]
    IllegalName(String),
    #[error("name already taken: {0}")]
    NameCollision(String),
    #[error("missing read credential")]
    MissingCredential,
}

/// Which fallback an operation had to take
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Degradation {
    /// The parent key could not be unwrapped, so the held key was assumed
    /// to be the parent key already
    #[error("held key assumed to be the parent key")]
    AssumedParentKey,
    /// The held key unwraps the meta key: it is a restricted capability
    /// that cannot enumerate children, so the cache was served
    #[error("restricted capability, served cached children")]
    RestrictedCapability,
    /// Fetching children failed, so the cache was served
    #[error("fetch failed, served cached children: {0}")]
    FetchFailed(String),
}

#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T = ()> {
    Done(T),
    Degraded(T, Degradation),
    Refused(Refusal),
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(_, _))
    }

    pub fn is_refused(&self) -> bool {
        matches!(self, Outcome::Refused(_))
    }

    /// Done or degraded: the operation took effect
    pub fn succeeded(&self) -> bool {
        !self.is_refused()
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Done(value) | Outcome::Degraded(value, _) => Some(value),
            Outcome::Refused(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Done(value) | Outcome::Degraded(value, _) => Some(value),
            Outcome::Refused(_) => None,
        }
    }

    pub fn refusal(&self) -> Option<&Refusal> {
        match self {
            Outcome::Refused(refusal) => Some(refusal),
            _ => None,
        }
    }

    pub fn degradation(&self) -> Option<&Degradation> {
        match self {
            Outcome::Degraded(_, degradation) => Some(degradation),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(value) => Outcome::Done(f(value)),
            Outcome::Degraded(value, degradation) => Outcome::Degraded(f(value), degradation),
            Outcome::Refused(refusal) => Outcome::Refused(refusal),
        }
    }

    /// Split into the value and whatever degradation produced it
    pub fn into_parts(self) -> Result<(T, Option<Degradation>), Refusal> {
        match self {
            Outcome::Done(value) => Ok((value, None)),
            Outcome::Degraded(value, degradation) => Ok((value, Some(degradation))),
            Outcome::Refused(refusal) => Err(refusal),
        }
    }

    /// Build from a value and an optional degradation
    pub fn from_parts(value: T, degradation: Option<Degradation>) -> Self {
        match degradation {
            Some(degradation) => Outcome::Degraded(value, degradation),
            None => Outcome::Done(value),
        }
    }
}
