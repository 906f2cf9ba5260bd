//! The transient data payload of a run.

/// The data carried between extract and clean.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DataSlot<D> {
    /// No data: before extract and after clean.
    #[default]
    Empty,
    /// Extracted (and possibly transformed) data.
    Populated(D),
}

impl<D> DataSlot<D> {
    /// Returns true if data is present.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        matches!(self, Self::Populated(_))
    }

    /// Returns a reference to the data, if present.
    #[must_use]
    pub fn as_ref(&self) -> Option<&D> {
        match self {
            Self::Populated(data) => Some(data),
            Self::Empty => None,
        }
    }

    /// Returns a mutable reference to the data, if present.
    pub fn as_mut(&mut self) -> Option<&mut D> {
        match self {
            Self::Populated(data) => Some(data),
            Self::Empty => None,
        }
    }

    /// Takes the data out, leaving the slot empty.
    pub fn take(&mut self) -> Option<D> {
        match std::mem::take(self) {
            Self::Populated(data) => Some(data),
            Self::Empty => None,
        }
    }

    /// Stores `data`, replacing anything already present.
    pub fn fill(&mut self, data: D) {
        *self = Self::Populated(data);
    }

    /// Drops the data. Returns true if something was dropped.
    pub fn clear(&mut self) -> bool {
        self.take().is_some()
    }
}
