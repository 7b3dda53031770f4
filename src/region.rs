// ============================================================================
// REGIONS — fill-mode areas and completion tracking
// ============================================================================

use std::collections::BTreeSet;

use crate::geometry::{Point, Shape};

/// One independently fillable area of a fill-mode artwork.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub name: String,
    pub shape: Shape,
}

impl Region {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self { name: name.into(), shape }
    }
}

/// Ordered regions.  When shapes overlap, the earlier region wins.
#[derive(Clone, Debug, Default)]
pub struct RegionSet {
    regions: Vec<Region>,
}

impl RegionSet {
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    /// Index of the first region containing `p`.
    pub fn find(&self, p: Point) -> Option<usize> {
        self.regions.iter().position(|r| r.shape.contains(p))
    }
}

/// What a fill action changed in the tracker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FillOutcome {
    /// The region went from unfilled to filled.
    pub newly_filled: bool,
    /// Every region is filled and this action is the one that got there.
    pub completed: bool,
}

/// Set of currently filled regions for the active artwork.
///
/// Completion is latched: it is reported once when the set reaches the full
/// region count, and re-armed only when the set drops below it again
/// (an erase, a canvas clear or an artwork switch).
#[derive(Clone, Debug, Default)]
pub struct FillTracker {
    filled: BTreeSet<usize>,
    completion_reported: bool,
}

impl FillTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.filled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filled.is_empty()
    }

    pub fn is_filled(&self, index: usize) -> bool {
        self.filled.contains(&index)
    }

    pub fn clear(&mut self) {
        self.filled.clear();
        self.completion_reported = false;
    }

    /// Record a fill (or erase) of `index` on an artwork with `total` regions.
    pub fn record(&mut self, index: usize, erased: bool, total: usize) -> FillOutcome {
        let mut outcome = FillOutcome::default();
        if erased {
            self.filled.remove(&index);
        } else {
            outcome.newly_filled = self.filled.insert(index);
        }

        let all_filled = total > 0 && self.filled.len() == total;
        if !all_filled {
            self.completion_reported = false;
        } else if !self.completion_reported {
            self.completion_reported = true;
            outcome.completed = true;
        }
        outcome
    }
}
