use crate::consts::PRIORITY_NUM_LEVELS;
use crate::enums::PriorityLevel;
use crate::error::AbiError;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// One value per priority band, indexed by [`PriorityLevel`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityBands<T>(pub [T; PRIORITY_NUM_LEVELS]);

impl<T> PriorityBands<T> {
    pub const fn new(values: [T; PRIORITY_NUM_LEVELS]) -> Self {
        Self(values)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PriorityLevel, &T)> {
        PriorityLevel::ALL.iter().copied().zip(self.0.iter())
    }

    pub fn as_array(&self) -> &[T; PRIORITY_NUM_LEVELS] {
        &self.0
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PriorityBands<U> {
        PriorityBands(self.0.map(f))
    }
}

impl<T: Copy> PriorityBands<T> {
    pub const fn splat(value: T) -> Self {
        Self([value; PRIORITY_NUM_LEVELS])
    }
}

impl<T: Clone> TryFrom<&[T]> for PriorityBands<T> {
    type Error = AbiError;

    /// Fails unless all five bands are present.
    fn try_from(values: &[T]) -> Result<Self, AbiError> {
        let array: &[T; PRIORITY_NUM_LEVELS] = values
            .try_into()
            .map_err(|_| AbiError::BandCount(values.len()))?;
        Ok(Self(array.clone()))
    }
}

impl<T> Index<PriorityLevel> for PriorityBands<T> {
    type Output = T;

    fn index(&self, level: PriorityLevel) -> &T {
        &self.0[level.index()]
    }
}

impl<T> IndexMut<PriorityLevel> for PriorityBands<T> {
    fn index_mut(&mut self, level: PriorityLevel) -> &mut T {
        &mut self.0[level.index()]
    }
}
