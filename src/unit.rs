//! Client and unit identifiers.
//!
//! - [`ClientId`] identifies one connected session (connect → disconnect).
//! - [`UnitPos`] identifies one unit of world data by its two coordinates.
//! - [`UnitKey`] is the packed `u64` form of a [`UnitPos`]; keys are unique per client only.

use std::fmt;

use uuid::Uuid;

/// Packed unit coordinates.
pub type UnitKey = u64;

/// Stable identifier of a connected client session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Wraps an existing session id.
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generates a fresh random id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for ClientId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Coordinates of one unit of world data.
///
/// # Example
/// ```
/// use sendvisor::UnitPos;
///
/// let pos = UnitPos::new(-3, 7);
/// assert_eq!(UnitPos::from_key(pos.key()), pos);
/// assert_eq!(pos.to_string(), "[-3, 7]");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UnitPos {
    pub x: i32,
    pub z: i32,
}

impl UnitPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Packs `x` into the low and `z` into the high 32 bits.
    #[inline]
    pub const fn key(&self) -> UnitKey {
        (self.x as u32 as u64) | ((self.z as u32 as u64) << 32)
    }

    /// Inverse of [`UnitPos::key`].
    #[inline]
    pub const fn from_key(key: UnitKey) -> Self {
        Self {
            x: key as u32 as i32,
            z: (key >> 32) as u32 as i32,
        }
    }
}

impl fmt::Display for UnitPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_matches_packing() {
        assert_eq!(UnitPos::new(1, 0).key(), 1);
        assert_eq!(UnitPos::new(0, 1).key(), 1 << 32);
        assert_eq!(UnitPos::new(-1, 0).key(), 0xFFFF_FFFF);
    }

    #[test]
    fn negative_coordinates_survive_packing() {
        for pos in [
            UnitPos::new(i32::MIN, i32::MAX),
            UnitPos::new(-1, -1),
            UnitPos::new(30_000, -30_000),
        ] {
            assert_eq!(UnitPos::from_key(pos.key()), pos);
        }
    }

    #[test]
    fn distinct_positions_have_distinct_keys() {
        assert_ne!(UnitPos::new(3, 4).key(), UnitPos::new(4, 3).key());
    }
}
