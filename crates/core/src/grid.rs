//! Grid addressing: row/column hashing, bounded coordinates, and the packed
//! `Cell`/`SpreadKey` that identifies spread-equivalent cells.
//!
//! Mirrors the hash-then-bucket approach of the teacher crate's
//! `core_types::spatial::SpatialIndex` (Morton-style packing into a single
//! integer key), simplified to 2D row/column packing since fire growth is a
//! raster problem, not a 3D point cloud.

use std::fmt;

/// Compile-time bound on grid column count, used to pack (row, column) into
/// a single `u64` hash. Chosen well above any realistic landscape raster
/// width; `Location` packing would need revisiting for wider rasters.
pub const MAX_COLUMNS: u32 = 1 << 20;

/// Compile-time bound on grid row count, used as the squared-distance
/// sentinel ceiling in [`crate::cell_points::INVALID_DISTANCE`].
pub const MAX_ROWS: u32 = 1 << 20;

/// An immutable (row, column) location, packed into a single hash for use as
/// a hash-map key. Equality and ordering derive entirely from the hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    hash: u64,
}

impl Location {
    /// Pack a (row, column) pair. Both must be non-negative and fit within
    /// `MAX_COLUMNS`/`MAX_ROWS`, or the packing is ambiguous.
    #[must_use]
    pub fn new(row: i32, column: i32) -> Self {
        debug_assert!(row >= 0 && column >= 0, "Location requires non-negative coordinates");
        debug_assert!((column as u32) < MAX_COLUMNS, "column out of packing range");
        let hash = (row as u64) * u64::from(MAX_COLUMNS) + (column as u64);
        Location { hash }
    }

    #[must_use]
    pub fn from_hash(hash: u64) -> Self {
        Location { hash }
    }

    #[must_use]
    pub fn hash(self) -> u64 {
        self.hash
    }

    #[must_use]
    pub fn row(self) -> i32 {
        (self.hash / u64::from(MAX_COLUMNS)) as i32
    }

    #[must_use]
    pub fn column(self) -> i32 {
        (self.hash % u64::from(MAX_COLUMNS)) as i32
    }

    /// Whether this location lies within a `rows x columns` grid (both
    /// bounds exclusive of the upper edge).
    #[must_use]
    pub fn in_bounds(self, rows: i32, columns: i32) -> bool {
        let r = self.row();
        let c = self.column();
        r >= 0 && r < rows && c >= 0 && c < columns
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row(), self.column())
    }
}

/// The (slope, aspect, fuel-code) tuple that identifies spread-equivalent
/// cells: any two cells sharing a key behave identically under identical
/// weather, so `SpreadInfo` is computed once per key, not once per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpreadKey {
    /// Slope percent, saturated to `0..=70`.
    pub slope: u8,
    /// Aspect azimuth in degrees, `0..360`.
    pub aspect: u16,
    /// Index into the fuel lookup table, `0..NUMBER_OF_FUELS`.
    pub fuel_code: u16,
}

impl SpreadKey {
    #[must_use]
    pub fn new(slope_pct: f32, aspect_deg: f32, fuel_code: u16) -> Self {
        let slope = slope_pct.max(0.0).min(70.0).round() as u8;
        let aspect = (((aspect_deg % 360.0) + 360.0) % 360.0).round() as u16 % 360;
        SpreadKey { slope, aspect, fuel_code }
    }
}

/// A grid cell: a `Location` plus the packed slope/aspect/fuel-code that
/// determines its spread behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub location: Location,
    pub key: SpreadKey,
}

impl Cell {
    #[must_use]
    pub fn new(row: i32, column: i32, slope_pct: f32, aspect_deg: f32, fuel_code: u16) -> Self {
        Cell {
            location: Location::new(row, column),
            key: SpreadKey::new(slope_pct, aspect_deg, fuel_code),
        }
    }

    #[must_use]
    pub fn row(self) -> i32 {
        self.location.row()
    }

    #[must_use]
    pub fn column(self) -> i32 {
        self.location.column()
    }
}

/// One of the 16 directional slots used throughout `CellPoints`/`SpreadInfo`,
/// in clockwise order starting at north, 22.5 degrees apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Direction16 {
    N = 0,
    Nne,
    Ne,
    Ene,
    E,
    Ese,
    Se,
    Sse,
    S,
    Ssw,
    Sw,
    Wsw,
    W,
    Wnw,
    Nw,
    Nnw,
}

pub const NUM_DIRECTIONS: usize = 16;

impl Direction16 {
    pub const ALL: [Direction16; NUM_DIRECTIONS] = [
        Direction16::N,
        Direction16::Nne,
        Direction16::Ne,
        Direction16::Ene,
        Direction16::E,
        Direction16::Ese,
        Direction16::Se,
        Direction16::Sse,
        Direction16::S,
        Direction16::Ssw,
        Direction16::Sw,
        Direction16::Wsw,
        Direction16::W,
        Direction16::Wnw,
        Direction16::Nw,
        Direction16::Nnw,
    ];

    /// Compass bearing at the centre of this 22.5-degree slot, in degrees.
    #[must_use]
    pub fn bearing_degrees(self) -> f32 {
        (self as u8 as f32) * 22.5
    }

    #[must_use]
    pub fn index(self) -> usize {
        self as u8 as usize
    }
}

/// Single-bit direction codes for the 8 cardinal/ordinal neighbour
/// relationships, recorded per slot as the direction a point arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CellIndex {
    North = 1 << 0,
    NorthEast = 1 << 1,
    East = 1 << 2,
    SouthEast = 1 << 3,
    South = 1 << 4,
    SouthWest = 1 << 5,
    West = 1 << 6,
    NorthWest = 1 << 7,
}

/// Relative direction from `from` to `to`, assuming the two locations are
/// (at most) one cell apart in each axis. Returns `None` for identical
/// locations or non-adjacent pairs.
#[must_use]
pub fn relative_direction(from: Location, to: Location) -> Option<CellIndex> {
    let dr = to.row() - from.row();
    let dc = to.column() - from.column();
    match (dr.signum(), dc.signum()) {
        (0, 0) => None,
        (1, 0) => Some(CellIndex::North),
        (1, 1) => Some(CellIndex::NorthEast),
        (0, 1) => Some(CellIndex::East),
        (-1, 1) => Some(CellIndex::SouthEast),
        (-1, 0) => Some(CellIndex::South),
        (-1, -1) => Some(CellIndex::SouthWest),
        (0, -1) => Some(CellIndex::West),
        (1, -1) => Some(CellIndex::NorthWest),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_hash_roundtrip() {
        for row in [0, 1, 57, 4095] {
            for column in [0, 1, 57, 4095] {
                let loc = Location::new(row, column);
                assert_eq!(loc.row(), row);
                assert_eq!(loc.column(), column);
            }
        }
    }

    #[test]
    fn location_ordering_is_hash_ordering() {
        let a = Location::new(0, 1);
        let b = Location::new(1, 0);
        assert!(a < b);
    }

    #[test]
    fn spread_key_saturates_slope() {
        let key = SpreadKey::new(120.0, 45.0, 3);
        assert_eq!(key.slope, 70);
    }

    #[test]
    fn spread_key_wraps_aspect() {
        let key = SpreadKey::new(10.0, -10.0, 1);
        assert_eq!(key.aspect, 350);
        let key2 = SpreadKey::new(10.0, 360.0, 1);
        assert_eq!(key2.aspect, 0);
    }

    #[test]
    fn relative_direction_cardinal() {
        let origin = Location::new(5, 5);
        assert_eq!(relative_direction(origin, Location::new(6, 5)), Some(CellIndex::North));
        assert_eq!(relative_direction(origin, Location::new(4, 5)), Some(CellIndex::South));
        assert_eq!(relative_direction(origin, Location::new(5, 6)), Some(CellIndex::East));
        assert_eq!(relative_direction(origin, Location::new(5, 4)), Some(CellIndex::West));
        assert_eq!(relative_direction(origin, origin), None);
    }

    #[test]
    fn direction16_bearings_are_22_5_apart() {
        for (i, d) in Direction16::ALL.iter().enumerate() {
            assert!((d.bearing_degrees() - (i as f32) * 22.5).abs() < f32::EPSILON);
        }
    }
}
