//! `CellPoints`: the bounded 16-direction extreme-point representation of a
//! burning cell's front.
//!
//! Each burning cell keeps, per compass direction, only the point closest to
//! a fixed "ideal target" on the cell boundary in that direction. This caps
//! per-cell memory at 16 slots regardless of how many points land in the
//! cell during a step, while still capturing the convex extent of the fire
//! front well enough for the scenario loop to condense and re-expand it.

use crate::grid::{Direction16, NUM_DIRECTIONS};

/// Any squared distance at or above this is treated as "no point stored."
/// Any achievable squared distance between two points inside a unit cell is
/// strictly less than 2.0; `MAX_ROWS^2` (spec-mandated sentinel ceiling) is
/// astronomically larger, so it can never collide with a real distance.
pub const INVALID_DISTANCE: f64 = (crate::grid::MAX_ROWS as f64) * (crate::grid::MAX_ROWS as f64);

/// `(√2 − 1) / 2`, the offset that places the NNE/ENE/... targets exactly on
/// the cell boundary at 22.5 degrees from the cardinal directions.
const D: f64 = 0.207_106_781_186_547_5;

/// Fractional (x = column offset, y = row offset) ideal target for each of
/// the 16 directions, indexed by `Direction16 as usize`.
const IDEAL_TARGETS: [(f64, f64); NUM_DIRECTIONS] = [
    (0.5, 1.0),       // N
    (0.5 + D, 1.0),   // NNE
    (1.0, 1.0),       // NE
    (1.0, 0.5 + D),   // ENE
    (1.0, 0.5),       // E
    (1.0, 0.5 - D),   // ESE
    (1.0, 0.0),       // SE
    (0.5 + D, 0.0),   // SSE
    (0.5, 0.0),       // S
    (0.5 - D, 0.0),   // SSW
    (0.0, 0.0),       // SW
    (0.0, 0.5 - D),   // WSW
    (0.0, 0.5),       // W
    (0.0, 0.5 + D),   // WNW
    (0.0, 1.0),       // NW
    (0.5 - D, 1.0),   // NNW
];

/// A fractional position in cell coordinates: `x = column + fraction`,
/// `y = row + fraction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XYPos {
    pub x: f64,
    pub y: f64,
}

impl XYPos {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        XYPos { x, y }
    }

    #[must_use]
    pub fn cell_row(self) -> i32 {
        self.y.floor() as i32
    }

    #[must_use]
    pub fn cell_column(self) -> i32 {
        self.x.floor() as i32
    }

    /// Fractional part only, relative to this point's own cell.
    #[must_use]
    pub fn inner(self) -> (f64, f64) {
        (self.x - f64::from(self.cell_column()), self.y - f64::from(self.cell_row()))
    }
}

/// A stored directional slot: the point itself, its squared distance to the
/// slot's ideal target, and the direction the point arrived from, carried
/// through `merge` for downstream arrival-direction bookkeeping.
#[derive(Debug, Clone, Copy)]
struct Slot {
    point: XYPos,
    distance_sq: f64,
    arrival: Option<crate::grid::CellIndex>,
}

impl Slot {
    const fn invalid() -> Self {
        Slot { point: XYPos { x: 0.0, y: 0.0 }, distance_sq: INVALID_DISTANCE, arrival: None }
    }
}

/// The per-cell 16-slot extreme-point set.
///
/// `None` backing storage models an *unburnable* cell (spec §4.B
/// `new_unburnable`): `insert` on such a `CellPoints` is a no-op and
/// `unique()` is always empty.
#[derive(Debug, Clone)]
pub struct CellPoints {
    cell_row: i32,
    cell_column: i32,
    slots: Option<[Slot; NUM_DIRECTIONS]>,
}

impl CellPoints {
    #[must_use]
    pub fn new_burnable(cell_row: i32, cell_column: i32) -> Self {
        CellPoints { cell_row, cell_column, slots: Some([Slot::invalid(); NUM_DIRECTIONS]) }
    }

    #[must_use]
    pub fn new_unburnable(cell_row: i32, cell_column: i32) -> Self {
        CellPoints { cell_row, cell_column, slots: None }
    }

    #[must_use]
    pub fn is_unburnable(&self) -> bool {
        self.slots.is_none()
    }

    #[must_use]
    pub fn cell_row(&self) -> i32 {
        self.cell_row
    }

    #[must_use]
    pub fn cell_column(&self) -> i32 {
        self.cell_column
    }

    /// True iff slot 0's distance is the sentinel, per spec §3's invariant
    /// that slot 0 being invalid implies all 16 slots are invalid.
    #[must_use]
    pub fn empty(&self) -> bool {
        match &self.slots {
            None => true,
            Some(slots) => slots[0].distance_sq >= INVALID_DISTANCE,
        }
    }

    /// Insert a point, replacing each directional slot whose ideal-target
    /// distance the new point strictly improves. No-op on an unburnable
    /// cell. Ties do not replace (spec §4.B).
    pub fn insert(&mut self, p: XYPos) -> &mut Self {
        self.insert_with_arrival(p, None)
    }

    pub fn insert_with_arrival(
        &mut self,
        p: XYPos,
        arrival: Option<crate::grid::CellIndex>,
    ) -> &mut Self {
        let Some(slots) = &mut self.slots else {
            return self;
        };
        let (ix, iy) = p.inner();
        for (i, target) in IDEAL_TARGETS.iter().enumerate() {
            let dx = ix - target.0;
            let dy = iy - target.1;
            let d = dx * dx + dy * dy;
            if d < slots[i].distance_sq {
                slots[i] = Slot { point: p, distance_sq: d, arrival };
            }
        }
        self
    }

    /// Insert every non-invalid point of `other` into `self`.
    pub fn merge(&mut self, other: &CellPoints) {
        let Some(other_slots) = &other.slots else { return };
        for slot in other_slots {
            if slot.distance_sq < INVALID_DISTANCE {
                self.insert_with_arrival(slot.point, slot.arrival);
            }
        }
    }

    /// Distinct stored points, at most 16.
    #[must_use]
    pub fn unique(&self) -> Vec<XYPos> {
        let Some(slots) = &self.slots else { return Vec::new() };
        if slots[0].distance_sq >= INVALID_DISTANCE {
            return Vec::new();
        }
        let mut out: Vec<XYPos> = Vec::with_capacity(NUM_DIRECTIONS);
        for slot in slots {
            if slot.distance_sq >= INVALID_DISTANCE {
                continue;
            }
            if !out.iter().any(|q| points_equal(*q, slot.point)) {
                out.push(slot.point);
            }
        }
        out
    }

    /// Debug-only closure check (spec §8 invariant 1): every stored point
    /// belongs to this cell.
    #[cfg(debug_assertions)]
    pub fn assert_closure(&self) {
        let Some(slots) = &self.slots else { return };
        for slot in slots {
            if slot.distance_sq < INVALID_DISTANCE {
                assert_eq!(slot.point.cell_row(), self.cell_row);
                assert_eq!(slot.point.cell_column(), self.cell_column);
            }
        }
    }
}

fn points_equal(a: XYPos, b: XYPos) -> bool {
    (a.x - b.x).abs() < 1e-12 && (a.y - b.y).abs() < 1e-12
}

/// Direction-indexed ideal target lookup, exposed for `SpreadInfo`'s ellipse
/// sampling which needs to know the bearing each slot represents.
#[must_use]
pub fn ideal_target(direction: Direction16) -> (f64, f64) {
    IDEAL_TARGETS[direction.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn center(row: i32, col: i32) -> XYPos {
        XYPos::new(f64::from(col) + 0.5, f64::from(row) + 0.5)
    }

    #[test]
    fn empty_on_creation() {
        let c = CellPoints::new_burnable(3, 4);
        assert!(c.empty());
        assert!(c.unique().is_empty());
    }

    #[test]
    fn unburnable_insert_is_noop() {
        let mut c = CellPoints::new_unburnable(3, 4);
        c.insert(center(3, 4));
        assert!(c.empty());
        assert!(c.is_unburnable());
    }

    #[test]
    fn insert_is_idempotent() {
        let mut c = CellPoints::new_burnable(0, 0);
        c.insert(XYPos::new(0.51, 0.90));
        let once = c.unique();
        c.insert(XYPos::new(0.51, 0.90));
        let twice = c.unique();
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!(points_equal(*a, *b));
        }
    }

    #[test]
    fn insert_replaces_only_closer_slots() {
        let mut c = CellPoints::new_burnable(0, 0);
        // Far north point claims the N slot and several neighbours.
        c.insert(XYPos::new(0.5, 0.99));
        let after_first = c.unique();
        // A point near the south edge should not disturb the N slot.
        c.insert(XYPos::new(0.5, 0.01));
        let after_second = c.unique();
        assert!(after_second.len() >= after_first.len());
        assert!(after_second.iter().any(|p| (p.y - 0.99).abs() < 1e-9));
        assert!(after_second.iter().any(|p| (p.y - 0.01).abs() < 1e-9));
    }

    #[test]
    fn unique_cardinality_bounded() {
        let mut c = CellPoints::new_burnable(0, 0);
        for i in 0..200 {
            let t = (i as f64) / 200.0 * std::f64::consts::TAU;
            let x = (0.5 + 0.49 * t.cos()).clamp(0.0, 0.999_999);
            let y = (0.5 + 0.49 * t.sin()).clamp(0.0, 0.999_999);
            c.insert(XYPos::new(x, y));
        }
        assert!(c.unique().len() <= NUM_DIRECTIONS);
    }

    #[test]
    fn merge_is_union_of_uniques() {
        let mut a = CellPoints::new_burnable(0, 0);
        a.insert(XYPos::new(0.5, 0.99));
        let mut b = CellPoints::new_burnable(0, 0);
        b.insert(XYPos::new(0.01, 0.5));
        a.merge(&b);
        let pts = a.unique();
        assert!(pts.iter().any(|p| (p.y - 0.99).abs() < 1e-9));
        assert!(pts.iter().any(|p| (p.x - 0.01).abs() < 1e-9));
    }

    #[test]
    fn closure_holds_after_inserts() {
        let mut c = CellPoints::new_burnable(7, 2);
        c.insert(XYPos::new(2.3, 7.8));
        c.insert(XYPos::new(2.9, 7.1));
        c.assert_closure();
    }
}
