//! `CellPointsMap`: a sparse hash map from cell hash to `CellPoints`,
//! mirroring the `FxHashMap`-backed sparse bucket approach the teacher crate
//! uses for its spatial octree (`core_types::spatial::SpatialIndex`).

use rustc_hash::FxHashMap;

use crate::cell_points::{CellPoints, XYPos};
use crate::grid::CellIndex;

/// Sparse mapping from cell hash to `CellPoints`.
#[derive(Debug, Default)]
pub struct CellPointsMap {
    cells: FxHashMap<u64, CellPoints>,
}

impl CellPointsMap {
    #[must_use]
    pub fn new() -> Self {
        CellPointsMap { cells: FxHashMap::default() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub fn get(&self, hash: u64) -> Option<&CellPoints> {
        self.cells.get(&hash)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u64, &CellPoints)> {
        self.cells.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&u64, &mut CellPoints)> {
        self.cells.iter_mut()
    }

    /// Insert a point at its destination cell, lazily creating the
    /// `CellPoints` if this is the first point to land in it. Returns the
    /// (now-updated) entry. If emplacement finds an existing entry, the
    /// point is routed through that entry's `insert` instead of replacing
    /// it (spec §4.C).
    pub fn insert(&mut self, p: XYPos) -> &mut CellPoints {
        self.insert_with_arrival(p, None)
    }

    pub fn insert_with_arrival(
        &mut self,
        p: XYPos,
        arrival: Option<CellIndex>,
    ) -> &mut CellPoints {
        let hash = crate::grid::Location::new(p.cell_row(), p.cell_column()).hash();
        let entry = self
            .cells
            .entry(hash)
            .or_insert_with(|| CellPoints::new_burnable(p.cell_row(), p.cell_column()));
        entry.insert_with_arrival(p, arrival);
        entry
    }

    /// Insert directly into an already-known-burnable or known-unburnable
    /// cell, used when the caller (the scenario loop) has already decided
    /// whether the destination can burn.
    pub fn insert_unburnable(&mut self, row: i32, column: i32) {
        let hash = crate::grid::Location::new(row, column).hash();
        self.cells.entry(hash).or_insert_with(|| CellPoints::new_unburnable(row, column));
    }

    /// Stable-iteration conditional removal: entries for which `pred`
    /// returns true are erased.
    pub fn remove_if<F>(&mut self, mut pred: F)
    where
        F: FnMut(u64, &CellPoints) -> bool,
    {
        self.cells.retain(|&hash, points| !pred(hash, points));
    }

    /// Union of per-cell uniques across the whole map.
    #[must_use]
    pub fn unique(&self) -> Vec<XYPos> {
        self.cells.values().flat_map(CellPoints::unique).collect()
    }

    /// Union of per-cell uniques for a single cell, empty if absent.
    #[must_use]
    pub fn unique_at(&self, hash: u64) -> Vec<XYPos> {
        self.cells.get(&hash).map(CellPoints::unique).unwrap_or_default()
    }

    /// Merge an `unburnable`-aware snapshot of `other` into `self`: any cell
    /// marked unburnable in `unburnable` is skipped rather than merged.
    pub fn merge(&mut self, unburnable: &rustc_hash::FxHashSet<u64>, other: &CellPointsMap) {
        for (&hash, points) in &other.cells {
            if unburnable.contains(&hash) {
                continue;
            }
            let entry = self
                .cells
                .entry(hash)
                .or_insert_with(|| CellPoints::new_burnable(points.cell_row(), points.cell_column()));
            entry.merge(points);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> XYPos {
        XYPos::new(x, y)
    }

    #[test]
    fn insert_then_unique_contains_point_rounded_to_cell() {
        let mut map = CellPointsMap::new();
        map.insert(p(3.25, 4.75));
        let hash = crate::grid::Location::new(4, 3).hash();
        let pts = map.unique_at(hash);
        assert_eq!(pts.len(), 1);
        assert_eq!(pts[0].cell_row(), 4);
        assert_eq!(pts[0].cell_column(), 3);
    }

    #[test]
    fn remove_if_erases_matching_entries() {
        let mut map = CellPointsMap::new();
        map.insert(p(0.5, 0.5));
        map.insert(p(5.5, 5.5));
        map.remove_if(|hash, _| hash == crate::grid::Location::new(0, 0).hash());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn second_insert_reuses_existing_cellpoints() {
        let mut map = CellPointsMap::new();
        map.insert(p(0.1, 0.1));
        map.insert(p(0.9, 0.9));
        assert_eq!(map.len(), 1);
        assert_eq!(map.unique().len(), 2);
    }
}
