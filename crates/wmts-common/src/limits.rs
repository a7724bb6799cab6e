//! Row/column restrictions of a tile matrix (set).

use serde::{Deserialize, Serialize};

use crate::error::{WmtsError, WmtsResult};
use crate::tile::TileMatrixSet;

/// Inclusive tile index bounds on one tile matrix.
///
/// Bounds are signed: an extent outside the matrix clamps to inverted bounds
/// (`min > max`), which describe an empty range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMatrixLimits {
    pub tile_matrix: String,
    pub min_tile_row: i64,
    pub max_tile_row: i64,
    pub min_tile_col: i64,
    pub max_tile_col: i64,
}

impl TileMatrixLimits {
    pub fn new(
        tile_matrix: impl Into<String>,
        min_tile_row: i64,
        max_tile_row: i64,
        min_tile_col: i64,
        max_tile_col: i64,
    ) -> Self {
        Self {
            tile_matrix: tile_matrix.into(),
            min_tile_row,
            max_tile_row,
            min_tile_col,
            max_tile_col,
        }
    }

    /// `(rows) x (cols)`, zero for inverted bounds.
    pub fn tile_count(&self) -> u64 {
        let rows = (self.max_tile_row - self.min_tile_row + 1).max(0) as u64;
        let cols = (self.max_tile_col - self.min_tile_col + 1).max(0) as u64;
        rows * cols
    }

    pub fn is_empty(&self) -> bool {
        self.tile_count() == 0
    }

    pub fn contains(&self, col: i64, row: i64) -> bool {
        (self.min_tile_col..=self.max_tile_col).contains(&col)
            && (self.min_tile_row..=self.max_tile_row).contains(&row)
    }

    /// Widening combination: min of mins, max of maxs.
    pub fn union(&self, other: &TileMatrixLimits) -> WmtsResult<TileMatrixLimits> {
        self.check_same_matrix(other)?;
        Ok(TileMatrixLimits::new(
            self.tile_matrix.clone(),
            self.min_tile_row.min(other.min_tile_row),
            self.max_tile_row.max(other.max_tile_row),
            self.min_tile_col.min(other.min_tile_col),
            self.max_tile_col.max(other.max_tile_col),
        ))
    }

    /// Tightening combination: max of mins, min of maxs.
    pub fn intersection(&self, other: &TileMatrixLimits) -> WmtsResult<TileMatrixLimits> {
        self.check_same_matrix(other)?;
        Ok(self.tighten(other))
    }

    fn tighten(&self, other: &TileMatrixLimits) -> TileMatrixLimits {
        TileMatrixLimits::new(
            self.tile_matrix.clone(),
            self.min_tile_row.max(other.min_tile_row),
            self.max_tile_row.min(other.max_tile_row),
            self.min_tile_col.max(other.min_tile_col),
            self.max_tile_col.min(other.max_tile_col),
        )
    }

    fn check_same_matrix(&self, other: &TileMatrixLimits) -> WmtsResult<()> {
        if self.tile_matrix != other.tile_matrix {
            return Err(WmtsError::validation(
                "tileMatrix",
                format!(
                    "limits describe different matrices '{}' and '{}'",
                    self.tile_matrix, other.tile_matrix
                ),
            ));
        }
        Ok(())
    }
}

/// Per-level restriction of a tile matrix set, keyed by tile matrix identifier.
///
/// A level without an entry is unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMatrixSetLimits {
    tile_matrix_limits: Vec<TileMatrixLimits>,
}

impl TileMatrixSetLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tile_matrix: &str) -> Option<&TileMatrixLimits> {
        self.tile_matrix_limits
            .iter()
            .find(|l| l.tile_matrix == tile_matrix)
    }

    /// Insert or replace the entry for `limits.tile_matrix`.
    pub fn insert(&mut self, limits: TileMatrixLimits) {
        match self
            .tile_matrix_limits
            .iter_mut()
            .find(|l| l.tile_matrix == limits.tile_matrix)
        {
            Some(existing) => *existing = limits,
            None => self.tile_matrix_limits.push(limits),
        }
    }

    pub fn levels(&self) -> impl Iterator<Item = &TileMatrixLimits> {
        self.tile_matrix_limits.iter()
    }

    pub fn len(&self) -> usize {
        self.tile_matrix_limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tile_matrix_limits.is_empty()
    }

    /// Combine two optional restrictions.
    ///
    /// An absent side is unrestricted, so the other side is returned as is.
    /// With both present, the result starts from `a`; each level of `b`
    /// either tightens the matching level of `a` or is inserted verbatim.
    pub fn intersect(
        a: Option<&TileMatrixSetLimits>,
        b: Option<&TileMatrixSetLimits>,
    ) -> Option<TileMatrixSetLimits> {
        let (a, b) = match (a, b) {
            (None, other) | (other, None) => return other.cloned(),
            (Some(a), Some(b)) => (a, b),
        };

        let mut result = a.clone();
        for level in b.levels() {
            let combined = match result.get(&level.tile_matrix) {
                Some(existing) => existing.tighten(level),
                None => level.clone(),
            };
            result.insert(combined);
        }
        Some(result)
    }

    /// Number of tiles in `[start, end]`.
    ///
    /// Empty limits defer to the unrestricted count of `tms`; otherwise only
    /// the listed levels within the range contribute.
    pub fn tile_count_for(
        &self,
        tms: &TileMatrixSet,
        start: Option<usize>,
        end: Option<usize>,
    ) -> WmtsResult<u64> {
        if self.is_empty() {
            return tms.total_tile_count(start, end);
        }

        let (start, end) = tms.zoom_range(start, end)?;
        Ok(self
            .levels()
            .filter(|l| {
                tms.zoom_level_of(&l.tile_matrix)
                    .is_some_and(|z| (start..=end).contains(&z))
            })
            .map(TileMatrixLimits::tile_count)
            .sum())
    }
}

impl FromIterator<TileMatrixLimits> for TileMatrixSetLimits {
    fn from_iter<I: IntoIterator<Item = TileMatrixLimits>>(iter: I) -> Self {
        let mut limits = TileMatrixSetLimits::new();
        for l in iter {
            limits.insert(l);
        }
        limits
    }
}
