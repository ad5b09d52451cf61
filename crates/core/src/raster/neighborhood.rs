//! Pixel windows around a (possibly out-of-grid) center cell

use super::{Raster, RasterElement};

/// Square window pattern around a center cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Neighborhood {
    /// Center cell only
    Single,
    /// 3x3 window (8 neighbors + center)
    #[default]
    Queen3x3,
    /// Square window of the given radius, (2r+1)x(2r+1) cells
    Square(usize),
}

impl Neighborhood {
    /// Radius of the window in cells
    pub fn radius(&self) -> usize {
        match self {
            Neighborhood::Single => 0,
            Neighborhood::Queen3x3 => 1,
            Neighborhood::Square(r) => *r,
        }
    }

    /// Width and height of the window
    pub fn size(&self) -> usize {
        self.radius() * 2 + 1
    }

    /// Relative `(row, col)` offsets, row-major, center included
    pub fn offsets(&self) -> Vec<(i64, i64)> {
        let r = self.radius() as i64;
        (-r..=r)
            .flat_map(|dr| (-r..=r).map(move |dc| (dr, dc)))
            .collect()
    }

    /// Valid samples of the window centered on `(row, col)`.
    ///
    /// The center may lie outside the raster; offsets falling outside
    /// `[0, rows) x [0, cols)` are skipped, as are NaN/nodata samples.
    pub fn values<'a, T: RasterElement>(
        &self,
        raster: &'a Raster<T>,
        row: i64,
        col: i64,
    ) -> WindowValues<'a, T> {
        WindowValues {
            raster,
            center_row: row,
            center_col: col,
            offsets: self.offsets(),
            index: 0,
        }
    }
}

/// Iterator over the valid samples of a clipped window
pub struct WindowValues<'a, T: RasterElement> {
    raster: &'a Raster<T>,
    center_row: i64,
    center_col: i64,
    offsets: Vec<(i64, i64)>,
    index: usize,
}

impl<'a, T: RasterElement> Iterator for WindowValues<'a, T> {
    type Item = f64;

    fn next(&mut self) -> Option<Self::Item> {
        let rows = self.raster.rows() as i64;
        let cols = self.raster.cols() as i64;
        let nodata = self.raster.nodata();

        while let Some(&(dr, dc)) = self.offsets.get(self.index) {
            self.index += 1;

            let r = self.center_row.saturating_add(dr);
            let c = self.center_col.saturating_add(dc);
            if r < 0 || c < 0 || r >= rows || c >= cols {
                continue;
            }

            // Safe because we just checked bounds
            let value = unsafe { self.raster.get_unchecked(r as usize, c as usize) };
            if let Some(v) = value.valid(nodata) {
                return Some(v);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.offsets.len() - self.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Raster<f64> {
        Raster::from_rows(&[
            vec![1.0, 2.0, 3.0],
            vec![4.0, f64::NAN, 6.0],
            vec![7.0, 8.0, 9.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_offsets() {
        assert_eq!(Neighborhood::Single.offsets(), vec![(0, 0)]);
        assert_eq!(Neighborhood::Queen3x3.offsets().len(), 9);
        assert_eq!(Neighborhood::Square(2).offsets().len(), 25);
        assert_eq!(Neighborhood::Queen3x3.size(), 3);
    }

    #[test]
    fn test_window_skips_nan() {
        let r = grid();
        let values: Vec<f64> = Neighborhood::Queen3x3.values(&r, 1, 1).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_window_clipped_at_corner() {
        let r = grid();
        let values: Vec<f64> = Neighborhood::Queen3x3.values(&r, 0, 0).collect();
        assert_eq!(values, vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_window_outside_grid() {
        let r = grid();
        assert_eq!(Neighborhood::Queen3x3.values(&r, -1, -1).count(), 1);
        assert_eq!(Neighborhood::Queen3x3.values(&r, -2, 1).count(), 0);
        assert_eq!(Neighborhood::Queen3x3.values(&r, 10, 10).count(), 0);
        assert_eq!(Neighborhood::Queen3x3.values(&r, i64::MAX, i64::MIN).count(), 0);
    }
}
