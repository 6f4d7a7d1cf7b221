//! Formation offsets for group orders.
//!
//! A group of `n` units is laid out on a square-ish grid with
//! `ceil(sqrt(n))` columns, centered on the order's target point.

use crate::components::EntityId;
use crate::math::{Fixed, Vec2Fixed};

/// Number of columns for a group of `count` units.
#[must_use]
pub fn columns(count: usize) -> usize {
    let mut cols = 0usize;
    while cols * cols < count {
        cols += 1;
    }
    cols.max(1)
}

/// Offsets from the target point, one per unit, row by row.
#[must_use]
pub fn grid_offsets(count: usize, spacing: Fixed) -> Vec<Vec2Fixed> {
    if count == 0 {
        return Vec::new();
    }
    let cols = columns(count);
    let rows = count.div_ceil(cols);
    // Centering shifts are (n - 1) / 2 slots; kept in fixed-point for odd/even alike.
    let col_shift = Fixed::from_num(cols - 1) / 2;
    let row_shift = Fixed::from_num(rows - 1) / 2;

    (0..count)
        .map(|i| {
            let col = Fixed::from_num(i % cols) - col_shift;
            let row = Fixed::from_num(i / cols) - row_shift;
            Vec2Fixed::new(col * spacing, row * spacing)
        })
        .collect()
}

/// Pair each unit (in ascending id order) with its slot offset.
#[must_use]
pub fn assign(units: &[EntityId], spacing: Fixed) -> Vec<(EntityId, Vec2Fixed)> {
    let mut ordered = units.to_vec();
    ordered.sort_unstable();
    ordered.dedup();
    let offsets = grid_offsets(ordered.len(), spacing);
    ordered.into_iter().zip(offsets).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spacing() -> Fixed {
        Fixed::from_num(24)
    }

    #[test]
    fn test_columns() {
        assert_eq!(columns(0), 1);
        assert_eq!(columns(1), 1);
        assert_eq!(columns(2), 2);
        assert_eq!(columns(4), 2);
        assert_eq!(columns(5), 3);
        assert_eq!(columns(9), 3);
        assert_eq!(columns(10), 4);
    }

    #[test]
    fn test_single_unit_goes_to_target() {
        assert_eq!(grid_offsets(1, spacing()), vec![Vec2Fixed::ZERO]);
    }

    #[test]
    fn test_square_is_centered() {
        let offsets = grid_offsets(4, spacing());
        assert_eq!(
            offsets,
            vec![
                Vec2Fixed::from_ints(-12, -12),
                Vec2Fixed::from_ints(12, -12),
                Vec2Fixed::from_ints(-12, 12),
                Vec2Fixed::from_ints(12, 12),
            ]
        );
        let sum = offsets.iter().fold(Vec2Fixed::ZERO, |acc, o| acc + *o);
        assert_eq!(sum, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_offsets_are_distinct() {
        let offsets = grid_offsets(7, spacing());
        assert_eq!(offsets.len(), 7);
        for (i, a) in offsets.iter().enumerate() {
            for b in &offsets[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_assign_orders_by_id() {
        let slots = assign(&[9, 3, 3, 5], spacing());
        let ids: Vec<_> = slots.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![3, 5, 9]);
    }
}
