use crate::types::{Direction, Position};

/// Distance left to the next integer grid line along `dir`; zero when the
/// position already sits on one.
pub(super) fn distance_to_next_cell(pos: Position, dir: Direction) -> f64 {
    match dir {
        Direction::Right => pos.x.ceil() - pos.x,
        Direction::Up => pos.y.ceil() - pos.y,
        Direction::Left => pos.x - pos.x.floor(),
        Direction::Down => pos.y - pos.y.floor(),
    }
}

pub(super) fn round_to_next_cell(pos: Position, dir: Direction) -> Position {
    match dir {
        Direction::Right => Position {
            x: pos.x.ceil(),
            y: pos.y,
        },
        Direction::Up => Position {
            x: pos.x,
            y: pos.y.ceil(),
        },
        Direction::Left => Position {
            x: pos.x.floor(),
            y: pos.y,
        },
        Direction::Down => Position {
            x: pos.x,
            y: pos.y.floor(),
        },
    }
}

pub(super) fn move_along(pos: Position, dir: Direction, offset: f64) -> Position {
    let (dx, dy) = dir.delta();
    Position {
        x: pos.x + dx as f64 * offset,
        y: pos.y + dy as f64 * offset,
    }
}

/// Fraction of a cell covered this tick. Kept below one so a slow tick can
/// never skip a grid line.
pub(super) fn tick_distance(speed: f64, dt: f64) -> f64 {
    (speed * dt) % 1.0
}

pub(super) fn overlaps(a: Position, b: Position) -> bool {
    (a.x - b.x).abs() < 0.5 && (a.y - b.y).abs() < 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: f64, y: f64) -> Position {
        Position { x, y }
    }

    #[test]
    fn distance_follows_heading() {
        let p = pos(2.25, 3.75);
        assert!((distance_to_next_cell(p, Direction::Right) - 0.75).abs() < 1e-12);
        assert!((distance_to_next_cell(p, Direction::Left) - 0.25).abs() < 1e-12);
        assert!((distance_to_next_cell(p, Direction::Up) - 0.25).abs() < 1e-12);
        assert!((distance_to_next_cell(p, Direction::Down) - 0.75).abs() < 1e-12);
        assert_eq!(distance_to_next_cell(pos(4.0, 1.0), Direction::Right), 0.0);
    }

    #[test]
    fn rounding_snaps_only_the_moving_axis() {
        assert_eq!(round_to_next_cell(pos(2.4, 3.0), Direction::Right), pos(3.0, 3.0));
        assert_eq!(round_to_next_cell(pos(2.4, 3.0), Direction::Left), pos(2.0, 3.0));
        assert_eq!(round_to_next_cell(pos(5.0, 3.2), Direction::Up), pos(5.0, 4.0));
        assert_eq!(round_to_next_cell(pos(5.0, 3.2), Direction::Down), pos(5.0, 3.0));
    }

    #[test]
    fn tick_distance_stays_below_one_cell() {
        assert!((tick_distance(2.5, 0.02) - 0.05).abs() < 1e-12);
        assert!(tick_distance(2.9, 0.5) < 1.0);
        assert!((tick_distance(2.0, 0.6) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn overlap_uses_half_cell_on_both_axes() {
        assert!(overlaps(pos(1.0, 1.0), pos(1.4, 0.6)));
        assert!(!overlaps(pos(1.0, 1.0), pos(1.5, 1.0)));
        assert!(!overlaps(pos(1.0, 1.0), pos(1.0, 0.4)));
    }
}
