use crate::maze::Maze;
use crate::types::{CellIndex, Direction};

const NO_NODE: u32 = u32::MAX;
const INFINITE: u32 = u32::MAX;

/// All-pairs shortest paths over the `Normal` cells of one maze.
///
/// Built once per round (cubic in the number of open cells) and read-only
/// afterward. Ties between equally short paths fall out of relaxation order
/// and carry no meaning; only existence and length of a path are reliable.
#[derive(Clone, Debug)]
pub struct RoutingTable {
    node_of_cell: Vec<u32>,
    cell_of_node: Vec<CellIndex>,
    dist: Vec<u32>,
    next: Vec<u32>,
    farthest: Vec<u32>,
}

impl RoutingTable {
    pub fn compute(maze: &Maze) -> Self {
        let mut node_of_cell = vec![NO_NODE; maze.len()];
        let cell_of_node: Vec<CellIndex> = maze.normal_cells().collect();
        for (node, cell) in cell_of_node.iter().enumerate() {
            node_of_cell[*cell] = node as u32;
        }

        let count = cell_of_node.len();
        let at = |from: usize, to: usize| from * count + to;
        let mut dist = vec![INFINITE; count * count];
        let mut next = vec![NO_NODE; count * count];

        for (node, cell) in cell_of_node.iter().enumerate() {
            dist[at(node, node)] = 0;
            next[at(node, node)] = node as u32;
            let (x, y) = maze.coord_of(*cell);
            for dir in Direction::ALL {
                let (nx, ny) = maze.neighbor(x, y, dir);
                let Some(neighbor_cell) = maze.index_of(nx, ny) else {
                    continue;
                };
                let neighbor = node_of_cell[neighbor_cell];
                if neighbor == NO_NODE {
                    continue;
                }
                dist[at(node, neighbor as usize)] = 1;
                next[at(node, neighbor as usize)] = neighbor;
            }
        }

        for k in 0..count {
            for i in 0..count {
                let ik = dist[at(i, k)];
                if ik == INFINITE {
                    continue;
                }
                for j in 0..count {
                    let kj = dist[at(k, j)];
                    if kj == INFINITE {
                        continue;
                    }
                    if dist[at(i, j)] > ik + kj {
                        dist[at(i, j)] = ik + kj;
                        next[at(i, j)] = next[at(i, k)];
                    }
                }
            }
        }

        let mut farthest = vec![NO_NODE; count];
        for (i, slot) in farthest.iter_mut().enumerate() {
            let mut best = 0;
            for j in 0..count {
                let d = dist[at(i, j)];
                if d != INFINITE && d > best {
                    best = d;
                    *slot = j as u32;
                }
            }
        }

        Self {
            node_of_cell,
            cell_of_node,
            dist,
            next,
            farthest,
        }
    }

    pub fn node_count(&self) -> usize {
        self.cell_of_node.len()
    }

    fn node(&self, cell: CellIndex) -> Option<usize> {
        match self.node_of_cell.get(cell) {
            Some(&node) if node != NO_NODE => Some(node as usize),
            _ => None,
        }
    }

    fn slot(&self, from: CellIndex, to: CellIndex) -> Option<usize> {
        let from = self.node(from)?;
        let to = self.node(to)?;
        Some(from * self.node_count() + to)
    }

    /// First cell after `from` on a shortest path to `to`; `from` itself when
    /// both are the same cell.
    pub fn next_hop(&self, from: CellIndex, to: CellIndex) -> Option<CellIndex> {
        let node = self.next[self.slot(from, to)?];
        (node != NO_NODE).then(|| self.cell_of_node[node as usize])
    }

    pub fn distance(&self, from: CellIndex, to: CellIndex) -> Option<u32> {
        let d = self.dist[self.slot(from, to)?];
        (d != INFINITE).then_some(d)
    }

    /// The reachable cell farthest from `cell`, for flee behavior. Not used by
    /// the ghost AI at the moment.
    pub fn farthest_from(&self, cell: CellIndex) -> Option<CellIndex> {
        let node = self.farthest[self.node(cell)?];
        (node != NO_NODE).then(|| self.cell_of_node[node as usize])
    }

    /// Heading that takes one step from `from` toward `to`, if a path exists
    /// and the cells differ.
    pub fn direction_toward(
        &self,
        maze: &Maze,
        from: (i32, i32),
        to: (i32, i32),
    ) -> Option<Direction> {
        let from_cell = maze.index_of(from.0, from.1)?;
        let to_cell = maze.index_of(to.0, to.1)?;
        let hop = self.next_hop(from_cell, to_cell)?;
        Direction::between(from, maze.coord_of(hop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::{generate_maze, MazeSettings};
    use crate::rng::Rng;

    #[test]
    fn following_next_hops_matches_precomputed_distance() {
        for seed in [1u32, 17, 301] {
            let mut rng = Rng::new(seed);
            let maze = generate_maze(&MazeSettings::default(), &mut rng).expect("maze");
            let routing = RoutingTable::compute(&maze);
            let cells: Vec<CellIndex> = maze.normal_cells().collect();
            assert_eq!(routing.node_count(), cells.len());

            for &a in cells.iter().step_by(7) {
                for &b in &cells {
                    let expected = routing.distance(a, b).expect("maze is connected");
                    let mut current = a;
                    let mut steps = 0;
                    while current != b {
                        let hop = routing.next_hop(current, b).expect("hop exists");
                        let here = maze.coord_of(current);
                        let there = maze.coord_of(hop);
                        assert!(Direction::between(here, there).is_some());
                        assert!(maze.is_normal_index(hop));
                        current = hop;
                        steps += 1;
                        assert!(steps <= expected, "walk longer than shortest path");
                    }
                    assert_eq!(steps, expected);
                }
            }
        }
    }

    #[test]
    fn disconnected_regions_have_no_route() {
        let maze = Maze::from_rows(&[
            "#######", //
            "#..#..#", //
            "#######",
        ]);
        let routing = RoutingTable::compute(&maze);
        let left = maze.index_of(1, 1).expect("in bounds");
        let right = maze.index_of(5, 1).expect("in bounds");
        assert_eq!(routing.next_hop(left, right), None);
        assert_eq!(routing.distance(left, right), None);
        assert_eq!(routing.distance(left, left), Some(0));
        assert_eq!(routing.next_hop(left, left), Some(left));

        let wall = maze.index_of(3, 1).expect("in bounds");
        assert_eq!(routing.next_hop(left, wall), None);
        assert_eq!(routing.distance(wall, left), None);
    }

    #[test]
    fn farthest_cell_in_a_corridor_is_the_other_end() {
        let maze = Maze::from_rows(&[
            "#######", //
            "#.....#", //
            "#######",
        ]);
        let routing = RoutingTable::compute(&maze);
        let west = maze.index_of(1, 1).expect("in bounds");
        let east = maze.index_of(5, 1).expect("in bounds");
        assert_eq!(routing.farthest_from(west), Some(east));
        assert_eq!(routing.farthest_from(east), Some(west));
        assert_eq!(routing.distance(west, east), Some(4));
        assert_eq!(routing.distance(east, west), Some(4));
    }

    #[test]
    fn isolated_cell_has_no_farthest_cell() {
        let maze = Maze::from_rows(&["###", "#.#", "###"]);
        let routing = RoutingTable::compute(&maze);
        let only = maze.index_of(1, 1).expect("in bounds");
        assert_eq!(routing.farthest_from(only), None);
    }

    #[test]
    fn direction_toward_turns_around_corners() {
        let maze = Maze::from_rows(&[
            "#####", //
            "#...#", //
            "###.#", //
            "#####",
        ]);
        let routing = RoutingTable::compute(&maze);
        assert_eq!(
            routing.direction_toward(&maze, (1, 1), (3, 2)),
            Some(Direction::Right)
        );
        assert_eq!(
            routing.direction_toward(&maze, (3, 1), (3, 2)),
            Some(Direction::Up)
        );
        assert_eq!(
            routing.direction_toward(&maze, (3, 2), (1, 1)),
            Some(Direction::Down)
        );
        assert_eq!(routing.direction_toward(&maze, (1, 1), (1, 1)), None);
    }
}
