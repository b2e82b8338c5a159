use std::collections::{HashMap, VecDeque};

use crate::arena::Arena;
use crate::types::Position;

/// Breadth-first search over unoccupied tiles. The destination itself may be
/// occupied. Returns the tiles from `end` back to `start`, both included.
pub fn find_path(start: Position, end: Position, arena: &Arena) -> Option<Vec<Position>> {
    if !arena.contains(start) || !arena.contains(end) {
        return None;
    }
    if start == end {
        return Some(vec![start]);
    }

    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut queue = VecDeque::new();
    came_from.insert(start, start);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        for next in current.neighbors() {
            if !arena.contains(next) || came_from.contains_key(&next) {
                continue;
            }
            if next != end && !arena.is_free(next) {
                continue;
            }
            came_from.insert(next, current);
            if next == end {
                return Some(walk_back(&came_from, start, end));
            }
            queue.push_back(next);
        }
    }

    None
}

fn walk_back(
    came_from: &HashMap<Position, Position>,
    start: Position,
    end: Position,
) -> Vec<Position> {
    let mut path = vec![end];
    let mut cursor = end;
    while cursor != start {
        let Some(prev) = came_from.get(&cursor).copied() else {
            break;
        };
        path.push(prev);
        cursor = prev;
    }
    path
}

/// Number of steps a path covers.
pub fn path_steps(path: &[Position]) -> i32 {
    path.len().saturating_sub(1) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::JumonTemplate;
    use crate::types::{Faction, UnitId};
    use crate::units::{Jumon, JumonAbility};

    fn block(arena: &mut Arena, id: u32, pos: Position) {
        let mut jumon = Jumon::from_template(
            UnitId(id),
            &JumonTemplate {
                name: "Wall".to_string(),
                faction: Faction::Green,
                attack: 0,
                defense: 0,
                movement: 0,
                ability: JumonAbility::Plain,
            },
        );
        arena.place_unit_at(&mut jumon, pos).expect("free tile");
    }

    fn bfs_distance(arena: &Arena, start: Position, end: Position) -> Option<i32> {
        let mut dist: HashMap<Position, i32> = HashMap::new();
        let mut queue = VecDeque::new();
        dist.insert(start, 0);
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            if current == end {
                return dist.get(&current).copied();
            }
            let d = dist[&current];
            for next in current.neighbors() {
                if !arena.contains(next) || dist.contains_key(&next) {
                    continue;
                }
                if next != end && !arena.is_free(next) {
                    continue;
                }
                dist.insert(next, d + 1);
                queue.push_back(next);
            }
        }
        None
    }

    #[test]
    fn straight_path_runs_from_end_back_to_start() {
        let arena = Arena::new(5, 1);
        let path = find_path(Position::new(0, 0), Position::new(3, 0), &arena).expect("path");
        assert_eq!(
            path,
            vec![
                Position::new(3, 0),
                Position::new(2, 0),
                Position::new(1, 0),
                Position::new(0, 0)
            ]
        );
        assert_eq!(path_steps(&path), 3);
    }

    #[test]
    fn ties_follow_neighbour_expansion_order() {
        let arena = Arena::new(3, 3);
        let path = find_path(Position::new(1, 1), Position::new(2, 2), &arena).expect("path");
        assert_eq!(
            path,
            vec![
                Position::new(2, 2),
                Position::new(2, 1),
                Position::new(1, 1)
            ]
        );
    }

    #[test]
    fn detours_around_occupied_tiles_and_enters_occupied_destination() {
        let mut arena = Arena::new(4, 3);
        block(&mut arena, 1, Position::new(1, 0));
        block(&mut arena, 2, Position::new(1, 1));
        block(&mut arena, 3, Position::new(3, 0));

        let start = Position::new(0, 0);
        let end = Position::new(3, 0);
        let path = find_path(start, end, &arena).expect("path");
        assert_eq!(path_steps(&path), 7);
        assert_eq!(path.first(), Some(&end));
        assert_eq!(path.last(), Some(&start));
        for pair in path.windows(2) {
            assert_eq!(pair[0].manhattan(pair[1]), 1);
        }
        for pos in &path[1..path.len() - 1] {
            assert!(arena.is_free(*pos));
        }
    }

    #[test]
    fn walled_off_destination_has_no_path() {
        let mut arena = Arena::new(3, 3);
        block(&mut arena, 1, Position::new(1, 0));
        block(&mut arena, 2, Position::new(1, 1));
        block(&mut arena, 3, Position::new(1, 2));
        assert!(find_path(Position::new(0, 0), Position::new(2, 2), &arena).is_none());
    }

    #[test]
    fn out_of_bounds_inputs_have_no_path() {
        let arena = Arena::new(3, 3);
        assert!(find_path(Position::new(-1, 0), Position::new(2, 2), &arena).is_none());
        assert!(find_path(Position::new(0, 0), Position::new(3, 0), &arena).is_none());
    }

    #[test]
    fn path_length_matches_reference_bfs_on_scattered_walls() {
        let mut arena = Arena::new(7, 7);
        let walls = [
            (1, 0),
            (1, 1),
            (1, 2),
            (3, 6),
            (3, 5),
            (3, 4),
            (3, 3),
            (5, 1),
            (5, 2),
            (6, 2),
        ];
        for (idx, (x, y)) in walls.iter().enumerate() {
            block(&mut arena, idx as u32 + 1, Position::new(*x, *y));
        }

        let start = Position::new(0, 0);
        for end in arena.positions().collect::<Vec<_>>() {
            let expected = bfs_distance(&arena, start, end);
            let actual = find_path(start, end, &arena).map(|path| path_steps(&path));
            assert_eq!(actual, expected, "mismatch for end={end}");
        }
    }
}
