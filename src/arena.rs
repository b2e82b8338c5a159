use std::collections::BTreeMap;

use rand::Rng;
use thiserror::Error;

use crate::types::{
    add_interference, interference_sum, Bonus, Faction, Interference, Position, TileAbility,
    UnitId,
};
use crate::units::{Occupant, Placeable};

#[derive(Clone, Debug, Default)]
pub struct ArenaTile {
    pub bonus: BTreeMap<Faction, Bonus>,
    pub turn_interference: Interference<Bonus>,
    pub persistent_interference: Interference<Bonus>,
    pub ability: TileAbility,
    pub revealed: bool,
    pub wasted: bool,
    occupant: Option<Occupant>,
}

impl ArenaTile {
    pub fn occupant(&self) -> Option<Occupant> {
        self.occupant
    }

    pub fn total_bonus(&self, faction: Faction) -> Bonus {
        let mut total = self.bonus.get(&faction).copied().unwrap_or_default();
        total += interference_sum(&self.turn_interference, faction);
        total += interference_sum(&self.persistent_interference, faction);
        total
    }

    pub fn add_turn_interference(&mut self, name: &str, faction: Faction, value: Bonus) {
        add_interference(&mut self.turn_interference, name, faction, value);
    }

    pub fn add_persistent_interference(&mut self, name: &str, faction: Faction, value: Bonus) {
        add_interference(&mut self.persistent_interference, name, faction, value);
    }

    /// Returns true only the first time the tile is turned face up.
    pub fn reveal(&mut self) -> bool {
        let newly = !self.revealed;
        self.revealed = true;
        newly
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("position {0} is outside the arena")]
    OutOfBounds(Position),
    #[error("position {0} is already occupied")]
    Occupied(Position),
}

#[derive(Clone, Debug)]
pub struct Arena {
    width: i32,
    height: i32,
    tiles: Vec<ArenaTile>,
}

impl Arena {
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            tiles: vec![ArenaTile::default(); (width * height) as usize],
        }
    }

    pub fn generate<R: Rng>(width: i32, height: i32, rng: &mut R) -> Self {
        let mut arena = Self::new(width, height);
        for tile in &mut arena.tiles {
            if rng.random_bool(0.35) {
                let faction = Faction::ALL[rng.random_range(0..Faction::ALL.len())];
                let bonus = if rng.random_bool(0.5) {
                    Bonus::new(1, 0)
                } else {
                    Bonus::new(0, 1)
                };
                tile.bonus.insert(faction, bonus);
            }
            let roll: f32 = rng.random();
            tile.ability = if roll < 0.1 {
                TileAbility::Fortress
            } else if roll < 0.2 {
                TileAbility::Mire
            } else {
                TileAbility::Plain
            };
        }
        arena
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if !self.contains(pos) {
            return None;
        }
        Some((pos.y * self.width + pos.x) as usize)
    }

    pub fn tile_at(&self, pos: Position) -> Option<&ArenaTile> {
        self.index(pos).and_then(|idx| self.tiles.get(idx))
    }

    pub fn tile_at_mut(&mut self, pos: Position) -> Option<&mut ArenaTile> {
        let idx = self.index(pos)?;
        self.tiles.get_mut(idx)
    }

    pub fn unit_at(&self, pos: Position) -> Option<Occupant> {
        self.tile_at(pos).and_then(|tile| tile.occupant)
    }

    pub fn is_free(&self, pos: Position) -> bool {
        self.tile_at(pos)
            .map(|tile| tile.occupant.is_none())
            .unwrap_or(false)
    }

    /// Houses `unit` at `pos` and updates the unit's position. The caller must
    /// clear the unit's previous tile itself.
    pub fn place_unit_at<U: Placeable + ?Sized>(
        &mut self,
        unit: &mut U,
        pos: Position,
    ) -> Result<(), ArenaError> {
        let occupant = unit.occupant();
        let tile = self
            .tile_at_mut(pos)
            .ok_or(ArenaError::OutOfBounds(pos))?;
        match tile.occupant {
            Some(current) if current != occupant => return Err(ArenaError::Occupied(pos)),
            _ => {}
        }
        tile.occupant = Some(occupant);
        unit.set_position(Some(pos));
        Ok(())
    }

    pub fn clear_at(&mut self, pos: Position) -> Option<Occupant> {
        self.tile_at_mut(pos).and_then(|tile| tile.occupant.take())
    }

    pub fn bonus_for(&self, pos: Position, faction: Faction) -> Bonus {
        self.tile_at(pos)
            .map(|tile| tile.total_bonus(faction))
            .unwrap_or_default()
    }

    pub fn reset_turn_interference(&mut self) {
        for tile in &mut self.tiles {
            tile.turn_interference.clear();
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Position::new(x, y)))
    }

    pub fn occupants_row_major(&self) -> Vec<Option<UnitId>> {
        self.tiles
            .iter()
            .map(|tile| tile.occupant.map(Occupant::id))
            .collect()
    }

    pub fn centre(&self) -> Position {
        Position::new(self.width / 2, self.height / 2)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::catalog::JumonTemplate;
    use crate::units::{Jumon, JumonAbility};

    fn make_jumon(id: u32) -> Jumon {
        Jumon::from_template(
            UnitId(id),
            &JumonTemplate {
                name: format!("J{id}"),
                faction: Faction::Blue,
                attack: 1,
                defense: 1,
                movement: 1,
                ability: JumonAbility::Plain,
            },
        )
    }

    #[test]
    fn placing_sets_unit_position_and_rejects_second_occupant() {
        let mut arena = Arena::new(3, 3);
        let mut a = make_jumon(1);
        let mut b = make_jumon(2);
        let pos = Position::new(1, 2);

        arena.place_unit_at(&mut a, pos).expect("free tile");
        assert_eq!(a.position(), Some(pos));
        assert_eq!(arena.unit_at(pos), Some(Occupant::Jumon(UnitId(1))));

        assert_eq!(
            arena.place_unit_at(&mut b, pos),
            Err(ArenaError::Occupied(pos))
        );
        assert_eq!(b.position(), None);
        assert_eq!(arena.unit_at(pos), Some(Occupant::Jumon(UnitId(1))));
    }

    #[test]
    fn placing_out_of_bounds_fails() {
        let mut arena = Arena::new(2, 2);
        let mut a = make_jumon(1);
        let pos = Position::new(2, 0);
        assert_eq!(
            arena.place_unit_at(&mut a, pos),
            Err(ArenaError::OutOfBounds(pos))
        );
        assert!(arena.tile_at(Position::new(-1, 0)).is_none());
    }

    #[test]
    fn clear_vacates_tile() {
        let mut arena = Arena::new(2, 2);
        let mut a = make_jumon(1);
        arena.place_unit_at(&mut a, Position::new(0, 0)).expect("free");
        assert_eq!(
            arena.clear_at(Position::new(0, 0)),
            Some(Occupant::Jumon(UnitId(1)))
        );
        assert!(arena.is_free(Position::new(0, 0)));
        assert_eq!(arena.clear_at(Position::new(0, 0)), None);
    }

    #[test]
    fn bonus_sums_base_and_both_layers_for_matching_faction() {
        let mut arena = Arena::new(2, 2);
        let pos = Position::new(1, 1);
        let tile = arena.tile_at_mut(pos).expect("tile");
        tile.bonus.insert(Faction::Red, Bonus::new(1, 0));
        tile.add_turn_interference("storm", Faction::Red, Bonus::new(0, 2));
        tile.add_persistent_interference("rune", Faction::Red, Bonus::new(3, 0));
        tile.add_persistent_interference("rune", Faction::Blue, Bonus::new(7, 7));

        assert_eq!(arena.bonus_for(pos, Faction::Red), Bonus::new(4, 2));
        assert_eq!(arena.bonus_for(pos, Faction::Green), Bonus::default());

        arena.reset_turn_interference();
        assert_eq!(arena.bonus_for(pos, Faction::Red), Bonus::new(4, 0));
        assert_eq!(arena.bonus_for(pos, Faction::Blue), Bonus::new(7, 7));
    }

    #[test]
    fn occupants_are_reported_row_major() {
        let mut arena = Arena::new(3, 2);
        let mut a = make_jumon(5);
        arena.place_unit_at(&mut a, Position::new(2, 1)).expect("free");
        let ids = arena.occupants_row_major();
        assert_eq!(ids.len(), 6);
        assert_eq!(ids[5], Some(UnitId(5)));
        assert!(ids[..5].iter().all(Option::is_none));
    }

    #[test]
    fn generated_arena_is_reproducible_and_starts_hidden() {
        let a = Arena::generate(6, 6, &mut StdRng::seed_from_u64(7));
        let b = Arena::generate(6, 6, &mut StdRng::seed_from_u64(7));
        for pos in a.positions() {
            let ta = a.tile_at(pos).expect("tile");
            let tb = b.tile_at(pos).expect("tile");
            assert_eq!(ta.bonus, tb.bonus);
            assert_eq!(ta.ability, tb.ability);
            assert!(!ta.revealed);
            assert!(ta.occupant().is_none());
        }
    }
}
