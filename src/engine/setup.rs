use std::collections::HashSet;

use rand::SeedableRng;
use thiserror::Error;

use super::*;
use crate::catalog::Catalog;
use crate::constants::{artefact_count, pool_size_for_players, wasted_tile_count, NEUTRAL_PLAYER_NAME};
use crate::player_chain::Player;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("a match needs at least two players, got {0}")]
    NotEnoughPlayers(usize),
    #[error("player name `{0}` is used twice")]
    DuplicatePlayer(String),
    #[error("unknown jumon `{0}`")]
    UnknownJumon(String),
    #[error("unknown artefact `{0}`")]
    UnknownArtefact(String),
    #[error("position {0} is outside the arena")]
    PositionOutOfBounds(Position),
    #[error("position {0} is already taken")]
    PositionTaken(Position),
    #[error("arena {0}x{1} is too small")]
    ArenaTooSmall(i32, i32),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolEntry {
    pub jumon: String,
    pub equipment: Option<String>,
}

impl PoolEntry {
    pub fn new(jumon: &str) -> Self {
        Self {
            jumon: jumon.to_string(),
            equipment: None,
        }
    }

    pub fn equipped(jumon: &str, artefact: &str) -> Self {
        Self {
            jumon: jumon.to_string(),
            equipment: Some(artefact.to_string()),
        }
    }
}

/// Everything needed to lay out a match before the first turn.
#[derive(Clone, Debug, Default)]
pub struct MatchSetup {
    pub players: Vec<String>,
    /// Jumons for the neutral player. Empty means no neutral player.
    pub neutral_roster: Vec<String>,
    pub pool: Vec<PoolEntry>,
    pub width: i32,
    pub height: i32,
    pub random_tiles: bool,
    pub artefacts: Vec<(String, Position)>,
    pub wasted: Vec<Position>,
}

impl MatchSetup {
    pub fn new(players: Vec<String>, width: i32, height: i32) -> Self {
        Self {
            players,
            width,
            height,
            ..Self::default()
        }
    }

    /// A randomised layout drawn from the catalog.
    pub fn random<R: Rng>(
        catalog: &Catalog,
        players: Vec<String>,
        width: i32,
        height: i32,
        with_neutral: bool,
        rng: &mut R,
    ) -> Self {
        let jumon_names = catalog.jumon_names();
        let artefact_names = catalog.artefact_names();
        let mut setup = Self::new(players, width, height);
        setup.random_tiles = true;
        if jumon_names.is_empty() {
            return setup;
        }

        for _ in 0..pool_size_for_players(setup.players.len()) {
            let jumon = pick(&jumon_names, rng);
            let equipment = (!artefact_names.is_empty() && rng.random_bool(0.25))
                .then(|| pick(&artefact_names, rng));
            setup.pool.push(PoolEntry { jumon, equipment });
        }
        if with_neutral {
            for _ in 0..2 {
                setup.neutral_roster.push(pick(&jumon_names, rng));
            }
        }

        let mut taken = HashSet::new();
        let mut free_spot = |rng: &mut R| -> Option<Position> {
            for _ in 0..64 {
                let x = rng.random_range(0..width.max(1));
                let y = rng.random_range(0..height.max(1));
                let pos = Position::new(x, y);
                if taken.insert(pos) {
                    return Some(pos);
                }
            }
            None
        };
        if !artefact_names.is_empty() {
            for _ in 0..artefact_count(width, height) {
                let name = pick(&artefact_names, rng);
                if let Some(pos) = free_spot(rng) {
                    setup.artefacts.push((name, pos));
                }
            }
        }
        for _ in 0..wasted_tile_count(width, height) {
            if let Some(pos) = free_spot(rng) {
                setup.wasted.push(pos);
            }
        }
        setup
    }
}

fn pick<R: Rng>(names: &[String], rng: &mut R) -> String {
    names[rng.random_range(0..names.len())].clone()
}

impl StateMachine {
    pub fn new(
        setup: &MatchSetup,
        catalog: &Catalog,
        config: MatchConfig,
    ) -> Result<Self, SetupError> {
        if setup.players.len() < 2 {
            return Err(SetupError::NotEnoughPlayers(setup.players.len()));
        }
        if setup.width < 2 || setup.height < 2 {
            return Err(SetupError::ArenaTooSmall(setup.width, setup.height));
        }
        let mut seen = HashSet::new();
        for name in &setup.players {
            if !seen.insert(name.as_str()) || name == NEUTRAL_PLAYER_NAME {
                return Err(SetupError::DuplicatePlayer(name.clone()));
            }
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let arena = if setup.random_tiles {
            Arena::generate(setup.width, setup.height, &mut rng)
        } else {
            Arena::new(setup.width, setup.height)
        };

        let mut ctx = MatchContext {
            config,
            arena,
            players: PlayerChain::new(),
            jumons: BTreeMap::new(),
            artefacts: BTreeMap::new(),
            pick_pool: Vec::new(),
            post_turn: Vec::new(),
            turn: 0,
            turn_started_ms: 0,
            turn_elapsed_ms: 0,
            follow_up_used: false,
            two_left_turns: 0,
            events: Vec::new(),
            outcome: None,
            rng,
            next_unit_id: 0,
        };

        for name in &setup.players {
            ctx.players.insert(Player::new(name));
        }

        for pos in &setup.wasted {
            let tile = ctx
                .arena
                .tile_at_mut(*pos)
                .ok_or(SetupError::PositionOutOfBounds(*pos))?;
            tile.wasted = true;
        }

        for entry in &setup.pool {
            let id = ctx.spawn_jumon(catalog, &entry.jumon, None)?;
            if let Some(equipment) = &entry.equipment {
                let aid = ctx.spawn_artefact(catalog, equipment)?;
                if let (Some(artefact), Some(jumon)) =
                    (ctx.artefacts.get_mut(&aid), ctx.jumons.get_mut(&id))
                {
                    artefact.attach_to(jumon);
                }
                // Same equip-time effects as picking the artefact up in play.
                let _ = ctx.jumon_hook(id, StateId::EquipArtefact, Transition::TurnEnd);
            }
            ctx.pick_pool.push(id);
        }

        for (name, pos) in &setup.artefacts {
            if !ctx.arena.contains(*pos) {
                return Err(SetupError::PositionOutOfBounds(*pos));
            }
            if !ctx.arena.is_free(*pos) || ctx.is_wasted(*pos) {
                return Err(SetupError::PositionTaken(*pos));
            }
            let aid = ctx.spawn_artefact(catalog, name)?;
            if let Some(artefact) = ctx.artefacts.get_mut(&aid) {
                ctx.arena
                    .place_unit_at(artefact, *pos)
                    .map_err(|_| SetupError::PositionTaken(*pos))?;
            }
        }

        if !setup.neutral_roster.is_empty() {
            let neutral = ctx.players.insert(Player::neutral(NEUTRAL_PLAYER_NAME));
            for name in &setup.neutral_roster {
                let id = ctx.spawn_jumon(catalog, name, Some(neutral))?;
                if let Some(player) = ctx.players.player_mut(neutral) {
                    player.jumons_to_summon.push(id);
                }
            }
        }

        info!(
            players = setup.players.len(),
            pool = ctx.pick_pool.len(),
            width = setup.width,
            height = setup.height,
            mode = ctx.config.mode.key(),
            "match.created"
        );

        Ok(Self {
            state: Transition::TurnBegin,
            ctx,
        })
    }
}

impl MatchContext {
    fn spawn_jumon(
        &mut self,
        catalog: &Catalog,
        name: &str,
        owner: Option<PlayerId>,
    ) -> Result<UnitId, SetupError> {
        let template = catalog
            .resolve_jumon(name)
            .ok_or_else(|| SetupError::UnknownJumon(name.to_string()))?;
        let id = self.make_id();
        let mut jumon = Jumon::from_template(id, template);
        jumon.owner = owner;
        self.jumons.insert(id, jumon);
        Ok(id)
    }

    fn spawn_artefact(&mut self, catalog: &Catalog, name: &str) -> Result<UnitId, SetupError> {
        let template = catalog
            .resolve_artefact(name)
            .ok_or_else(|| SetupError::UnknownArtefact(name.to_string()))?;
        let id = self.make_id();
        self.artefacts
            .insert(id, Artefact::from_template(id, template));
        Ok(id)
    }
}
