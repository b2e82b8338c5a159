use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, info};

use crate::arena::{Arena, ArenaError};
use crate::constants::{
    BANNER_MOVEMENT, BERSERK_ATTACK, FORTRESS_BONUS, GUARDIAN_DEFENSE, LMS_TURN_LIMIT,
    MAX_SUMMON_ATTEMPTS, MAX_TIMEOUTS, MIRE_PENALTY, SHIELD_BONUS, SWORD_BONUS,
    TURN_TIME_LIMIT_MS,
};
use crate::pathfinding::{find_path, path_steps};
use crate::player_chain::PlayerChain;
use crate::types::{
    BattleResult, Bonus, GameMode, InterTurnEvent, JumonInterferenceView, MatchOutcome,
    MatchSummary, Phase, PlayerId, PlayerView, PoolEntryView, Position, Snapshot, StatModifier,
    TileAbility, UnitId,
};
use crate::units::{Artefact, ArtefactAbility, Jumon, JumonAbility, Occupant, Placeable};

mod abilities;
mod battle;
mod movement;
mod setup;
mod summon;
mod turn;
mod utils;

pub use self::battle::resolve_fight;
pub use self::setup::{MatchSetup, PoolEntry, SetupError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Pick(UnitId),
    Summon(UnitId),
    Move { jumon: UnitId, target: Position },
    SpecialMove { jumon: UnitId, target: Position },
    Timeout,
    ParserError(String),
    /// Internal nudge for states that do not wait on a player.
    Continue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Pick,
    Summon,
    Move,
    SpecialMove,
}

impl Event {
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Event::Pick(_) => Some(EventKind::Pick),
            Event::Summon(_) => Some(EventKind::Summon),
            Event::Move { .. } => Some(EventKind::Move),
            Event::SpecialMove { .. } => Some(EventKind::SpecialMove),
            Event::Timeout | Event::ParserError(_) | Event::Continue => None,
        }
    }

    pub fn jumon(&self) -> Option<UnitId> {
        match self {
            Event::Pick(id) | Event::Summon(id) => Some(*id),
            Event::Move { jumon, .. } | Event::SpecialMove { jumon, .. } => Some(*jumon),
            Event::Timeout | Event::ParserError(_) | Event::Continue => None,
        }
    }
}

/// Restricts the next accepted action to one jumon and one kind of event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Enforced {
    pub jumon: UnitId,
    pub kind: EventKind,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WaitVars {
    pub enforced: Option<Enforced>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummonVars {
    pub jumon: UnitId,
    pub target: Option<Position>,
    pub origin: Option<Position>,
    pub displaced: bool,
    pub attempts: u32,
}

impl SummonVars {
    pub fn fresh(jumon: UnitId) -> Self {
        Self {
            jumon,
            target: None,
            origin: None,
            displaced: false,
            attempts: 0,
        }
    }

    pub fn displace(jumon: UnitId) -> Self {
        Self {
            displaced: true,
            ..Self::fresh(jumon)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveVars {
    pub jumon: UnitId,
    pub target: Position,
    pub enforced: Option<Enforced>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BattleStage {
    Begin,
    Flip,
    BoniEval,
    Fight,
    Aftermath,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BattleKind {
    OneTile,
    TwoTile,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BattleVars {
    pub attacker: UnitId,
    pub defender: UnitId,
    pub attack_tile: Position,
    pub defense_tile: Position,
    /// Tile the attacker left to join the battle, if any.
    pub origin: Option<Position>,
    pub attacker_bonus: i32,
    pub defender_bonus: i32,
    pub result: Option<BattleResult>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EquipVars {
    pub jumon: UnitId,
    pub artefact: UnitId,
    /// Where the jumon's previous equipment lands; `None` discards it.
    pub drop_at: Option<Position>,
}

/// A state together with the variables it runs with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    TurnBegin,
    WaitForUser(WaitVars),
    Pick(UnitId),
    Summon(SummonVars),
    SummonCheck(SummonVars),
    CheckMove(MoveVars),
    CheckSpecialMove(MoveVars),
    Battle(BattleKind, BattleStage, BattleVars),
    EquipArtefact(EquipVars),
    Timeout,
    TurnEnd,
    ChangePlayer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateId {
    TurnBegin,
    WaitForUser,
    Pick,
    Summon,
    SummonCheck,
    CheckMove,
    CheckSpecialMove,
    Battle(BattleKind, BattleStage),
    EquipArtefact,
    Timeout,
    TurnEnd,
    ChangePlayer,
}

impl Transition {
    pub fn id(&self) -> StateId {
        match self {
            Transition::TurnBegin => StateId::TurnBegin,
            Transition::WaitForUser(_) => StateId::WaitForUser,
            Transition::Pick(_) => StateId::Pick,
            Transition::Summon(_) => StateId::Summon,
            Transition::SummonCheck(_) => StateId::SummonCheck,
            Transition::CheckMove(_) => StateId::CheckMove,
            Transition::CheckSpecialMove(_) => StateId::CheckSpecialMove,
            Transition::Battle(kind, stage, _) => StateId::Battle(*kind, *stage),
            Transition::EquipArtefact(_) => StateId::EquipArtefact,
            Transition::Timeout => StateId::Timeout,
            Transition::TurnEnd => StateId::TurnEnd,
            Transition::ChangePlayer => StateId::ChangePlayer,
        }
    }

    pub fn battle_vars_mut(&mut self) -> Option<&mut BattleVars> {
        match self {
            Transition::Battle(_, _, vars) => Some(vars),
            _ => None,
        }
    }

    fn wait() -> Self {
        Transition::WaitForUser(WaitVars::default())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub turn_time_limit_ms: u64,
    pub max_timeouts: u32,
    pub mode: GameMode,
    pub lms_turn_limit: u32,
    pub max_summon_attempts: u32,
    pub seed: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            turn_time_limit_ms: TURN_TIME_LIMIT_MS,
            max_timeouts: MAX_TIMEOUTS,
            mode: GameMode::Standard,
            lms_turn_limit: LMS_TURN_LIMIT,
            max_summon_attempts: MAX_SUMMON_ATTEMPTS,
            seed: 0,
        }
    }
}

/// Shared state every state body reads and mutates.
#[derive(Debug)]
pub struct MatchContext {
    pub config: MatchConfig,
    pub arena: Arena,
    pub players: PlayerChain,
    pub jumons: BTreeMap<UnitId, Jumon>,
    pub artefacts: BTreeMap<UnitId, Artefact>,
    pub pick_pool: Vec<UnitId>,
    pub post_turn: Vec<Transition>,
    pub turn: u64,
    turn_started_ms: u64,
    turn_elapsed_ms: u64,
    follow_up_used: bool,
    two_left_turns: u32,
    events: Vec<InterTurnEvent>,
    outcome: Option<MatchOutcome>,
    rng: StdRng,
    next_unit_id: u32,
}

#[derive(Debug)]
pub struct StateMachine {
    state: Transition,
    ctx: MatchContext,
}

impl StateMachine {
    pub fn state(&self) -> &Transition {
        &self.state
    }

    pub fn state_id(&self) -> StateId {
        self.state.id()
    }

    pub fn context(&self) -> &MatchContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut MatchContext {
        &mut self.ctx
    }

    pub fn is_ended(&self) -> bool {
        self.ctx.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&MatchOutcome> {
        self.ctx.outcome.as_ref()
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.state, Transition::WaitForUser(_))
    }

    /// Runs the current state once. Returns true when the machine moved to a
    /// different state; `false` means the state chose to stay put.
    pub fn run(&mut self, event: &Event, now_ms: u64) -> bool {
        if self.is_ended() {
            return false;
        }
        let ctx = &mut self.ctx;
        let next = match self.state.clone() {
            Transition::TurnBegin => ctx.turn_begin(now_ms),
            Transition::WaitForUser(vars) => ctx.wait_for_user(vars, event, now_ms),
            Transition::Pick(jumon) => ctx.pick(jumon),
            Transition::Summon(vars) => ctx.summon(vars),
            Transition::SummonCheck(vars) => ctx.summon_check(vars),
            Transition::CheckMove(vars) => ctx.check_move(vars),
            Transition::CheckSpecialMove(vars) => ctx.check_special_move(vars),
            Transition::Battle(kind, stage, vars) => ctx.battle(kind, stage, vars),
            Transition::EquipArtefact(vars) => ctx.equip_artefact(vars),
            Transition::Timeout => ctx.timeout(),
            Transition::TurnEnd => ctx.turn_end(now_ms),
            Transition::ChangePlayer => ctx.change_player(),
        };
        match next {
            Some(next) => {
                debug!(from = ?self.state.id(), to = ?next.id(), "state.transition");
                self.state = next;
                true
            }
            None => false,
        }
    }

    /// Runs with `Event::Continue` until the machine waits on a player or ends.
    pub fn settle(&mut self, now_ms: u64) {
        let mut guard = 0;
        while !self.is_ended() && !self.is_waiting() && guard < 10_000 {
            if !self.run(&Event::Continue, now_ms) {
                break;
            }
            guard += 1;
        }
    }

    pub fn drain_events(&mut self) -> Vec<InterTurnEvent> {
        std::mem::take(&mut self.ctx.events)
    }

    pub fn current_player_name(&self) -> Option<String> {
        self.ctx.current_player_name()
    }

    pub fn current_player_is_neutral(&self) -> bool {
        self.ctx
            .players
            .current_player()
            .map(|player| player.neutral)
            .unwrap_or(false)
    }

    /// Milliseconds (on the caller's clock) at which the running turn times out.
    pub fn turn_deadline_ms(&self) -> u64 {
        self.ctx
            .turn_started_ms
            .saturating_add(self.ctx.config.turn_time_limit_ms)
    }

    pub fn build_snapshot(&self) -> Snapshot {
        let ctx = &self.ctx;
        let pool = ctx
            .pick_pool
            .iter()
            .map(|id| PoolEntryView {
                jumon: *id,
                equipment: ctx.jumons.get(id).and_then(|jumon| jumon.equipment),
            })
            .collect();
        let players = ctx
            .players
            .get_players()
            .into_iter()
            .filter_map(|id| ctx.players.player(id))
            .map(|player| PlayerView {
                name: player.name.clone(),
                phase: player.phase,
                neutral: player.neutral,
                dead: player.dead,
                timeouts: player.timeout_count,
                to_summon: player.jumons_to_summon.clone(),
                summoned: player.summoned_jumons.clone(),
            })
            .collect();
        let interference = ctx
            .jumons
            .values()
            .filter(|jumon| jumon.position().is_some())
            .map(|jumon| JumonInterferenceView {
                jumon: jumon.id,
                turn: jumon.turn_interference.clone(),
                persistent: jumon.persistent_interference.clone(),
            })
            .collect();

        Snapshot {
            turn: ctx.turn,
            current_player: ctx.current_player_name(),
            pool,
            players,
            width: ctx.arena.width(),
            height: ctx.arena.height(),
            arena: ctx.arena.occupants_row_major(),
            interference,
        }
    }

    pub fn build_summary(&self) -> Option<MatchSummary> {
        let outcome = self.ctx.outcome.clone()?;
        Some(MatchSummary {
            outcome,
            mode: self.ctx.config.mode,
            turns: self.ctx.turn,
            players: self
                .ctx
                .players
                .all_players()
                .filter(|(_, player)| !player.neutral)
                .map(|(_, player)| player.name.clone())
                .collect(),
        })
    }
}
