use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Orthogonal neighbours in expansion order: -x, +x, -y, +y.
    pub fn neighbors(self) -> [Position; 4] {
        [
            self + Position::new(-1, 0),
            self + Position::new(1, 0),
            self + Position::new(0, -1),
            self + Position::new(0, 1),
        ]
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PlayerId(pub usize);

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
}

impl Faction {
    pub const ALL: [Faction; 5] = [
        Faction::Red,
        Faction::Blue,
        Faction::Green,
        Faction::Yellow,
        Faction::Purple,
    ];
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bonus {
    pub attack: i32,
    pub defense: i32,
}

impl Bonus {
    pub const fn new(attack: i32, defense: i32) -> Self {
        Self { attack, defense }
    }
}

impl AddAssign for Bonus {
    fn add_assign(&mut self, rhs: Bonus) {
        self.attack += rhs.attack;
        self.defense += rhs.defense;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatModifier {
    pub attack: i32,
    pub defense: i32,
    pub movement: i32,
}

impl StatModifier {
    pub const fn new(attack: i32, defense: i32, movement: i32) -> Self {
        Self {
            attack,
            defense,
            movement,
        }
    }
}

impl AddAssign for StatModifier {
    fn add_assign(&mut self, rhs: StatModifier) {
        self.attack += rhs.attack;
        self.defense += rhs.defense;
        self.movement += rhs.movement;
    }
}

/// Named additive modifiers, each split per faction.
pub type Interference<T> = BTreeMap<String, BTreeMap<Faction, T>>;

pub fn interference_sum<T>(layer: &Interference<T>, faction: Faction) -> T
where
    T: Copy + Default + AddAssign,
{
    let mut total = T::default();
    for entry in layer.values() {
        if let Some(value) = entry.get(&faction) {
            total += *value;
        }
    }
    total
}

pub fn add_interference<T>(layer: &mut Interference<T>, name: &str, faction: Faction, value: T)
where
    T: Copy + Default + AddAssign,
{
    *layer
        .entry(name.to_string())
        .or_default()
        .entry(faction)
        .or_default() += value;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pick,
    Summon,
    Move,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Standard,
    LastManStanding,
}

impl GameMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "standard" => Some(Self::Standard),
            "last_man_standing" | "lms" => Some(Self::LastManStanding),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            GameMode::Standard => "standard",
            GameMode::LastManStanding => "last_man_standing",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileAbility {
    #[default]
    Plain,
    Fortress,
    Mire,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleResult {
    AttackerWins,
    DefenderWins,
    Tie,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Win,
    Loss,
    Draw,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchOutcome {
    Victory { winner: String },
    Draw,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum InterTurnEvent {
    Picked {
        player: String,
        jumon: UnitId,
    },
    Summoned {
        player: String,
        jumon: UnitId,
        position: Position,
    },
    Moved {
        jumon: UnitId,
        from: Position,
        to: Position,
    },
    Equipped {
        jumon: UnitId,
        artefact: UnitId,
    },
    Dropped {
        artefact: UnitId,
        position: Position,
    },
    ArtefactLost {
        artefact: UnitId,
    },
    BattleStarted {
        attacker: UnitId,
        defender: UnitId,
        attack_tile: Position,
        defense_tile: Position,
    },
    BonusRevealed {
        position: Position,
        ability: TileAbility,
    },
    BonusApplied {
        attacker_bonus: i32,
        defender_bonus: i32,
    },
    BattleResolved {
        attacker: UnitId,
        defender: UnitId,
        result: BattleResult,
    },
    JumonDestroyed {
        jumon: UnitId,
        position: Option<Position>,
    },
    TimedOut {
        player: String,
        count: u32,
    },
    PlayerDied {
        player: String,
    },
    TurnEnded {
        next_player: Option<String>,
    },
    Victory {
        player: String,
    },
    Draw,
}

#[derive(Clone, Debug, Serialize)]
pub struct PoolEntryView {
    pub jumon: UnitId,
    pub equipment: Option<UnitId>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub name: String,
    pub phase: Phase,
    pub neutral: bool,
    pub dead: bool,
    pub timeouts: u32,
    #[serde(rename = "toSummon")]
    pub to_summon: Vec<UnitId>,
    pub summoned: Vec<UnitId>,
}

#[derive(Clone, Debug, Serialize)]
pub struct JumonInterferenceView {
    pub jumon: UnitId,
    pub turn: Interference<StatModifier>,
    pub persistent: Interference<StatModifier>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub turn: u64,
    #[serde(rename = "currentPlayer")]
    pub current_player: Option<String>,
    pub pool: Vec<PoolEntryView>,
    pub players: Vec<PlayerView>,
    pub width: i32,
    pub height: i32,
    /// Occupant id per tile, row-major.
    pub arena: Vec<Option<UnitId>>,
    pub interference: Vec<JumonInterferenceView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MatchSummary {
    pub outcome: MatchOutcome,
    pub mode: GameMode,
    pub turns: u64,
    pub players: Vec<String>,
}
