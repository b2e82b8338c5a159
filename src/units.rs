use serde::{Deserialize, Serialize};

use crate::catalog::{ArtefactTemplate, JumonTemplate};
use crate::types::{
    add_interference, interference_sum, Faction, Interference, PlayerId, Position, StatModifier,
    UnitId,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumonAbility {
    #[default]
    Plain,
    Guardian,
    Herald,
    Berserker,
    Leaper,
    Tempest,
    Charger,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtefactAbility {
    #[default]
    Plain,
    Sword,
    Shield,
    Banner,
    Crown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Occupant {
    Jumon(UnitId),
    Artefact(UnitId),
}

impl Occupant {
    pub fn id(self) -> UnitId {
        match self {
            Occupant::Jumon(id) | Occupant::Artefact(id) => id,
        }
    }
}

/// Anything the arena can house.
pub trait Placeable {
    fn occupant(&self) -> Occupant;
    fn set_position(&mut self, position: Option<Position>);
}

#[derive(Clone, Debug)]
pub struct Jumon {
    pub id: UnitId,
    pub name: String,
    pub faction: Faction,
    pub attack: i32,
    pub defense: i32,
    pub movement: i32,
    pub ability: JumonAbility,
    pub equipment: Option<UnitId>,
    pub owner: Option<PlayerId>,
    pub turn_interference: Interference<StatModifier>,
    pub persistent_interference: Interference<StatModifier>,
    position: Option<Position>,
}

impl Jumon {
    pub fn from_template(id: UnitId, template: &JumonTemplate) -> Self {
        Self {
            id,
            name: template.name.clone(),
            faction: template.faction,
            attack: template.attack,
            defense: template.defense,
            movement: template.movement,
            ability: template.ability,
            equipment: None,
            owner: None,
            turn_interference: Interference::new(),
            persistent_interference: Interference::new(),
            position: None,
        }
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    fn modifier(&self) -> StatModifier {
        let mut total = interference_sum(&self.turn_interference, self.faction);
        total += interference_sum(&self.persistent_interference, self.faction);
        total
    }

    pub fn total_attack(&self) -> i32 {
        self.attack + self.modifier().attack
    }

    pub fn total_defense(&self) -> i32 {
        self.defense + self.modifier().defense
    }

    pub fn total_movement(&self) -> i32 {
        (self.movement + self.modifier().movement).max(0)
    }

    pub fn add_turn_interference(&mut self, name: &str, value: StatModifier) {
        add_interference(&mut self.turn_interference, name, self.faction, value);
    }

    pub fn add_persistent_interference(&mut self, name: &str, value: StatModifier) {
        add_interference(&mut self.persistent_interference, name, self.faction, value);
    }

    pub fn reset_turn_interference(&mut self) {
        self.turn_interference.clear();
    }
}

impl Placeable for Jumon {
    fn occupant(&self) -> Occupant {
        Occupant::Jumon(self.id)
    }

    fn set_position(&mut self, position: Option<Position>) {
        self.position = position;
    }
}

#[derive(Clone, Debug)]
pub struct Artefact {
    pub id: UnitId,
    pub name: String,
    pub ability: ArtefactAbility,
    host: Option<UnitId>,
    position: Option<Position>,
}

impl Artefact {
    pub fn from_template(id: UnitId, template: &ArtefactTemplate) -> Self {
        Self {
            id,
            name: template.name.clone(),
            ability: template.ability,
            host: None,
            position: None,
        }
    }

    pub fn host(&self) -> Option<UnitId> {
        self.host
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn interference_key(&self) -> String {
        format!("{}:{}", self.name.to_lowercase(), self.id.0)
    }

    /// Overwrites the jumon's equipment slot. Returns whatever it held before,
    /// which is orphaned unless the caller detached it first.
    pub fn attach_to(&mut self, jumon: &mut Jumon) -> Option<UnitId> {
        let previous = jumon.equipment.replace(self.id);
        self.host = Some(jumon.id);
        self.position = jumon.position();
        previous.filter(|id| *id != self.id)
    }

    pub fn detach_from(&mut self, jumon: &mut Jumon) -> bool {
        if jumon.equipment != Some(self.id) {
            return false;
        }
        jumon.equipment = None;
        jumon
            .persistent_interference
            .remove(&self.interference_key());
        self.host = None;
        true
    }
}

impl Placeable for Artefact {
    fn occupant(&self) -> Occupant {
        Occupant::Artefact(self.id)
    }

    fn set_position(&mut self, position: Option<Position>) {
        self.position = position;
    }
}
