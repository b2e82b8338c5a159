use super::*;

/// Higher power wins; equal power destroys both.
pub fn resolve_fight(attack_power: i32, defense_power: i32) -> BattleResult {
    match attack_power.cmp(&defense_power) {
        std::cmp::Ordering::Greater => BattleResult::AttackerWins,
        std::cmp::Ordering::Less => BattleResult::DefenderWins,
        std::cmp::Ordering::Equal => BattleResult::Tie,
    }
}

impl MatchContext {
    pub(super) fn battle(
        &mut self,
        kind: BattleKind,
        stage: BattleStage,
        vars: BattleVars,
    ) -> Option<Transition> {
        let state = StateId::Battle(kind, stage);
        let (attacker, defender) = (vars.attacker, vars.defender);
        let proposed = match stage {
            BattleStage::Begin => Transition::Battle(kind, BattleStage::Flip, vars),
            BattleStage::Flip => {
                self.flip_tile(vars.defense_tile);
                if kind == BattleKind::TwoTile {
                    self.flip_tile(vars.attack_tile);
                }
                Transition::Battle(kind, BattleStage::BoniEval, vars)
            }
            BattleStage::BoniEval => {
                let (attack_tile, defense_tile) = (vars.attack_tile, vars.defense_tile);
                let proposed = self.eval_boni(kind, vars);
                let mut proposed = self.tile_hook(defense_tile, state, proposed);
                if kind == BattleKind::TwoTile {
                    proposed = self.tile_hook(attack_tile, state, proposed);
                }
                let mut proposed = self.battle_hooks(attacker, defender, state, proposed);
                if let Some(vars) = proposed.battle_vars_mut() {
                    self.events.push(InterTurnEvent::BonusApplied {
                        attacker_bonus: vars.attacker_bonus,
                        defender_bonus: vars.defender_bonus,
                    });
                }
                return Some(proposed);
            }
            BattleStage::Fight => {
                let mut vars = vars;
                let result = self.fight(&vars);
                vars.result = Some(result);
                info!(attacker = %attacker, defender = %defender, ?result, "battle.resolved");
                self.events.push(InterTurnEvent::BattleResolved {
                    attacker,
                    defender,
                    result,
                });
                Transition::Battle(kind, BattleStage::Aftermath, vars)
            }
            BattleStage::Aftermath => self.aftermath(kind, vars),
        };
        Some(self.battle_hooks(attacker, defender, state, proposed))
    }

    fn flip_tile(&mut self, pos: Position) {
        let Some(tile) = self.arena.tile_at_mut(pos) else {
            return;
        };
        if tile.reveal() {
            let ability = tile.ability;
            self.events.push(InterTurnEvent::BonusRevealed {
                position: pos,
                ability,
            });
        }
    }

    /// Tile boni for both sides. In a one-tile battle both read the same tile.
    fn eval_boni(&self, kind: BattleKind, mut vars: BattleVars) -> Transition {
        let attack_faction = self.jumons.get(&vars.attacker).map(|jumon| jumon.faction);
        let defense_faction = self.jumons.get(&vars.defender).map(|jumon| jumon.faction);
        if let Some(faction) = attack_faction {
            vars.attacker_bonus += self.arena.bonus_for(vars.attack_tile, faction).attack;
        }
        if let Some(faction) = defense_faction {
            vars.defender_bonus += self.arena.bonus_for(vars.defense_tile, faction).defense;
        }
        Transition::Battle(kind, BattleStage::Fight, vars)
    }

    fn fight(&self, vars: &BattleVars) -> BattleResult {
        let attack = self.jumons.get(&vars.attacker);
        let defense = self.jumons.get(&vars.defender);
        match (attack, defense) {
            (Some(attack), Some(defense)) => resolve_fight(
                attack.total_attack() + vars.attacker_bonus,
                defense.total_defense() + vars.defender_bonus,
            ),
            (Some(_), None) => BattleResult::AttackerWins,
            (None, Some(_)) => BattleResult::DefenderWins,
            (None, None) => BattleResult::Tie,
        }
    }

    fn aftermath(&mut self, kind: BattleKind, vars: BattleVars) -> Transition {
        // Tile the attacker vacated. Empty in a one-tile battle unless it was displaced.
        let vacated = match kind {
            BattleKind::OneTile => vars.origin,
            BattleKind::TwoTile => Some(vars.attack_tile),
        };

        match vars.result.unwrap_or(BattleResult::Tie) {
            BattleResult::AttackerWins => {
                let loot = self.destroy_jumon(vars.defender);
                let alive = match kind {
                    BattleKind::OneTile => {
                        let alive = self.land_jumon(vars.attacker, vars.defense_tile, vacated);
                        if alive {
                            self.announce_landing(vars.attacker, vars.origin, vars.defense_tile);
                        }
                        alive
                    }
                    BattleKind::TwoTile => self.relocate_jumon(vars.attacker, vars.defense_tile),
                };
                self.hand_over(loot, vars.attacker, alive, vacated, vars.defense_tile)
            }
            BattleResult::DefenderWins => {
                let loot = self.destroy_jumon(vars.attacker);
                let alive = self.jumons.contains_key(&vars.defender);
                self.hand_over(loot, vars.defender, alive, vacated, vars.defense_tile)
            }
            BattleResult::Tie => {
                let defender_loot = self.destroy_jumon(vars.defender);
                let attacker_loot = self.destroy_jumon(vars.attacker);
                if let Some(loot) = defender_loot {
                    self.drop_artefact(loot, &[vars.defense_tile]);
                }
                if let Some(loot) = attacker_loot {
                    let mut candidates = vec![vars.attack_tile];
                    candidates.extend(vacated);
                    self.drop_artefact(loot, &candidates);
                }
                Transition::TurnEnd
            }
        }
    }

    /// The loser's equipment goes to the victor through `EquipArtefact`, or
    /// onto the board when the victor did not survive.
    fn hand_over(
        &mut self,
        loot: Option<UnitId>,
        victor: UnitId,
        alive: bool,
        vacated: Option<Position>,
        battle_tile: Position,
    ) -> Transition {
        let Some(artefact) = loot else {
            return Transition::TurnEnd;
        };
        if !alive {
            let mut candidates = vec![battle_tile];
            candidates.extend(vacated);
            self.drop_artefact(artefact, &candidates);
            return Transition::TurnEnd;
        }
        Transition::EquipArtefact(EquipVars {
            jumon: victor,
            artefact,
            drop_at: vacated,
        })
    }
}
