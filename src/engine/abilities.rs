use super::*;

fn is_boni_eval(state: StateId) -> bool {
    matches!(state, StateId::Battle(_, BattleStage::BoniEval))
}

impl MatchContext {
    /// Runs a jumon's own hook, then its equipment's hook unless the jumon
    /// already replaced the proposed transition.
    pub(super) fn jumon_hook(
        &mut self,
        id: UnitId,
        state: StateId,
        proposed: Transition,
    ) -> Transition {
        let Some(jumon) = self.jumons.get(&id) else {
            return proposed;
        };
        let ability = jumon.ability;
        let equipment = jumon.equipment;

        let original = proposed.clone();
        let after = self.jumon_ability(ability, id, state, proposed);
        if after != original {
            return after;
        }
        match equipment {
            Some(aid) => self.artefact_hook(aid, state, after),
            None => after,
        }
    }

    /// Attacker first, then defender.
    pub(super) fn battle_hooks(
        &mut self,
        attacker: UnitId,
        defender: UnitId,
        state: StateId,
        proposed: Transition,
    ) -> Transition {
        let proposed = self.jumon_hook(attacker, state, proposed);
        self.jumon_hook(defender, state, proposed)
    }

    pub(super) fn artefact_hook(
        &mut self,
        aid: UnitId,
        state: StateId,
        proposed: Transition,
    ) -> Transition {
        let Some(artefact) = self.artefacts.get(&aid) else {
            return proposed;
        };
        let ability = artefact.ability;
        let key = artefact.interference_key();
        let Some(host) = artefact.host() else {
            return proposed;
        };

        let mut proposed = proposed;
        match ability {
            ArtefactAbility::Sword if is_boni_eval(state) => {
                if let Some(vars) = proposed.battle_vars_mut() {
                    if vars.attacker == host {
                        vars.attacker_bonus += SWORD_BONUS;
                    }
                }
            }
            ArtefactAbility::Shield if is_boni_eval(state) => {
                if let Some(vars) = proposed.battle_vars_mut() {
                    if vars.defender == host {
                        vars.defender_bonus += SHIELD_BONUS;
                    }
                }
            }
            ArtefactAbility::Banner if state == StateId::EquipArtefact => {
                if let Some(jumon) = self.jumons.get_mut(&host) {
                    jumon.persistent_interference.remove(&key);
                    jumon.add_persistent_interference(&key, StatModifier::new(0, 0, BANNER_MOVEMENT));
                }
            }
            ArtefactAbility::Crown if state == StateId::TurnBegin => {
                self.crown_check(host);
            }
            _ => {}
        }
        proposed
    }

    pub(super) fn tile_hook(
        &mut self,
        pos: Position,
        state: StateId,
        proposed: Transition,
    ) -> Transition {
        let Some(tile) = self.arena.tile_at(pos) else {
            return proposed;
        };
        if !tile.revealed || !is_boni_eval(state) {
            return proposed;
        }
        let ability = tile.ability;

        let mut proposed = proposed;
        if let Some(vars) = proposed.battle_vars_mut() {
            // A tile only acts on the side standing on it.
            match ability {
                TileAbility::Fortress if pos == vars.defense_tile => {
                    vars.defender_bonus += FORTRESS_BONUS;
                }
                TileAbility::Mire if pos == vars.attack_tile => {
                    vars.attacker_bonus -= MIRE_PENALTY;
                }
                _ => {}
            }
        }
        proposed
    }

    fn jumon_ability(
        &mut self,
        ability: JumonAbility,
        id: UnitId,
        state: StateId,
        proposed: Transition,
    ) -> Transition {
        match (ability, state) {
            (JumonAbility::Guardian, StateId::TurnBegin) => {
                // Fortifies the tile it starts the turn on, for its own faction.
                let spot = self
                    .jumons
                    .get(&id)
                    .and_then(|jumon| Some((jumon.position()?, jumon.faction)));
                if let Some((pos, faction)) = spot {
                    if let Some(tile) = self.arena.tile_at_mut(pos) {
                        let shield = Bonus::new(0, GUARDIAN_DEFENSE);
                        tile.add_turn_interference("guardian", faction, shield);
                    }
                }
                proposed
            }
            (JumonAbility::Herald, StateId::Summon) => match proposed {
                Transition::SummonCheck(mut vars) if !vars.displaced => {
                    if let Some(pos) = self.free_tile_nearest_centre() {
                        vars.target = Some(pos);
                    }
                    Transition::SummonCheck(vars)
                }
                other => other,
            },
            (JumonAbility::Berserker, StateId::Battle(_, BattleStage::Begin)) => {
                let attacking = matches!(&proposed, Transition::Battle(_, _, vars) if vars.attacker == id);
                if attacking {
                    if let Some(jumon) = self.jumons.get_mut(&id) {
                        jumon.add_turn_interference("berserk", StatModifier::new(BERSERK_ATTACK, 0, 0));
                    }
                }
                proposed
            }
            (JumonAbility::Tempest, StateId::SummonCheck) => {
                self.queue_tempest(id);
                proposed
            }
            (JumonAbility::Charger, StateId::Battle(BattleKind::TwoTile, BattleStage::Fight)) => {
                let won = matches!(
                    &proposed,
                    Transition::Battle(_, _, vars)
                        if vars.attacker == id && vars.result == Some(BattleResult::AttackerWins)
                );
                if won && !self.follow_up_used {
                    self.follow_up_used = true;
                    self.post_turn.push(Transition::WaitForUser(WaitVars {
                        enforced: Some(Enforced {
                            jumon: id,
                            kind: EventKind::Move,
                        }),
                    }));
                }
                proposed
            }
            _ => proposed,
        }
    }

    /// Legality of a special move, decided by the jumon's own ability.
    pub(super) fn special_move_legal(&self, id: UnitId, target: Position) -> bool {
        let Some(jumon) = self.jumons.get(&id) else {
            return false;
        };
        let Some(from) = jumon.position() else {
            return false;
        };
        match jumon.ability {
            JumonAbility::Leaper => {
                self.arena.is_free(target)
                    && target != from
                    && from.manhattan(target) <= jumon.total_movement() + 1
            }
            _ => false,
        }
    }

    pub(super) fn resolve_special_move(&mut self, id: UnitId, target: Position) -> Transition {
        let ability = self.jumons.get(&id).map(|jumon| jumon.ability);
        if ability == Some(JumonAbility::Leaper) {
            self.relocate_jumon(id, target);
        }
        Transition::TurnEnd
    }

    /// Queues a displacement re-summon for every hostile jumon next to `id`.
    fn queue_tempest(&mut self, id: UnitId) {
        let Some(pos) = self.jumon_position(id) else {
            return;
        };
        let owner = self.owner_of(id);
        for neighbor in pos.neighbors() {
            let Some(Occupant::Jumon(other)) = self.arena.unit_at(neighbor) else {
                continue;
            };
            if self.owner_of(other) != owner {
                debug!(jumon = %id, displaced = %other, "ability.tempest");
                self.post_turn
                    .push(Transition::Summon(SummonVars::displace(other)));
            }
        }
    }

    fn crown_check(&mut self, host: UnitId) {
        let Some(owner) = self.owner_of(host) else {
            return;
        };
        if self.players.current() != Some(owner) {
            return;
        }
        if self.jumon_position(host) != Some(self.arena.centre()) {
            return;
        }
        if let Some(player) = self.players.player_mut(owner) {
            if !player.won {
                info!(player = %player.name, "ability.crown_claimed");
            }
            player.won = true;
        }
    }
}
