use super::*;

impl MatchContext {
    pub(super) fn summon(&mut self, vars: SummonVars) -> Option<Transition> {
        let Some(jumon) = self.jumons.get(&vars.jumon) else {
            return Some(Transition::TurnEnd);
        };
        let mut vars = vars;
        if vars.displaced {
            // Displaced jumons leave from wherever they stand now.
            let Some(origin) = jumon.position() else {
                return Some(Transition::TurnEnd);
            };
            vars.origin = Some(origin);
        }
        if vars.attempts >= self.config.max_summon_attempts {
            info!(jumon = %vars.jumon, attempts = vars.attempts, "summon.gave_up");
            return Some(Transition::TurnEnd);
        }

        let target = self.random_position();
        let proposed = Transition::SummonCheck(SummonVars {
            target: Some(target),
            attempts: vars.attempts + 1,
            ..vars.clone()
        });
        Some(self.jumon_hook(vars.jumon, StateId::Summon, proposed))
    }

    pub(super) fn summon_check(&mut self, vars: SummonVars) -> Option<Transition> {
        let retry = Transition::Summon(vars.clone());
        let Some(target) = vars.target else {
            return Some(retry);
        };
        if !self.arena.contains(target) || !self.jumons.contains_key(&vars.jumon) {
            return Some(retry);
        }
        // Landing on its own tile is the one blocked case.
        if vars.origin == Some(target) {
            return Some(retry);
        }

        match self.arena.unit_at(target) {
            None => {
                let alive = self.complete_summon(&vars, target);
                if alive && !vars.displaced {
                    return Some(self.jumon_hook(
                        vars.jumon,
                        StateId::SummonCheck,
                        Transition::TurnEnd,
                    ));
                }
                Some(Transition::TurnEnd)
            }
            Some(Occupant::Artefact(_)) => {
                let Some(artefact) = self.lift_artefact_at(target) else {
                    return Some(retry);
                };
                self.complete_summon(&vars, target);
                let proposed = Transition::EquipArtefact(EquipVars {
                    jumon: vars.jumon,
                    artefact,
                    drop_at: vars.origin,
                });
                if vars.displaced {
                    return Some(proposed);
                }
                Some(self.jumon_hook(vars.jumon, StateId::SummonCheck, proposed))
            }
            Some(Occupant::Jumon(other)) => {
                if self.owner_of(other) == self.owner_of(vars.jumon) {
                    return Some(retry);
                }
                self.leave_summon_list(&vars);
                let battle = BattleVars {
                    attacker: vars.jumon,
                    defender: other,
                    attack_tile: target,
                    defense_tile: target,
                    origin: vars.origin,
                    attacker_bonus: 0,
                    defender_bonus: 0,
                    result: None,
                };
                self.events.push(InterTurnEvent::BattleStarted {
                    attacker: vars.jumon,
                    defender: other,
                    attack_tile: target,
                    defense_tile: target,
                });
                Some(Transition::Battle(
                    BattleKind::OneTile,
                    BattleStage::Begin,
                    battle,
                ))
            }
        }
    }

    /// Moves the jumon from its owner's summon list onto the board. Returns
    /// false when the target tile was wasted and destroyed it.
    fn complete_summon(&mut self, vars: &SummonVars, target: Position) -> bool {
        self.leave_summon_list(vars);
        let alive = self.land_jumon(vars.jumon, target, vars.origin);
        if !alive {
            return false;
        }

        self.announce_landing(vars.jumon, vars.origin, target);
        true
    }

    /// Displaced jumons report a move, fresh ones a summon.
    pub(super) fn announce_landing(&mut self, jumon: UnitId, origin: Option<Position>, to: Position) {
        if let Some(from) = origin {
            self.events.push(InterTurnEvent::Moved { jumon, from, to });
            return;
        }
        let player = self.player_name(self.owner_of(jumon));
        info!(player = %player, jumon = %jumon, position = %to, "summon.landed");
        self.events.push(InterTurnEvent::Summoned {
            player,
            jumon,
            position: to,
        });
    }

    /// Bookkeeping shared by every summon outcome: the jumon leaves its owner's
    /// summon list (or its old tile when displaced) and counts as summoned.
    fn leave_summon_list(&mut self, vars: &SummonVars) {
        if vars.displaced {
            self.lift_jumon(vars.jumon);
            return;
        }
        let Some(owner) = self.owner_of(vars.jumon) else {
            return;
        };
        if let Some(player) = self.players.player_mut(owner) {
            player.jumons_to_summon.retain(|id| *id != vars.jumon);
            if !player.summoned_jumons.contains(&vars.jumon) {
                player.summoned_jumons.push(vars.jumon);
            }
        }
    }

    pub(super) fn equip_artefact(&mut self, vars: EquipVars) -> Option<Transition> {
        if !self.artefacts.contains_key(&vars.artefact) {
            return Some(Transition::TurnEnd);
        }
        let Some(previous) = self.jumons.get(&vars.jumon).map(|jumon| jumon.equipment) else {
            // Host is gone, so the artefact goes to the drop tile.
            let candidates: Vec<Position> = vars.drop_at.into_iter().collect();
            self.drop_artefact(vars.artefact, &candidates);
            return Some(Transition::TurnEnd);
        };

        if let Some(old) = previous.filter(|old| *old != vars.artefact) {
            let candidates: Vec<Position> = vars.drop_at.into_iter().collect();
            self.drop_artefact(old, &candidates);
        }

        if let (Some(artefact), Some(jumon)) = (
            self.artefacts.get_mut(&vars.artefact),
            self.jumons.get_mut(&vars.jumon),
        ) {
            artefact.attach_to(jumon);
        }
        debug!(jumon = %vars.jumon, artefact = %vars.artefact, "artefact.equipped");
        self.events.push(InterTurnEvent::Equipped {
            jumon: vars.jumon,
            artefact: vars.artefact,
        });

        Some(self.jumon_hook(vars.jumon, StateId::EquipArtefact, Transition::TurnEnd))
    }
}
