use super::*;

impl MatchContext {
    pub(super) fn check_move(&mut self, vars: MoveVars) -> Option<Transition> {
        let back = Transition::WaitForUser(WaitVars {
            enforced: vars.enforced,
        });
        let Some(jumon) = self.jumons.get(&vars.jumon) else {
            return Some(back);
        };
        let Some(from) = jumon.position() else {
            return Some(back);
        };
        let Some(path) = find_path(from, vars.target, &self.arena) else {
            debug!(jumon = %vars.jumon, target = %vars.target, "move.no_path");
            return Some(back);
        };
        if path_steps(&path) > jumon.total_movement() || path_steps(&path) == 0 {
            debug!(jumon = %vars.jumon, target = %vars.target, steps = path_steps(&path), "move.too_far");
            return Some(back);
        }

        match self.arena.unit_at(vars.target) {
            None => {
                self.relocate_jumon(vars.jumon, vars.target);
                Some(Transition::TurnEnd)
            }
            Some(Occupant::Artefact(_)) => {
                let artefact = self.lift_artefact_at(vars.target)?;
                self.relocate_jumon(vars.jumon, vars.target);
                Some(Transition::EquipArtefact(EquipVars {
                    jumon: vars.jumon,
                    artefact,
                    drop_at: Some(from),
                }))
            }
            Some(Occupant::Jumon(other)) if self.owner_of(other) == self.owner_of(vars.jumon) => {
                debug!(jumon = %vars.jumon, target = %vars.target, "move.friendly_tile");
                Some(back)
            }
            Some(Occupant::Jumon(other)) => {
                self.events.push(InterTurnEvent::BattleStarted {
                    attacker: vars.jumon,
                    defender: other,
                    attack_tile: from,
                    defense_tile: vars.target,
                });
                Some(Transition::Battle(
                    BattleKind::TwoTile,
                    BattleStage::Begin,
                    BattleVars {
                        attacker: vars.jumon,
                        defender: other,
                        attack_tile: from,
                        defense_tile: vars.target,
                        origin: Some(from),
                        attacker_bonus: 0,
                        defender_bonus: 0,
                        result: None,
                    },
                ))
            }
        }
    }

    pub(super) fn check_special_move(&mut self, vars: MoveVars) -> Option<Transition> {
        if !self.special_move_legal(vars.jumon, vars.target) {
            debug!(jumon = %vars.jumon, target = %vars.target, "special_move.rejected");
            return Some(Transition::WaitForUser(WaitVars {
                enforced: vars.enforced,
            }));
        }
        Some(self.resolve_special_move(vars.jumon, vars.target))
    }
}
