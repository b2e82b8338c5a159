use super::*;

impl MatchContext {
    pub(super) fn make_id(&mut self) -> UnitId {
        self.next_unit_id += 1;
        UnitId(self.next_unit_id)
    }

    pub(super) fn current_player_name(&self) -> Option<String> {
        self.players
            .current_player()
            .map(|player| player.name.clone())
    }

    pub(super) fn player_name(&self, id: Option<PlayerId>) -> String {
        id.and_then(|id| self.players.player(id))
            .map(|player| player.name.clone())
            .unwrap_or_default()
    }

    pub(super) fn owner_of(&self, jumon: UnitId) -> Option<PlayerId> {
        self.jumons.get(&jumon).and_then(|jumon| jumon.owner)
    }

    pub(super) fn jumon_position(&self, jumon: UnitId) -> Option<Position> {
        self.jumons.get(&jumon).and_then(Jumon::position)
    }

    pub(super) fn is_wasted(&self, pos: Position) -> bool {
        self.arena
            .tile_at(pos)
            .map(|tile| tile.wasted)
            .unwrap_or(false)
    }

    pub(super) fn random_position(&mut self) -> Position {
        let x = self.rng.random_range(0..self.arena.width());
        let y = self.rng.random_range(0..self.arena.height());
        Position::new(x, y)
    }

    /// Free, non-wasted tile closest to the centre; ties go to row-major order.
    pub(super) fn free_tile_nearest_centre(&self) -> Option<Position> {
        let centre = self.arena.centre();
        self.arena
            .positions()
            .filter(|pos| self.arena.is_free(*pos) && !self.is_wasted(*pos))
            .min_by_key(|pos| pos.manhattan(centre))
    }

    /// Houses a jumon on a tile and carries its equipment along.
    pub(super) fn place_jumon(&mut self, id: UnitId, pos: Position) -> Result<(), ArenaError> {
        let Some(jumon) = self.jumons.get_mut(&id) else {
            return Ok(());
        };
        self.arena.place_unit_at(jumon, pos)?;
        if let Some(artefact) = jumon.equipment.and_then(|aid| self.artefacts.get_mut(&aid)) {
            artefact.set_position(Some(pos));
        }
        Ok(())
    }

    /// Takes a jumon off the board. Returns the tile it stood on.
    pub(super) fn lift_jumon(&mut self, id: UnitId) -> Option<Position> {
        let jumon = self.jumons.get_mut(&id)?;
        let from = jumon.position();
        if let Some(pos) = from {
            if self.arena.unit_at(pos) == Some(Occupant::Jumon(id)) {
                self.arena.clear_at(pos);
            }
        }
        jumon.set_position(None);
        if let Some(artefact) = jumon.equipment.and_then(|aid| self.artefacts.get_mut(&aid)) {
            artefact.set_position(None);
        }
        from
    }

    /// Lifts the artefact lying on `pos`, if any, so a jumon can take the tile.
    pub(super) fn lift_artefact_at(&mut self, pos: Position) -> Option<UnitId> {
        match self.arena.unit_at(pos) {
            Some(Occupant::Artefact(aid)) => {
                self.arena.clear_at(pos);
                if let Some(artefact) = self.artefacts.get_mut(&aid) {
                    artefact.set_position(None);
                }
                Some(aid)
            }
            _ => None,
        }
    }

    /// Puts a jumon onto `to`. Wasted tiles destroy it; its equipment then drops
    /// on `fallback` when given. Returns false when the jumon did not survive.
    pub(super) fn land_jumon(
        &mut self,
        id: UnitId,
        to: Position,
        fallback: Option<Position>,
    ) -> bool {
        if self.is_wasted(to) {
            debug!(jumon = %id, position = %to, "jumon.landed_on_wasted_tile");
            if let Some(loot) = self.destroy_jumon(id) {
                self.drop_artefact(loot, &fallback.into_iter().collect::<Vec<_>>());
            }
            return false;
        }
        match self.place_jumon(id, to) {
            Ok(()) => true,
            Err(err) => {
                debug!(jumon = %id, error = %err, "jumon.landing_failed");
                false
            }
        }
    }

    /// Moves a jumon that is on the board to `to`.
    pub(super) fn relocate_jumon(&mut self, id: UnitId, to: Position) -> bool {
        let from = self.lift_jumon(id);
        let alive = self.land_jumon(id, to, from);
        if alive {
            if let Some(from) = from {
                self.events.push(InterTurnEvent::Moved {
                    jumon: id,
                    from,
                    to,
                });
            }
        }
        alive
    }

    /// Removes a jumon from the board, its owner and the match. Its equipment
    /// is detached and returned so the caller can hand it on.
    pub(super) fn destroy_jumon(&mut self, id: UnitId) -> Option<UnitId> {
        let position = self.lift_jumon(id);
        let mut jumon = self.jumons.remove(&id)?;
        if let Some(owner) = jumon.owner.and_then(|owner| self.players.player_mut(owner)) {
            owner.forget_jumon(id);
        }
        self.pick_pool.retain(|pooled| *pooled != id);
        self.events.push(InterTurnEvent::JumonDestroyed {
            jumon: id,
            position,
        });

        let loot = jumon.equipment?;
        match self.artefacts.get_mut(&loot) {
            Some(artefact) => {
                artefact.detach_from(&mut jumon);
                artefact.set_position(None);
                Some(loot)
            }
            None => None,
        }
    }

    /// Detaches an artefact from its host (if any) and lays it on the first
    /// free, non-wasted candidate tile. With no such tile it leaves the match.
    pub(super) fn drop_artefact(&mut self, aid: UnitId, candidates: &[Position]) {
        let host = self.artefacts.get(&aid).and_then(Artefact::host);
        if let Some(host) = host {
            if let (Some(artefact), Some(jumon)) =
                (self.artefacts.get_mut(&aid), self.jumons.get_mut(&host))
            {
                artefact.detach_from(jumon);
                artefact.set_position(None);
            }
        }
        self.lay_artefact(aid, candidates);
    }

    fn lay_artefact(&mut self, aid: UnitId, candidates: &[Position]) {
        let spot = candidates
            .iter()
            .copied()
            .find(|pos| self.arena.is_free(*pos) && !self.is_wasted(*pos));
        let Some(artefact) = self.artefacts.get_mut(&aid) else {
            return;
        };
        let placed = spot.filter(|pos| self.arena.place_unit_at(artefact, *pos).is_ok());
        match placed {
            Some(position) => {
                self.events.push(InterTurnEvent::Dropped {
                    artefact: aid,
                    position,
                });
            }
            None => {
                self.artefacts.remove(&aid);
                self.events.push(InterTurnEvent::ArtefactLost { artefact: aid });
            }
        }
    }

    /// Jumons currently on the board, by id.
    pub(super) fn summoned_ids(&self) -> Vec<UnitId> {
        self.jumons
            .values()
            .filter(|jumon| jumon.position().is_some())
            .map(|jumon| jumon.id)
            .collect()
    }

    /// Summoned jumons of players still in the ring.
    pub(super) fn jumons_in_play(&self) -> usize {
        self.players
            .get_players()
            .into_iter()
            .filter_map(|id| self.players.player(id))
            .map(|player| player.summoned_jumons.len())
            .sum()
    }
}
