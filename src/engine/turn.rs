use super::*;

impl MatchContext {
    pub(super) fn turn_begin(&mut self, now_ms: u64) -> Option<Transition> {
        self.turn += 1;
        self.turn_started_ms = now_ms;
        self.turn_elapsed_ms = 0;
        self.follow_up_used = false;
        self.arena.reset_turn_interference();
        for jumon in self.jumons.values_mut() {
            jumon.reset_turn_interference();
        }

        // Idle triggers: hooks run, nothing they propose is taken.
        for id in self.summoned_ids() {
            let _ = self.jumon_hook(id, StateId::TurnBegin, Transition::wait());
        }

        debug!(turn = self.turn, player = ?self.current_player_name(), "turn.begin");
        Some(Transition::wait())
    }

    pub(super) fn wait_for_user(
        &mut self,
        vars: WaitVars,
        event: &Event,
        now_ms: u64,
    ) -> Option<Transition> {
        self.turn_elapsed_ms = now_ms.saturating_sub(self.turn_started_ms);
        if matches!(event, Event::Timeout)
            || self.turn_elapsed_ms > self.config.turn_time_limit_ms
        {
            // Letting a forced follow-up lapse is not held against the player.
            if let Some(enforced) = vars.enforced {
                debug!(jumon = %enforced.jumon, "follow_up.lapsed");
                return Some(Transition::TurnEnd);
            }
            return Some(Transition::Timeout);
        }

        let player_id = self.players.current()?;
        let pool_empty = self.pick_pool.is_empty();
        let player = self.players.player_mut(player_id)?;
        if player.phase == Phase::Pick && pool_empty {
            player.phase = Phase::Summon;
        }
        let phase = player.phase;
        if player.neutral {
            return Some(self.neutral_intent(player_id, vars));
        }

        if let Some(enforced) = vars.enforced {
            if event.kind().is_some()
                && (event.kind() != Some(enforced.kind) || event.jumon() != Some(enforced.jumon))
            {
                debug!(?event, "action.not_enforced");
                return None;
            }
        }

        let player = self.players.player(player_id)?;
        let next = match event {
            Event::Pick(id) if phase == Phase::Pick && self.pick_pool.contains(id) => {
                Transition::Pick(*id)
            }
            Event::Summon(id)
                if phase == Phase::Summon && player.jumons_to_summon.contains(id) =>
            {
                Transition::Summon(SummonVars::fresh(*id))
            }
            Event::Move { jumon, target }
                if phase == Phase::Move && player.summoned_jumons.contains(jumon) =>
            {
                Transition::CheckMove(MoveVars {
                    jumon: *jumon,
                    target: *target,
                    enforced: vars.enforced,
                })
            }
            Event::SpecialMove { jumon, target }
                if phase == Phase::Move && player.summoned_jumons.contains(jumon) =>
            {
                Transition::CheckSpecialMove(MoveVars {
                    jumon: *jumon,
                    target: *target,
                    enforced: vars.enforced,
                })
            }
            Event::ParserError(message) => {
                debug!(player = %player.name, %message, "action.unparsed");
                return None;
            }
            Event::Continue | Event::Timeout => return None,
            other => {
                debug!(player = %player.name, event = ?other, ?phase, "action.rejected");
                return None;
            }
        };
        Some(next)
    }

    /// Decides the neutral player's action for this wait.
    fn neutral_intent(&mut self, player_id: PlayerId, vars: WaitVars) -> Transition {
        let Some(player) = self.players.player(player_id) else {
            return Transition::TurnEnd;
        };
        if vars.enforced.is_none() && player.phase == Phase::Summon {
            if let Some(first) = player.jumons_to_summon.first() {
                return Transition::Summon(SummonVars::fresh(*first));
            }
        }

        let movers: Vec<(UnitId, Position)> = player
            .summoned_jumons
            .iter()
            .filter(|id| vars.enforced.map_or(true, |enforced| enforced.jumon == **id))
            .filter_map(|id| {
                let jumon = self.jumons.get(id)?;
                let pos = jumon.position()?;
                (jumon.total_movement() >= 1).then_some((*id, pos))
            })
            .collect();

        for (id, pos) in &movers {
            for neighbor in pos.neighbors() {
                if let Some(Occupant::Jumon(other)) = self.arena.unit_at(neighbor) {
                    if self.owner_of(other) != Some(player_id) {
                        return Transition::CheckMove(MoveVars {
                            jumon: *id,
                            target: neighbor,
                            enforced: vars.enforced,
                        });
                    }
                }
            }
        }

        let steps: Vec<(UnitId, Position)> = movers
            .iter()
            .flat_map(|(id, pos)| pos.neighbors().into_iter().map(move |n| (*id, n)))
            .filter(|(_, n)| self.arena.is_free(*n) && !self.is_wasted(*n))
            .collect();
        if steps.is_empty() {
            return Transition::TurnEnd;
        }
        let (jumon, target) = steps[self.rng.random_range(0..steps.len())];
        Transition::CheckMove(MoveVars {
            jumon,
            target,
            enforced: vars.enforced,
        })
    }

    pub(super) fn pick(&mut self, jumon: UnitId) -> Option<Transition> {
        let player_id = self.players.current()?;
        let Some(idx) = self.pick_pool.iter().position(|id| *id == jumon) else {
            return Some(Transition::wait());
        };
        self.pick_pool.remove(idx);
        if let Some(unit) = self.jumons.get_mut(&jumon) {
            unit.owner = Some(player_id);
        }

        let remaining = self.pick_pool.len();
        let active = self.players.non_neutral_count();
        let player = self.players.player_mut(player_id)?;
        player.jumons_to_summon.push(jumon);
        if remaining < active {
            player.phase = Phase::Summon;
        }
        let name = player.name.clone();
        self.events.push(InterTurnEvent::Picked {
            player: name,
            jumon,
        });
        Some(Transition::TurnEnd)
    }

    pub(super) fn timeout(&mut self) -> Option<Transition> {
        let max = self.config.max_timeouts;
        let player_id = self.players.current()?;
        let player = self.players.player_mut(player_id)?;
        player.timeout_count += 1;
        if player.timeout_count >= max {
            player.dead = true;
        }
        info!(player = %player.name, count = player.timeout_count, "turn.timeout");
        let event = InterTurnEvent::TimedOut {
            player: player.name.clone(),
            count: player.timeout_count,
        };
        self.events.push(event);
        Some(Transition::TurnEnd)
    }

    pub(super) fn turn_end(&mut self, now_ms: u64) -> Option<Transition> {
        match self.post_turn.pop() {
            Some(queued) => {
                // A queued wait is a fresh decision and gets a full clock.
                if matches!(queued, Transition::WaitForUser(_)) {
                    self.turn_started_ms = now_ms;
                    self.turn_elapsed_ms = 0;
                }
                Some(queued)
            }
            None => Some(Transition::ChangePlayer),
        }
    }

    pub(super) fn change_player(&mut self) -> Option<Transition> {
        for player in self.players.all_players_mut() {
            if player.dead || player.phase == Phase::Pick {
                continue;
            }
            if player.phase == Phase::Summon && player.jumons_to_summon.is_empty() {
                player.phase = Phase::Move;
            }
            if !player.has_units() {
                player.dead = true;
            }
        }

        for removed in self.players.update() {
            self.retire_player(removed);
        }

        if let Some(outcome) = self.check_outcome() {
            match &outcome {
                MatchOutcome::Victory { winner } => {
                    info!(winner = %winner, turn = self.turn, "match.victory");
                    self.events.push(InterTurnEvent::Victory {
                        player: winner.clone(),
                    });
                }
                MatchOutcome::Draw => {
                    info!(turn = self.turn, "match.draw");
                    self.events.push(InterTurnEvent::Draw);
                }
            }
            self.outcome = Some(outcome);
            return None;
        }

        self.players.next_turn();
        self.events.push(InterTurnEvent::TurnEnded {
            next_player: self.current_player_name(),
        });
        Some(Transition::TurnBegin)
    }

    /// Clears a removed player's units off the board. Equipment stays behind
    /// on the tile its host stood on.
    fn retire_player(&mut self, id: PlayerId) {
        let Some(player) = self.players.player(id) else {
            return;
        };
        let name = player.name.clone();
        let units: Vec<UnitId> = player
            .summoned_jumons
            .iter()
            .chain(player.jumons_to_summon.iter())
            .copied()
            .collect();

        for unit in units {
            let position = self.jumon_position(unit);
            if let Some(loot) = self.destroy_jumon(unit) {
                self.drop_artefact(loot, &position.into_iter().collect::<Vec<_>>());
            }
        }
        info!(player = %name, "player.died");
        self.events.push(InterTurnEvent::PlayerDied { player: name });
    }

    fn check_outcome(&mut self) -> Option<MatchOutcome> {
        let ring = self.players.get_players();
        if let Some(winner) = ring
            .iter()
            .filter_map(|id| self.players.player(*id))
            .find(|player| player.won)
        {
            return Some(MatchOutcome::Victory {
                winner: winner.name.clone(),
            });
        }

        if self.players.non_neutral_count() == 0 {
            return Some(MatchOutcome::Draw);
        }
        if self.players.non_neutral_count() == 1 {
            let winner = ring
                .iter()
                .filter_map(|id| self.players.player(*id))
                .find(|player| !player.neutral)?;
            return Some(MatchOutcome::Victory {
                winner: winner.name.clone(),
            });
        }

        if self.config.mode == GameMode::LastManStanding {
            if self.jumons_in_play() == 2 {
                self.two_left_turns += 1;
            } else {
                self.two_left_turns = 0;
            }
            if self.two_left_turns > self.config.lms_turn_limit {
                return Some(MatchOutcome::Draw);
            }
        }
        None
    }
}
