use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::constants::{PARTICIPATION_REWARD, WIN_REWARD};
use crate::engine::{Event, StateMachine};
use crate::result_store::ResultStore;
use crate::types::{InterTurnEvent, MatchOutcome, MatchSummary, ResultKind, Snapshot};

/// One player's action as it arrives from the network.
#[derive(Clone, Debug)]
pub struct Command {
    pub player: String,
    pub event: Event,
}

/// Outbound side of a running match.
pub trait Broadcaster: Send {
    fn broadcast_snapshot(&mut self, snapshot: &Snapshot);
    fn broadcast_event(&mut self, event: &InterTurnEvent);
    fn broadcast_game_over(&mut self, summary: &MatchSummary);
}

/// Feeds one match's state machine until it ends. Only the current player's
/// commands reach the machine; everything else is dropped.
pub struct MatchDriver<B> {
    machine: StateMachine,
    commands: mpsc::Receiver<Command>,
    internal: VecDeque<Event>,
    broadcaster: B,
    started: Instant,
}

impl<B: Broadcaster> MatchDriver<B> {
    pub fn new(machine: StateMachine, commands: mpsc::Receiver<Command>, broadcaster: B) -> Self {
        Self {
            machine,
            commands,
            internal: VecDeque::new(),
            broadcaster,
            started: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub async fn run<S: ResultStore>(mut self, store: Arc<Mutex<S>>) -> MatchSummary {
        let now = self.now_ms();
        self.machine.settle(now);
        self.flush_events();
        self.broadcaster
            .broadcast_snapshot(&self.machine.build_snapshot());

        loop {
            if let Some(summary) = self.machine.build_summary() {
                info!(outcome = ?summary.outcome, turns = summary.turns, "match.finished");
                persist_results(&store, &summary).await;
                self.broadcaster.broadcast_game_over(&summary);
                return summary;
            }
            self.queue_internal();

            let event = match self.internal.pop_front() {
                Some(event) => event,
                None => self.next_player_event().await,
            };
            let now = self.now_ms();
            self.machine.run(&event, now);
            self.machine.settle(now);
            self.flush_events();
        }
    }

    /// The neutral player decides on its own, so its waits get a nudge instead
    /// of a network read.
    fn queue_internal(&mut self) {
        if !self.internal.is_empty() || self.machine.is_ended() {
            return;
        }
        if !self.machine.is_waiting() || self.machine.current_player_is_neutral() {
            self.internal.push_back(Event::Continue);
        }
    }

    async fn next_player_event(&mut self) -> Event {
        let current = self.machine.current_player_name();
        loop {
            let remaining = self
                .machine
                .turn_deadline_ms()
                .saturating_sub(self.now_ms());
            match tokio::time::timeout(Duration::from_millis(remaining), self.commands.recv())
                .await
            {
                Err(_) => return Event::Timeout,
                // Nobody can act any more, so every turn runs out.
                Ok(None) => return Event::Timeout,
                Ok(Some(command)) if Some(&command.player) == current.as_ref() => {
                    return command.event;
                }
                Ok(Some(command)) => {
                    debug!(player = %command.player, event = ?command.event, "driver.not_your_turn");
                }
            }
        }
    }

    fn flush_events(&mut self) {
        for event in self.machine.drain_events() {
            self.broadcaster.broadcast_event(&event);
            if matches!(event, InterTurnEvent::TurnEnded { .. }) {
                self.broadcaster
                    .broadcast_snapshot(&self.machine.build_snapshot());
            }
        }
    }
}

/// Reports every non-neutral player's result. Store failures are logged and
/// the match still finishes.
async fn persist_results<S: ResultStore>(store: &Mutex<S>, summary: &MatchSummary) {
    let mut store = store.lock().await;
    for player in &summary.players {
        let (result, reward) = match &summary.outcome {
            MatchOutcome::Victory { winner } if winner == player => (ResultKind::Win, WIN_REWARD),
            MatchOutcome::Victory { .. } => (ResultKind::Loss, PARTICIPATION_REWARD),
            MatchOutcome::Draw => (ResultKind::Draw, PARTICIPATION_REWARD),
        };
        if let Err(error) = store.record_result(player, summary.mode, result) {
            warn!(player = %player, %error, "results.record_failed");
        }
        if let Err(error) = store.reward_player(player, reward) {
            warn!(player = %player, %error, "results.reward_failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::engine::{MatchConfig, MatchSetup, PoolEntry};
    use crate::result_store::ResultStoreError;
    use crate::types::{GameMode, UnitId};

    #[derive(Default)]
    struct MemoryStore {
        results: Vec<(String, GameMode, ResultKind)>,
        rewards: Vec<(String, i64)>,
        fail: bool,
    }

    impl ResultStore for MemoryStore {
        fn record_result(
            &mut self,
            player: &str,
            mode: GameMode,
            result: ResultKind,
        ) -> Result<(), ResultStoreError> {
            if self.fail {
                return Err(ResultStoreError::EmptyName);
            }
            self.results.push((player.to_string(), mode, result));
            Ok(())
        }

        fn reward_player(&mut self, player: &str, amount: i64) -> Result<(), ResultStoreError> {
            if self.fail {
                return Err(ResultStoreError::EmptyName);
            }
            self.rewards.push((player.to_string(), amount));
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Recorder {
        log: Arc<std::sync::Mutex<Vec<String>>>,
        events: Arc<std::sync::Mutex<Vec<InterTurnEvent>>>,
    }

    impl Broadcaster for Recorder {
        fn broadcast_snapshot(&mut self, _snapshot: &Snapshot) {
            self.log.lock().expect("log lock").push("state".to_string());
        }

        fn broadcast_event(&mut self, event: &InterTurnEvent) {
            self.log.lock().expect("log lock").push("event".to_string());
            self.events.lock().expect("events lock").push(event.clone());
        }

        fn broadcast_game_over(&mut self, _summary: &MatchSummary) {
            self.log.lock().expect("log lock").push("game_over".to_string());
        }
    }

    fn machine(pool: &[&str]) -> StateMachine {
        let mut setup = MatchSetup::new(vec!["a".to_string(), "b".to_string()], 5, 5);
        setup.pool = pool.iter().map(|name| PoolEntry::new(name)).collect();
        let config = MatchConfig {
            seed: 3,
            ..MatchConfig::default()
        };
        StateMachine::new(&setup, &Catalog::builtin(), config).expect("valid setup")
    }

    #[tokio::test]
    async fn idle_players_time_out_until_one_is_left() {
        tokio::time::pause();
        let (_tx, rx) = mpsc::channel(8);
        let recorder = Recorder::default();
        let store = Arc::new(Mutex::new(MemoryStore::default()));
        let driver = MatchDriver::new(machine(&["Ember", "Pebble"]), rx, recorder.clone());

        let summary = driver.run(store.clone()).await;

        // `a` moves first and is the first to reach the timeout limit.
        assert_eq!(
            summary.outcome,
            MatchOutcome::Victory {
                winner: "b".to_string()
            }
        );
        let store = store.lock().await;
        assert!(store
            .results
            .contains(&("b".to_string(), GameMode::Standard, ResultKind::Win)));
        assert!(store
            .results
            .contains(&("a".to_string(), GameMode::Standard, ResultKind::Loss)));
        assert!(store.rewards.contains(&("b".to_string(), WIN_REWARD)));
        assert!(store.rewards.contains(&("a".to_string(), PARTICIPATION_REWARD)));

        let log = recorder.log.lock().expect("log lock");
        assert_eq!(log.first().map(String::as_str), Some("state"));
        assert_eq!(log.last().map(String::as_str), Some("game_over"));
        let timeouts = recorder
            .events
            .lock()
            .expect("events lock")
            .iter()
            .filter(|event| matches!(event, InterTurnEvent::TimedOut { .. }))
            .count();
        assert_eq!(timeouts, 5);
    }

    #[tokio::test]
    async fn only_the_current_player_is_heard() {
        tokio::time::pause();
        let machine = machine(&["Ember", "Pebble"]);
        let pool: Vec<UnitId> = machine.context().pick_pool.clone();
        let (tx, rx) = mpsc::channel(8);
        tx.send(Command {
            player: "b".to_string(),
            event: Event::Pick(pool[1]),
        })
        .await
        .expect("send");
        tx.send(Command {
            player: "a".to_string(),
            event: Event::Pick(pool[1]),
        })
        .await
        .expect("send");
        tx.send(Command {
            player: "b".to_string(),
            event: Event::Pick(pool[0]),
        })
        .await
        .expect("send");
        drop(tx);

        let recorder = Recorder::default();
        let store = Arc::new(Mutex::new(MemoryStore::default()));
        let summary = MatchDriver::new(machine, rx, recorder.clone())
            .run(store)
            .await;

        let picks: Vec<(String, UnitId)> = recorder
            .events
            .lock()
            .expect("events lock")
            .iter()
            .filter_map(|event| match event {
                InterTurnEvent::Picked { player, jumon } => Some((player.clone(), *jumon)),
                _ => None,
            })
            .collect();
        assert_eq!(
            picks,
            vec![("a".to_string(), pool[1]), ("b".to_string(), pool[0])]
        );
        assert_eq!(summary.players, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn store_failures_do_not_stop_the_match() {
        tokio::time::pause();
        let (_tx, rx) = mpsc::channel(8);
        let store = Arc::new(Mutex::new(MemoryStore {
            fail: true,
            ..MemoryStore::default()
        }));

        let summary = MatchDriver::new(machine(&["Ember", "Pebble"]), rx, Recorder::default())
            .run(store.clone())
            .await;

        assert!(matches!(summary.outcome, MatchOutcome::Victory { .. }));
        assert!(store.lock().await.results.is_empty());
    }
}
