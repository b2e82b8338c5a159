use crate::types::{Phase, PlayerId, UnitId};

#[derive(Clone, Debug)]
pub struct Player {
    pub name: String,
    pub phase: Phase,
    pub neutral: bool,
    pub jumons_to_summon: Vec<UnitId>,
    pub summoned_jumons: Vec<UnitId>,
    pub dead: bool,
    pub won: bool,
    pub timeout_count: u32,
}

impl Player {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            phase: Phase::Pick,
            neutral: false,
            jumons_to_summon: Vec::new(),
            summoned_jumons: Vec::new(),
            dead: false,
            won: false,
            timeout_count: 0,
        }
    }

    pub fn neutral(name: &str) -> Self {
        Self {
            phase: Phase::Summon,
            neutral: true,
            ..Self::new(name)
        }
    }

    pub fn has_units(&self) -> bool {
        !self.jumons_to_summon.is_empty() || !self.summoned_jumons.is_empty()
    }

    pub fn forget_jumon(&mut self, jumon: UnitId) {
        self.jumons_to_summon.retain(|id| *id != jumon);
        self.summoned_jumons.retain(|id| *id != jumon);
    }
}

#[derive(Clone, Copy, Debug)]
struct Link {
    next: PlayerId,
    prev: PlayerId,
    linked: bool,
}

/// Turn order as a ring of index links over a stable player table. Removed
/// players stay in the table so their results can still be read.
#[derive(Clone, Debug, Default)]
pub struct PlayerChain {
    players: Vec<Player>,
    links: Vec<Link>,
    start: Option<PlayerId>,
    current: Option<PlayerId>,
    len: usize,
    non_neutral: usize,
}

impl PlayerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends at the end of the ring, just before the start node.
    pub fn insert(&mut self, player: Player) -> PlayerId {
        let id = PlayerId(self.players.len());
        if !player.neutral {
            self.non_neutral += 1;
        }
        self.players.push(player);

        match self.start {
            None => {
                self.links.push(Link {
                    next: id,
                    prev: id,
                    linked: true,
                });
                self.start = Some(id);
                self.current = Some(id);
            }
            Some(start) => {
                let last = self.links[start.0].prev;
                self.links.push(Link {
                    next: start,
                    prev: last,
                    linked: true,
                });
                self.links[last.0].next = id;
                self.links[start.0].prev = id;
            }
        }
        self.len += 1;
        id
    }

    /// Unlinks a node. Removing the current node moves `current` to its
    /// predecessor so the following `next_turn` lands on the removed node's successor.
    pub fn remove_node(&mut self, id: PlayerId) -> bool {
        let Some(link) = self.links.get(id.0).copied() else {
            return false;
        };
        if !link.linked {
            return false;
        }

        if self.len == 1 {
            self.start = None;
            self.current = None;
        } else {
            self.links[link.prev.0].next = link.next;
            self.links[link.next.0].prev = link.prev;
            if self.start == Some(id) {
                self.start = Some(link.next);
            }
            if self.current == Some(id) {
                self.current = Some(link.prev);
            }
        }

        self.links[id.0] = Link {
            next: id,
            prev: id,
            linked: false,
        };
        self.len -= 1;
        if !self.players[id.0].neutral {
            self.non_neutral -= 1;
        }
        true
    }

    /// Removes every dead player still in the ring and returns them.
    pub fn update(&mut self) -> Vec<PlayerId> {
        let dead: Vec<PlayerId> = self
            .get_players()
            .into_iter()
            .filter(|id| self.players[id.0].dead)
            .collect();
        for id in &dead {
            self.remove_node(*id);
        }
        dead
    }

    pub fn next_turn(&mut self) -> Option<PlayerId> {
        let current = self.current?;
        let next = self.links[current.0].next;
        self.current = Some(next);
        Some(next)
    }

    pub fn prev_turn(&mut self) -> Option<PlayerId> {
        let current = self.current?;
        let prev = self.links[current.0].prev;
        self.current = Some(prev);
        Some(prev)
    }

    pub fn current(&self) -> Option<PlayerId> {
        self.current
    }

    /// Ring order starting from the structural start node.
    pub fn get_players(&self) -> Vec<PlayerId> {
        let mut out = Vec::with_capacity(self.len);
        let Some(start) = self.start else {
            return out;
        };
        let mut cursor = start;
        loop {
            out.push(cursor);
            cursor = self.links[cursor.0].next;
            if cursor == start || out.len() > self.len {
                break;
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn non_neutral_count(&self) -> usize {
        self.non_neutral
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.links.get(id.0).map(|link| link.linked).unwrap_or(false)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id.0)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id.0)
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.current.and_then(|id| self.players.get(id.0))
    }

    /// Every player ever inserted, linked or not, in insertion order.
    pub fn all_players(&self) -> impl Iterator<Item = (PlayerId, &Player)> {
        self.players
            .iter()
            .enumerate()
            .map(|(idx, player)| (PlayerId(idx), player))
    }

    pub fn all_players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    pub fn find_by_name(&self, name: &str) -> Option<PlayerId> {
        self.players
            .iter()
            .position(|player| player.name == name)
            .map(PlayerId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_chain(names: &[&str]) -> (PlayerChain, Vec<PlayerId>) {
        let mut chain = PlayerChain::new();
        let ids = names
            .iter()
            .map(|name| chain.insert(Player::new(name)))
            .collect();
        (chain, ids)
    }

    fn assert_ring_consistent(chain: &PlayerChain) {
        let order = chain.get_players();
        assert_eq!(order.len(), chain.len());
        for (idx, id) in order.iter().enumerate() {
            let link = chain.links[id.0];
            assert!(link.linked);
            assert_eq!(link.next, order[(idx + 1) % order.len()]);
            assert_eq!(link.prev, order[(idx + order.len() - 1) % order.len()]);
        }
        if let Some(current) = chain.current() {
            assert!(chain.contains(current));
        }
    }

    #[test]
    fn insert_keeps_ring_order_and_wraps() {
        let (mut chain, ids) = make_chain(&["a", "b", "c"]);
        assert_eq!(chain.get_players(), ids);
        assert_eq!(chain.current(), Some(ids[0]));
        assert_eq!(chain.next_turn(), Some(ids[1]));
        assert_eq!(chain.next_turn(), Some(ids[2]));
        assert_eq!(chain.next_turn(), Some(ids[0]));
        assert_eq!(chain.prev_turn(), Some(ids[2]));
        assert_ring_consistent(&chain);
    }

    #[test]
    fn removing_current_moves_to_predecessor() {
        let (mut chain, ids) = make_chain(&["a", "b", "c"]);
        chain.next_turn();
        assert!(chain.remove_node(ids[1]));
        assert_eq!(chain.current(), Some(ids[0]));
        assert_eq!(chain.next_turn(), Some(ids[2]));
        assert_ring_consistent(&chain);
        assert!(!chain.remove_node(ids[1]));
    }

    #[test]
    fn removing_start_moves_start_forward() {
        let (mut chain, ids) = make_chain(&["a", "b", "c"]);
        chain.next_turn();
        chain.remove_node(ids[0]);
        assert_eq!(chain.get_players(), vec![ids[1], ids[2]]);
        assert_eq!(chain.current(), Some(ids[1]));
        assert_ring_consistent(&chain);
    }

    #[test]
    fn update_sweeps_all_dead_players() {
        let (mut chain, ids) = make_chain(&["a", "b", "c", "d"]);
        chain.next_turn();
        chain.player_mut(ids[1]).expect("b").dead = true;
        chain.player_mut(ids[0]).expect("a").dead = true;

        let removed = chain.update();
        assert_eq!(removed, vec![ids[0], ids[1]]);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.non_neutral_count(), 2);
        assert_eq!(chain.current(), Some(ids[3]));
        assert_eq!(chain.next_turn(), Some(ids[2]));
        assert_ring_consistent(&chain);
        assert!(chain.player(ids[0]).is_some());
    }

    #[test]
    fn removing_sole_node_leaves_empty_ring() {
        let (mut chain, ids) = make_chain(&["a"]);
        assert!(chain.remove_node(ids[0]));
        assert!(chain.is_empty());
        assert_eq!(chain.current(), None);
        assert_eq!(chain.next_turn(), None);
        assert_eq!(chain.prev_turn(), None);
        assert!(chain.get_players().is_empty());

        let again = chain.insert(Player::new("z"));
        assert_eq!(chain.current(), Some(again));
        assert_eq!(chain.next_turn(), Some(again));
        assert_ring_consistent(&chain);
    }

    #[test]
    fn neutral_players_are_not_counted_as_active() {
        let mut chain = PlayerChain::new();
        chain.insert(Player::new("a"));
        let neutral = chain.insert(Player::neutral("n"));
        chain.insert(Player::new("b"));
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.non_neutral_count(), 2);
        chain.remove_node(neutral);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.non_neutral_count(), 2);
    }
}
