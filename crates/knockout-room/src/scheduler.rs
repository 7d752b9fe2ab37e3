//! Round-robin turn order for turn-based rooms.

use knockout_protocol::ClientId;

/// Invariant violations in the turn order. These mean the room called the
/// scheduler at the wrong time, so they're logged loudly rather than shown
/// to players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("turn order is empty")]
    EmptyOrder,

    #[error("no turn has been taken yet")]
    NoCurrentTurn,
}

/// Ordered roster plus a cursor on whoever holds the turn.
///
/// ```text
/// order:  [ C-4, C-1, C-7 ]
/// cursor:         ^ (Some(1))
/// ```
///
/// `cursor == None` means nobody has had a turn yet; the next
/// [`advance`](Self::advance) lands on index 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnScheduler {
    order: Vec<ClientId>,
    cursor: Option<usize>,
}

impl TurnScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the order and forgets the current turn.
    pub fn set_order(&mut self, order: Vec<ClientId>) {
        self.order = order;
        self.cursor = None;
    }

    /// Forgets the current turn but keeps the order, so the next
    /// `advance` starts a fresh pass from the front.
    pub fn rewind(&mut self) {
        self.cursor = None;
    }

    /// Moves to the next holder, wrapping around, and returns it.
    pub fn advance(&mut self) -> Result<ClientId, SchedulerError> {
        if self.order.is_empty() {
            return Err(SchedulerError::EmptyOrder);
        }
        let next = match self.cursor {
            None => 0,
            Some(i) => (i + 1) % self.order.len(),
        };
        self.cursor = Some(next);
        Ok(self.order[next])
    }

    /// Is the current holder the last one in the order?
    pub fn is_last(&self) -> Result<bool, SchedulerError> {
        let cursor = self.cursor.ok_or(SchedulerError::NoCurrentTurn)?;
        Ok(cursor + 1 == self.order.len())
    }

    /// Drops `id` from the order. Returns `true` if `id` held the turn.
    ///
    /// If the holder leaves, the cursor parks on the previous slot so the
    /// next `advance` lands on the holder's successor. The caller has to
    /// move the turn on itself.
    pub fn remove(&mut self, id: ClientId) -> bool {
        let Some(pos) = self.order.iter().position(|c| *c == id) else {
            return false;
        };
        self.order.remove(pos);

        match self.cursor {
            Some(c) if c == pos => {
                self.cursor = pos.checked_sub(1);
                true
            }
            Some(c) if c > pos => {
                self.cursor = Some(c - 1);
                false
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<ClientId> {
        self.cursor.and_then(|i| self.order.get(i).copied())
    }

    pub fn order(&self) -> &[ClientId] {
        &self.order
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.order.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(ids: &[u64]) -> TurnScheduler {
        let mut s = TurnScheduler::new();
        s.set_order(ids.iter().copied().map(ClientId).collect());
        s
    }

    #[test]
    fn test_advance_starts_at_front_and_wraps() {
        let mut s = scheduler(&[4, 1, 7]);
        assert_eq!(s.advance(), Ok(ClientId(4)));
        assert_eq!(s.advance(), Ok(ClientId(1)));
        assert_eq!(s.advance(), Ok(ClientId(7)));
        assert_eq!(s.is_last(), Ok(true));
        assert_eq!(s.advance(), Ok(ClientId(4)));
        assert_eq!(s.is_last(), Ok(false));
    }

    #[test]
    fn test_advance_on_empty_order_errors() {
        let mut s = TurnScheduler::new();
        assert_eq!(s.advance(), Err(SchedulerError::EmptyOrder));
    }

    #[test]
    fn test_is_last_before_first_turn_errors() {
        let s = scheduler(&[1, 2]);
        assert_eq!(s.is_last(), Err(SchedulerError::NoCurrentTurn));
        assert_eq!(s.current(), None);
    }

    #[test]
    fn test_set_order_resets_cursor() {
        let mut s = scheduler(&[1, 2]);
        s.advance().unwrap();
        s.set_order(vec![ClientId(9)]);
        assert_eq!(s.current(), None);
        assert_eq!(s.advance(), Ok(ClientId(9)));
    }

    #[test]
    fn test_remove_holder_next_advance_yields_successor() {
        let mut s = scheduler(&[1, 2, 3]);
        s.advance().unwrap();
        s.advance().unwrap(); // holder: 2
        assert!(s.remove(ClientId(2)));
        assert_eq!(s.current(), Some(ClientId(1)));
        assert_eq!(s.advance(), Ok(ClientId(3)));
        assert!(!s.order().contains(&ClientId(2)));
    }

    #[test]
    fn test_remove_holder_at_front_parks_before_start() {
        let mut s = scheduler(&[1, 2, 3]);
        s.advance().unwrap(); // holder: 1
        assert!(s.remove(ClientId(1)));
        assert_eq!(s.current(), None);
        assert_eq!(s.advance(), Ok(ClientId(2)));
    }

    #[test]
    fn test_remove_before_holder_keeps_holder() {
        let mut s = scheduler(&[1, 2, 3]);
        s.advance().unwrap();
        s.advance().unwrap();
        s.advance().unwrap(); // holder: 3
        assert!(!s.remove(ClientId(1)));
        assert_eq!(s.current(), Some(ClientId(3)));
        assert_eq!(s.is_last(), Ok(true));
    }

    #[test]
    fn test_remove_after_holder_or_unknown_id() {
        let mut s = scheduler(&[1, 2, 3]);
        s.advance().unwrap(); // holder: 1
        assert!(!s.remove(ClientId(3)));
        assert!(!s.remove(ClientId(42)));
        assert_eq!(s.current(), Some(ClientId(1)));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_remove_last_holder_wraps_to_front() {
        let mut s = scheduler(&[1, 2, 3]);
        for _ in 0..3 {
            s.advance().unwrap();
        }
        assert!(s.remove(ClientId(3)));
        assert_eq!(s.is_last(), Ok(true));
        assert_eq!(s.advance(), Ok(ClientId(1)));
    }

    #[test]
    fn test_rewind_restarts_pass_keeping_order() {
        let mut s = scheduler(&[5, 6]);
        s.advance().unwrap();
        s.advance().unwrap();
        s.rewind();
        assert_eq!(s.current(), None);
        assert_eq!(s.len(), 2);
        assert_eq!(s.advance(), Ok(ClientId(5)));
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut s = scheduler(&[1, 2]);
        s.advance().unwrap();
        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.current(), None);
    }
}
