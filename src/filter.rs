//! Temporal consistency filter (debouncer) over raw action codes.
//!
//! Keeps the last N codes in chronological order, like a rolling frame buffer.
//! Once the window is full, the modal code is committed as the stable action
//! if its share of the window reaches the consistency threshold.

use std::collections::VecDeque;

use tracing::debug;

use crate::pose::ActionCode;

pub struct ConsistencyFilter {
    /// Oldest code at the front.
    history: VecDeque<ActionCode>,
    capacity: usize,
    min_consistency: f64,
    stable: Option<ActionCode>,
}

impl ConsistencyFilter {
    pub fn new(capacity: usize, min_consistency: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity + 1),
            capacity,
            min_consistency,
            stable: None,
        }
    }

    /// Record one raw code. Returns the newly committed stable action, if this
    /// push committed one; otherwise the previous stable action stands.
    pub fn push(&mut self, code: ActionCode) -> Option<ActionCode> {
        self.history.push_back(code);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
        if !self.is_ready() {
            return None;
        }

        let (mode, count) = self.mode();
        let share = count as f64 / self.capacity as f64;
        if share < self.min_consistency {
            return None;
        }
        if self.stable != Some(mode) {
            debug!(action = %mode, share, "stable action changed");
        }
        self.stable = Some(mode);
        Some(mode)
    }

    /// Most frequent code in the window. Ties go to the lowest code value.
    fn mode(&self) -> (ActionCode, usize) {
        let mut counts = [0usize; ActionCode::ALL.len()];
        for code in &self.history {
            counts[code.code() as usize] += 1;
        }
        let mut best = (ActionCode::Unknown, 0);
        for action in ActionCode::ALL {
            let n = counts[action.code() as usize];
            if n > best.1 {
                best = (action, n);
            }
        }
        best
    }

    pub fn is_ready(&self) -> bool {
        self.history.len() == self.capacity
    }

    pub fn stable(&self) -> Option<ActionCode> {
        self.stable
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Forget the window and the stable action.
    pub fn clear(&mut self) {
        self.history.clear();
        self.stable = None;
    }
}

impl Default for ConsistencyFilter {
    fn default() -> Self {
        Self::new(2, 0.7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_until_full() {
        let mut f = ConsistencyFilter::new(3, 0.6);
        assert_eq!(f.push(ActionCode::Standing), None);
        assert_eq!(f.push(ActionCode::Standing), None);
        assert_eq!(f.push(ActionCode::Standing), Some(ActionCode::Standing));
        assert_eq!(f.len(), 3);
    }

    #[test]
    fn test_identical_window_commits() {
        let mut f = ConsistencyFilter::default();
        f.push(ActionCode::JumpingLeft);
        assert_eq!(f.push(ActionCode::JumpingLeft), Some(ActionCode::JumpingLeft));
        assert_eq!(f.stable(), Some(ActionCode::JumpingLeft));
    }

    #[test]
    fn test_split_window_keeps_previous() {
        let mut f = ConsistencyFilter::default();
        f.push(ActionCode::RunningStraight);
        f.push(ActionCode::RunningStraight);
        // 50% share is below 0.7
        assert_eq!(f.push(ActionCode::JumpingForward), None);
        assert_eq!(f.stable(), Some(ActionCode::RunningStraight));
        assert_eq!(f.push(ActionCode::JumpingForward), Some(ActionCode::JumpingForward));
    }

    #[test]
    fn test_history_bounded() {
        let mut f = ConsistencyFilter::new(4, 0.5);
        for _ in 0..50 {
            f.push(ActionCode::RunningLeft);
            assert!(f.len() <= 4);
        }
    }

    #[test]
    fn test_tie_goes_to_lowest_code() {
        let mut f = ConsistencyFilter::new(4, 0.5);
        f.push(ActionCode::JumpingRight);
        f.push(ActionCode::Standing);
        f.push(ActionCode::JumpingRight);
        assert_eq!(f.push(ActionCode::Standing), Some(ActionCode::Standing));
    }

    #[test]
    fn test_clear() {
        let mut f = ConsistencyFilter::default();
        f.push(ActionCode::Standing);
        f.push(ActionCode::Standing);
        f.clear();
        assert!(f.is_empty());
        assert_eq!(f.stable(), None);
    }
}
