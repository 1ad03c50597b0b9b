//! Per-channel usage accounting

use super::events::CHANNEL_COUNT;

/// Usage counters for the 16 output channels
///
/// A channel with zero uses is idle. Counters never go below zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelPool {
    uses: [u32; CHANNEL_COUNT],
}

impl ChannelPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `channel` has no active notes. Out-of-range channels are never available.
    pub fn is_available(&self, channel: u8) -> bool {
        self.uses.get(channel as usize).map_or(false, |&uses| uses == 0)
    }

    /// Lowest-numbered idle channel, if any
    pub fn first_available(&self) -> Option<u8> {
        self.uses
            .iter()
            .position(|&uses| uses == 0)
            .map(|index| index as u8)
    }

    /// Channel with the fewest uses, lowest index on ties
    pub fn least_used(&self) -> u8 {
        let mut least = 0;
        for (index, &uses) in self.uses.iter().enumerate().skip(1) {
            if uses < self.uses[least] {
                least = index;
            }
        }
        least as u8
    }

    pub fn add_use(&mut self, channel: u8) {
        if let Some(uses) = self.uses.get_mut(channel as usize) {
            *uses += 1;
        }
    }

    pub fn remove_use(&mut self, channel: u8) {
        if let Some(uses) = self.uses.get_mut(channel as usize) {
            *uses = uses.saturating_sub(1);
        }
    }

    /// Current use count of `channel` (0 for out-of-range channels)
    pub fn uses(&self, channel: u8) -> u32 {
        self.uses.get(channel as usize).copied().unwrap_or(0)
    }

    /// Copy of all 16 counters
    pub fn snapshot(&self) -> [u32; CHANNEL_COUNT] {
        self.uses
    }

    /// Sum of all counters
    pub fn total(&self) -> u32 {
        self.uses.iter().sum()
    }

    pub fn reset(&mut self) {
        self.uses = [0; CHANNEL_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pool_is_idle() {
        let pool = ChannelPool::new();
        for channel in 0..16 {
            assert!(pool.is_available(channel));
        }
        assert_eq!(pool.first_available(), Some(0));
        assert_eq!(pool.least_used(), 0);
        assert_eq!(pool.total(), 0);
    }

    #[test]
    fn test_first_available_skips_busy_channels() {
        let mut pool = ChannelPool::new();
        pool.add_use(0);
        pool.add_use(1);
        pool.add_use(3);
        assert_eq!(pool.first_available(), Some(2));
        assert!(!pool.is_available(1));
    }

    #[test]
    fn test_first_available_none_when_full() {
        let mut pool = ChannelPool::new();
        for channel in 0..16 {
            pool.add_use(channel);
        }
        assert_eq!(pool.first_available(), None);
    }

    #[test]
    fn test_least_used_breaks_ties_low() {
        let mut pool = ChannelPool::new();
        for channel in 0..16 {
            pool.add_use(channel);
            pool.add_use(channel);
        }
        pool.remove_use(9);
        pool.remove_use(4);
        assert_eq!(pool.least_used(), 4);
    }

    #[test]
    fn test_remove_use_clamps_at_zero() {
        let mut pool = ChannelPool::new();
        pool.remove_use(7);
        assert_eq!(pool.uses(7), 0);
        pool.add_use(7);
        pool.remove_use(7);
        pool.remove_use(7);
        assert_eq!(pool.uses(7), 0);
    }

    #[test]
    fn test_out_of_range_channels_ignored() {
        let mut pool = ChannelPool::new();
        pool.add_use(16);
        pool.remove_use(200);
        assert!(!pool.is_available(16));
        assert_eq!(pool.total(), 0);
    }

    #[test]
    fn test_reset() {
        let mut pool = ChannelPool::new();
        pool.add_use(2);
        pool.add_use(2);
        pool.add_use(11);
        pool.reset();
        assert_eq!(pool.snapshot(), [0; 16]);
    }
}
