use std::cmp::Reverse;

use super::types::ChainEvent;
use crate::config::LiveOrdering;

/// 有上限的事件列表，最新的在前。
#[derive(Debug, Clone)]
pub struct FeedBuffer {
    entries: Vec<ChainEvent>,
    max_entries: usize,
    ordering: LiveOrdering,
}

impl FeedBuffer {
    pub fn new(max_entries: usize, ordering: LiveOrdering) -> Self {
        Self {
            entries: Vec::with_capacity(max_entries),
            max_entries,
            ordering,
        }
    }

    pub fn entries(&self) -> &[ChainEvent] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 用历史查询结果整体替换。
    pub fn replace(&mut self, mut events: Vec<ChainEvent>) {
        events.sort_by_key(|event| Reverse(event.position()));
        events.dedup_by_key(|event| event.key());
        events.truncate(self.max_entries);
        self.entries = events;
    }

    /// 插入一条实时事件；重复或因超出上限被挤出时返回 `false`。
    pub fn insert(&mut self, event: ChainEvent) -> bool {
        if self.entries.iter().any(|entry| entry.key() == event.key()) {
            return false;
        }
        let index = match self.ordering {
            LiveOrdering::Prepend => 0,
            LiveOrdering::Sorted => self
                .entries
                .partition_point(|entry| entry.position() > event.position()),
        };
        if index >= self.max_entries {
            return false;
        }
        self.entries.insert(index, event);
        self.entries.truncate(self.max_entries);
        true
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, B256, I256, U256};

    use super::*;
    use crate::feed::types::{EventPayload, SwapFields};

    fn event(block: u64, index: u64) -> ChainEvent {
        ChainEvent {
            block_number: block,
            log_index: index,
            transaction_hash: B256::left_padding_from(&block.to_be_bytes()),
            payload: EventPayload::Swap(SwapFields {
                sender: Address::ZERO,
                recipient: Address::ZERO,
                amount0: I256::ZERO,
                amount1: I256::ZERO,
                sqrt_price_x96: U256::ZERO,
                liquidity: 0,
                tick: 0,
            }),
        }
    }

    fn positions(buffer: &FeedBuffer) -> Vec<(u64, u64)> {
        buffer.entries().iter().map(ChainEvent::position).collect()
    }

    #[test]
    fn replace_sorts_newest_first_and_caps() {
        let mut buffer = FeedBuffer::new(3, LiveOrdering::Sorted);
        buffer.replace(vec![event(1, 0), event(5, 1), event(5, 0), event(3, 2), event(2, 0)]);
        assert_eq!(positions(&buffer), vec![(5, 1), (5, 0), (3, 2)]);
    }

    #[test]
    fn sorted_insert_keeps_order_and_drops_duplicates() {
        let mut buffer = FeedBuffer::new(10, LiveOrdering::Sorted);
        buffer.replace(vec![event(10, 0), event(4, 0)]);

        assert!(buffer.insert(event(7, 3)));
        assert!(!buffer.insert(event(7, 3)));
        assert!(buffer.insert(event(12, 0)));
        assert_eq!(positions(&buffer), vec![(12, 0), (10, 0), (7, 3), (4, 0)]);
    }

    #[test]
    fn sorted_insert_older_than_full_buffer_is_ignored() {
        let mut buffer = FeedBuffer::new(2, LiveOrdering::Sorted);
        buffer.replace(vec![event(10, 0), event(9, 0)]);
        assert!(!buffer.insert(event(1, 0)));
        assert!(buffer.insert(event(11, 0)));
        assert_eq!(positions(&buffer), vec![(11, 0), (10, 0)]);
    }

    #[test]
    fn prepend_places_arrivals_first() {
        let mut buffer = FeedBuffer::new(10, LiveOrdering::Prepend);
        buffer.replace(vec![event(10, 0)]);
        assert!(buffer.insert(event(8, 0)));
        assert_eq!(positions(&buffer), vec![(8, 0), (10, 0)]);
    }
}
