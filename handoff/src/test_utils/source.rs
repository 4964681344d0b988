use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::HandoffResult;
use crate::source::ItemSource;
use crate::types::WorkerId;

/// Source handing out a fixed list of payloads, shared by every producer.
///
/// Producers stop once the list is exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedSource<T> {
    items: Arc<Mutex<VecDeque<T>>>,
}

impl<T> ScriptedSource<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items.into_iter().collect())),
        }
    }

    /// Returns the number of payloads not handed out yet.
    pub fn remaining(&self) -> usize {
        self.items.lock().len()
    }
}

impl<T> ItemSource for ScriptedSource<T>
where
    T: Send + Sync + 'static,
{
    type Payload = T;

    fn name() -> &'static str {
        "scripted"
    }

    async fn next_item(&self, _producer: WorkerId, _sequence: u64) -> HandoffResult<Option<T>> {
        Ok(self.items.lock().pop_front())
    }
}

/// Payload produced by [`SequenceSource`]: the producer that created it and its sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sequenced {
    pub producer: usize,
    pub sequence: u64,
}

/// Source numbering payloads per producer, used to check ordering guarantees.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceSource;

impl ItemSource for SequenceSource {
    type Payload = Sequenced;

    fn name() -> &'static str {
        "sequence"
    }

    async fn next_item(&self, producer: WorkerId, sequence: u64) -> HandoffResult<Option<Sequenced>> {
        Ok(Some(Sequenced {
            producer: producer.index,
            sequence,
        }))
    }
}
