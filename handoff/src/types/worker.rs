use serde::Serialize;
use std::fmt;

/// Role played by a pipeline worker.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    /// Worker that generates items and puts them into the channel.
    Producer,
    /// Worker that gets items from the channel, processes and acknowledges them.
    Consumer,
}

impl WorkerKind {
    /// Returns the lowercase name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::Producer => "producer",
            WorkerKind::Consumer => "consumer",
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a worker inside a pipeline, such as `producer-0` or `consumer-3`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WorkerId {
    pub kind: WorkerKind,
    pub index: usize,
}

impl WorkerId {
    /// Creates the identity of the `index`-th producer.
    pub fn producer(index: usize) -> Self {
        Self {
            kind: WorkerKind::Producer,
            index,
        }
    }

    /// Creates the identity of the `index`-th consumer.
    pub fn consumer(index: usize) -> Self {
        Self {
            kind: WorkerKind::Consumer,
            index,
        }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.index)
    }
}
