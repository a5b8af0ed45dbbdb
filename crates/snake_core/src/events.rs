//! Change propagation: low-level mutations fan out into semantic update channels.
//!
//! The rebroadcast rules are a static edge table. [`PropagationGraph`] ranks
//! the events topologically once, and [`Broadcaster`] delivers the closure of
//! every batch of source events in that rank order, so broad events always
//! arrive after the specific ones that caused them.

use std::collections::BTreeSet;

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UpdateEvent {
    /// The set of image layers changed.
    LayerChanged,
    SnakeTypeChanged,
    ThresholdSettingsModified,
    EdgeSettingsModified,
    ThresholdPreviewModified,
    EdgePreviewModified,
    GmmPreviewModified,
    ThresholdSettingsUpdate,
    EdgePreprocessingSettingsUpdate,
    GmmModified,
    ActiveBubbleUpdate,
    BubbleListUpdate,
    BubbleDefaultRadiusUpdate,
    EvolutionIteration,
    ModelUpdate,
    StateMachineChange,
}

impl UpdateEvent {
    pub const ALL: [UpdateEvent; 16] = [
        Self::LayerChanged,
        Self::SnakeTypeChanged,
        Self::ThresholdSettingsModified,
        Self::EdgeSettingsModified,
        Self::ThresholdPreviewModified,
        Self::EdgePreviewModified,
        Self::GmmPreviewModified,
        Self::ThresholdSettingsUpdate,
        Self::EdgePreprocessingSettingsUpdate,
        Self::GmmModified,
        Self::ActiveBubbleUpdate,
        Self::BubbleListUpdate,
        Self::BubbleDefaultRadiusUpdate,
        Self::EvolutionIteration,
        Self::ModelUpdate,
        Self::StateMachineChange,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

use UpdateEvent::*;

/// Rebroadcast rules of the wizard, `(source, derived)`.
pub const WIZARD_EDGES: &[(UpdateEvent, UpdateEvent)] = &[
    (LayerChanged, ModelUpdate),
    (SnakeTypeChanged, ModelUpdate),
    (ThresholdSettingsModified, ThresholdSettingsUpdate),
    (ThresholdPreviewModified, ThresholdSettingsUpdate),
    (EdgeSettingsModified, EdgePreprocessingSettingsUpdate),
    (EdgePreviewModified, EdgePreprocessingSettingsUpdate),
    (GmmPreviewModified, GmmModified),
    (ThresholdSettingsUpdate, ModelUpdate),
    (EdgePreprocessingSettingsUpdate, ModelUpdate),
    (GmmModified, ModelUpdate),
    (ModelUpdate, StateMachineChange),
    (ActiveBubbleUpdate, StateMachineChange),
    (BubbleListUpdate, StateMachineChange),
    (BubbleDefaultRadiusUpdate, StateMachineChange),
];

const N: usize = UpdateEvent::ALL.len();

#[derive(Debug, Clone)]
pub struct PropagationGraph {
    successors: [Vec<UpdateEvent>; N],
    rank: [usize; N],
}

impl PropagationGraph {
    /// Ranks the events of `edges`; returns the offending event if the table has a cycle.
    pub fn from_edges(edges: &[(UpdateEvent, UpdateEvent)]) -> Result<Self, UpdateEvent> {
        let mut successors: [Vec<UpdateEvent>; N] = Default::default();
        let mut indegree = [0usize; N];
        for &(from, to) in edges {
            successors[from.index()].push(to);
            indegree[to.index()] += 1;
        }

        // Kahn's algorithm, seeded in declaration order for a stable ranking.
        let mut rank = [usize::MAX; N];
        let mut ready: Vec<UpdateEvent> = UpdateEvent::ALL
            .iter()
            .rev()
            .copied()
            .filter(|e| indegree[e.index()] == 0)
            .collect();
        let mut next = 0;
        while let Some(event) = ready.pop() {
            rank[event.index()] = next;
            next += 1;
            for &succ in successors[event.index()].iter().rev() {
                indegree[succ.index()] -= 1;
                if indegree[succ.index()] == 0 {
                    ready.push(succ);
                }
            }
        }
        if let Some(stuck) = UpdateEvent::ALL
            .iter()
            .copied()
            .find(|e| rank[e.index()] == usize::MAX)
        {
            return Err(stuck);
        }

        Ok(Self { successors, rank })
    }

    /// Graph of [`WIZARD_EDGES`].
    pub fn wizard() -> Self {
        match Self::from_edges(WIZARD_EDGES) {
            Ok(graph) => graph,
            Err(event) => unreachable!("wizard edge table is cyclic at {event:?}"),
        }
    }

    pub fn rank(&self, event: UpdateEvent) -> usize {
        self.rank[event.index()]
    }

    /// Every event reachable from `sources` (sources included), in rank order.
    pub fn closure(&self, sources: impl IntoIterator<Item = UpdateEvent>) -> Vec<UpdateEvent> {
        let mut seen = [false; N];
        let mut stack: Vec<UpdateEvent> = sources.into_iter().collect();
        let mut reached = BTreeSet::new();
        while let Some(event) = stack.pop() {
            if std::mem::replace(&mut seen[event.index()], true) {
                continue;
            }
            reached.insert((self.rank(event), event));
            stack.extend(self.successors[event.index()].iter().copied());
        }
        reached.into_iter().map(|(_, e)| e).collect()
    }
}

/// Presentation-side listener for semantic updates.
pub trait UpdateObserver {
    fn on_update(&mut self, event: UpdateEvent);
}

impl<F: FnMut(UpdateEvent)> UpdateObserver for F {
    fn on_update(&mut self, event: UpdateEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(usize);

/// Queues source events during an operation and flushes their closure afterwards.
pub struct Broadcaster {
    graph: PropagationGraph,
    pending: Vec<UpdateEvent>,
    observers: Vec<(ObserverId, Box<dyn UpdateObserver>)>,
    next_id: usize,
    last_batch: Vec<UpdateEvent>,
}

impl Broadcaster {
    pub fn new(graph: PropagationGraph) -> Self {
        Self {
            graph,
            pending: Vec::new(),
            observers: Vec::new(),
            next_id: 0,
            last_batch: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn UpdateObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    pub fn emit(&mut self, event: UpdateEvent) {
        self.pending.push(event);
    }

    /// Delivers the closure of all pending events; returns what was delivered.
    pub fn flush(&mut self) -> &[UpdateEvent] {
        if self.pending.is_empty() {
            self.last_batch.clear();
            return &self.last_batch;
        }
        let batch = self.graph.closure(self.pending.drain(..));
        trace!(?batch, "broadcasting updates");
        for &event in &batch {
            for (_, observer) in &mut self.observers {
                observer.on_update(event);
            }
        }
        self.last_batch = batch;
        &self.last_batch
    }

    /// Events delivered by the most recent flush.
    pub fn last_batch(&self) -> &[UpdateEvent] {
        &self.last_batch
    }
}
