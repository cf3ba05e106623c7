use markup::NodeId;
use std::collections::HashSet;
use std::hash::Hash;

/// Handle returned by [`ListenerRegistry::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Listener<G, E> {
    id: ListenerId,
    group: G,
    event: E,
    /// Element the listener is bound to; `None` for surface-wide listeners.
    target: Option<NodeId>,
}

/// Explicit bookkeeping of attached event listeners, grouped by owner
/// (a pane, an edit mode). Events are only delivered to attached listeners,
/// and detaching a group removes every listener it registered.
#[derive(Debug, Clone)]
pub struct ListenerRegistry<G, E> {
    next_id: u64,
    listeners: Vec<Listener<G, E>>,
}

impl<G, E> Default for ListenerRegistry<G, E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }
}

impl<G, E> ListenerRegistry<G, E>
where
    G: Copy + Eq + Hash,
    E: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, group: G, event: E) -> ListenerId {
        self.attach_to(group, event, None)
    }

    /// Binds to one element. Element bindings go stale when content is
    /// replaced and must be re-attached.
    pub fn attach_to(&mut self, group: G, event: E, target: Option<NodeId>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            group,
            event,
            target,
        });
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        before != self.listeners.len()
    }

    /// Removes every listener of `group`. Returns how many were removed.
    pub fn detach(&mut self, group: G) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.group != group);
        before - self.listeners.len()
    }

    pub fn detach_all(&mut self) -> usize {
        let count = self.listeners.len();
        self.listeners.clear();
        count
    }

    pub fn is_attached(&self, group: G, event: E) -> bool {
        self.listeners
            .iter()
            .any(|l| l.group == group && l.event == event)
    }

    /// Whether `event` on `target` reaches a listener of `group`, either one
    /// bound to the element or a surface-wide one.
    pub fn handles(&self, group: G, event: E, target: NodeId) -> bool {
        self.listeners.iter().any(|l| {
            l.group == group && l.event == event && l.target.map_or(true, |t| t == target)
        })
    }

    pub fn targets(&self, group: G, event: E) -> Vec<NodeId> {
        self.listeners
            .iter()
            .filter(|l| l.group == group && l.event == event)
            .filter_map(|l| l.target)
            .collect()
    }

    pub fn groups(&self) -> HashSet<G> {
        self.listeners.iter().map(|l| l.group).collect()
    }

    pub fn count(&self, group: G) -> usize {
        self.listeners.iter().filter(|l| l.group == group).count()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
