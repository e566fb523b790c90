use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::meta::FormState;
use crate::path::FieldPath;

/// What kind of event produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Register,
    Input,
    Blur,
    SetValue,
    FieldArray,
    Validation,
    Submitting,
    Submitted,
    Reset,
}

/// Delivered once per handled event to every matching subscriber.
#[derive(Debug)]
pub struct Notification<'a> {
    pub kind: ChangeKind,
    pub paths: &'a BTreeSet<FieldPath>,
    pub values: &'a Value,
    pub state: FormState,
}

/// Which changes a subscriber cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Watch {
    All,
    Paths(Vec<FieldPath>),
}

impl Watch {
    fn matches(&self, kind: ChangeKind, changed: &BTreeSet<FieldPath>) -> bool {
        match self {
            Watch::All => true,
            Watch::Paths(watched) => {
                kind == ChangeKind::Reset
                    || changed
                        .iter()
                        .any(|path| watched.iter().any(|watched| watched.overlaps(path)))
            }
        }
    }
}

/// Handle returned by `subscribe`; pass it back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Subscription(u64);

type Callback = Box<dyn FnMut(&Notification<'_>)>;

struct Subscriber {
    id: Subscription,
    watch: Watch,
    callback: Callback,
}

/// Collects changed paths while an event is handled and emits a single
/// notification when the outermost batch closes.
#[derive(Default)]
pub(crate) struct Notifier {
    next_id: u64,
    subscribers: Vec<Subscriber>,
    depth: usize,
    kind: Option<ChangeKind>,
    pending: BTreeSet<FieldPath>,
    state_changed: bool,
}

impl Notifier {
    pub(crate) fn subscribe(&mut self, watch: Watch, callback: Callback) -> Subscription {
        self.next_id += 1;
        let id = Subscription(self.next_id);
        self.subscribers.push(Subscriber {
            id,
            watch,
            callback,
        });
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: Subscription) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        before != self.subscribers.len()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub(crate) fn open(&mut self, kind: ChangeKind) {
        if self.depth == 0 {
            self.kind = Some(kind);
        }
        self.depth += 1;
    }

    /// Returns true when the outermost batch closed with something to report.
    pub(crate) fn close(&mut self) -> bool {
        self.depth = self.depth.saturating_sub(1);
        if self.depth > 0 {
            return false;
        }
        let report = self.state_changed || !self.pending.is_empty();
        if !report {
            self.kind = None;
        }
        report
    }

    pub(crate) fn mark(&mut self, path: &FieldPath) {
        self.pending.insert(path.clone());
    }

    pub(crate) fn mark_state(&mut self) {
        self.state_changed = true;
    }

    pub(crate) fn dispatch(&mut self, values: &Value, state: FormState) {
        let kind = self.kind.take().unwrap_or(ChangeKind::SetValue);
        let paths = std::mem::take(&mut self.pending);
        self.state_changed = false;
        let notification = Notification {
            kind,
            paths: &paths,
            values,
            state,
        };
        for subscriber in &mut self.subscribers {
            if subscriber.watch.matches(kind, &paths) {
                (subscriber.callback)(&notification);
            }
        }
    }
}
