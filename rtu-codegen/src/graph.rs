//! The state and transition graph: a prefix trie over command byte
//! sequences, built by merging equal sibling matchers and rejecting
//! sibling matchers whose predicates overlap without being equal.

use rtu_ir::{Matcher, Mode, Predicate};

use crate::error::BuildError;
use crate::operation::Operation;

/// What a terminal state does once reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// Invoke the wrapped operation.
    Operation(Operation),
    /// The `NOTHING` sentinel — a reachable terminal with no callback.
    NoOperation,
}

/// One outbound edge: the matcher guarding it, the state it leads to,
/// and whether it consumes the final pre-CRC byte (in which case its
/// target is the `__CRC` collecting state).
#[derive(Debug, Clone)]
pub struct Transition {
    matcher: Matcher,
    next: usize,
    set_crc: bool,
}

impl Transition {
    /// The guarding matcher.
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// The index of the state this transition leads to.
    #[must_use]
    pub fn next(&self) -> usize {
        self.next
    }

    /// Whether this transition's target is the CRC-collecting state.
    #[must_use]
    pub fn set_crc(&self) -> bool {
        self.set_crc
    }
}

/// One state in the automaton: a name, its byte position, the mode it
/// was built for, its outbound transitions, and — if it's a terminal —
/// the action to take.
#[derive(Debug, Clone)]
pub struct State {
    name: String,
    position: u32,
    mode: Mode,
    transitions: Vec<Transition>,
    terminal: Option<Terminal>,
}

impl State {
    /// The state's unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes consumed to reach this state.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    /// The mode this state was built for.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Outbound transitions, in insertion order.
    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// The terminal action, if this is a terminal state.
    #[must_use]
    pub fn terminal(&self) -> Option<&Terminal> {
        self.terminal.as_ref()
    }
}

/// The automaton under construction: an arena of states, indexed by
/// position (the initial `DEVICE_ADDRESS` state is always index 0).
#[derive(Debug, Clone)]
pub struct Graph {
    states: Vec<State>,
    mode: Mode,
}

impl Graph {
    /// A fresh graph with just the initial `DEVICE_ADDRESS` state.
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Graph {
            states: vec![State {
                name: "DEVICE_ADDRESS".to_string(),
                position: 0,
                mode,
                transitions: Vec::new(),
                terminal: None,
            }],
            mode,
        }
    }

    /// The index of the initial state.
    #[must_use]
    pub fn root(&self) -> usize {
        0
    }

    /// All states, in creation order (index order).
    #[must_use]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// The state at `index`.
    #[must_use]
    pub fn state(&self, index: usize) -> &State {
        &self.states[index]
    }

    /// Inserts a transition on `matcher` out of `from`, merging with an
    /// existing structurally-equal sibling if present.
    ///
    /// `name_hint` suggests the new state's name (the matcher's alias,
    /// or a positional fallback); collisions are resolved by appending
    /// `_1`, `_2`, … until unique.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ConflictingTransitions`] if `matcher`'s
    /// predicate overlaps an existing sibling's without being
    /// structurally equal to it.
    pub fn insert_transition(
        &mut self,
        from: usize,
        matcher: Matcher,
        name_hint: &str,
    ) -> Result<usize, BuildError> {
        let name = self.fresh_name(&self.states[from].name.clone(), name_hint);
        self.insert_transition_impl(from, matcher, name, false)
    }

    /// Like [`Graph::insert_transition`], but the new state always gets
    /// exactly `name` rather than a generated one. Used for per-device
    /// states, which are named `DEVICE_<addr>` / `DEVICE` rather than
    /// `DEVICE_ADDRESS_<hint>`. The caller is responsible for ensuring
    /// `name` is actually unique (the builder tracks declared device
    /// addresses itself).
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ConflictingTransitions`] on an overlapping,
    /// non-equal sibling matcher.
    pub fn insert_transition_named(
        &mut self,
        from: usize,
        matcher: Matcher,
        name: impl Into<String>,
    ) -> Result<usize, BuildError> {
        self.insert_transition_impl(from, matcher, name.into(), false)
    }

    fn insert_transition_impl(
        &mut self,
        from: usize,
        matcher: Matcher,
        name: String,
        set_crc: bool,
    ) -> Result<usize, BuildError> {
        if let Some(existing) = self.states[from]
            .transitions
            .iter()
            .find(|t| t.matcher == matcher)
        {
            return Ok(existing.next);
        }

        for transition in &self.states[from].transitions {
            if predicates_overlap(&matcher, &transition.matcher) {
                return Err(BuildError::ConflictingTransitions {
                    state: self.states[from].name.clone(),
                    matcher: matcher.to_string(),
                });
            }
        }

        let position = self.states[from].position + u32::from(matcher.size());
        let mode = self.mode;

        let new_index = self.states.len();
        self.states.push(State {
            name,
            position,
            mode,
            transitions: Vec::new(),
            terminal: None,
        });

        self.states[from].transitions.push(Transition {
            matcher,
            next: new_index,
            set_crc,
        });

        Ok(new_index)
    }

    /// Inserts the transition guarded by a command's *last* data
    /// matcher, whose target is always named `<from.name>__CRC` and
    /// whose transition carries `set_crc = true`: the current state's
    /// last data matcher always leads into a dedicated `__CRC` state.
    ///
    /// Subject to the same merge-if-equal and overlap-conflict rules as
    /// [`Graph::insert_transition`].
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ConflictingTransitions`] on an overlapping,
    /// non-equal sibling matcher.
    pub fn insert_crc_entry(&mut self, from: usize, matcher: Matcher) -> Result<usize, BuildError> {
        let name = format!("{}__CRC", self.states[from].name);
        self.insert_transition_impl(from, matcher, name, true)
    }

    /// Returns the index of the existing state named `name`, or creates
    /// a fresh terminal state with that exact name and `terminal`
    /// attached. Several `NOTHING` commands share one
    /// `RDY_TO_CALL__NOTHING` terminal this way.
    pub fn get_or_create_terminal(&mut self, name: &str, terminal: Terminal) -> usize {
        if let Some(index) = self.states.iter().position(|s| s.name == name) {
            return index;
        }
        let index = self.states.len();
        self.states.push(State {
            name: name.to_string(),
            position: 0,
            mode: self.mode,
            transitions: Vec::new(),
            terminal: Some(terminal),
        });
        index
    }

    /// Appends the `CrcTail` transition from the `__CRC` state `from`
    /// into the already-resolved terminal `to`.
    pub fn add_crc_acceptance(&mut self, from: usize, to: usize) {
        if self.states[from]
            .transitions
            .iter()
            .any(|t| t.next == to && t.matcher.family() == Matcher::crc_tail().family())
        {
            return;
        }
        self.states[from].transitions.push(Transition {
            matcher: Matcher::crc_tail(),
            next: to,
            set_crc: false,
        });
    }

    fn fresh_name(&self, parent: &str, hint: &str) -> String {
        let base = format!("{parent}_{hint}");
        if !self.name_taken(&base) {
            return base;
        }
        let mut suffix = 1;
        loop {
            let candidate = format!("{base}_{suffix}");
            if !self.name_taken(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    fn name_taken(&self, name: &str) -> bool {
        self.states.iter().any(|s| s.name == name)
    }
}

/// Whether two matchers' predicates could both accept some common byte
/// value, while the matchers themselves are not structurally equal.
/// Matchers of different families never overlap (they guard different
/// kinds of bytes).
fn predicates_overlap(a: &Matcher, b: &Matcher) -> bool {
    if a.family() != b.family() {
        return false;
    }

    match (a.predicate(), b.predicate()) {
        (Predicate::Any, _) | (_, Predicate::Any) => true,
        (Predicate::Exact(x), Predicate::Exact(y)) => x == y,
        (Predicate::Exact(x), Predicate::Range { from, to })
        | (Predicate::Range { from, to }, Predicate::Exact(x)) => x >= from && x < to,
        (Predicate::Exact(x), Predicate::OneOf(values))
        | (Predicate::OneOf(values), Predicate::Exact(x)) => values.contains(x),
        (Predicate::Range { from: f1, to: t1 }, Predicate::Range { from: f2, to: t2 }) => {
            f1 < t2 && f2 < t1
        }
        (Predicate::Range { from, to }, Predicate::OneOf(values))
        | (Predicate::OneOf(values), Predicate::Range { from, to }) => {
            values.iter().any(|v| v >= from && v < to)
        }
        (Predicate::OneOf(a), Predicate::OneOf(b)) => a.iter().any(|v| b.contains(v)),
    }
}
