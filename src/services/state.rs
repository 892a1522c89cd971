//! Service lifecycle states, the shared state snapshot, and watch filters.

use std::collections::{HashMap, HashSet, hash_map};

/// Lifecycle state of a single service.
///
/// The allowed transitions are enforced by the manager driving the service,
/// not by the type itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Init,
    Idle,
    Run,
    Stop,
    Exit,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Init => "init",
            State::Idle => "idle",
            State::Run => "run",
            State::Stop => "stop",
            State::Exit => "exit",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a watcher wants to be told about a target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    /// Notify when the service is now in the target state.
    Entering,
    /// Notify when the service is present but no longer in the target state.
    Exiting,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::Entering => "entering",
            ServiceAction::Exiting => "exiting",
        }
    }
}

impl std::fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of every registered service's current state.
///
/// Always delivered by value: watchers receive their own copy, never a shared
/// reference into the aggregator's map. Every service registered with the
/// daemon has an entry, and entries never disappear while it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStates(HashMap<String, State>);

impl ServiceStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, state: State) {
        self.0.insert(name.into(), state);
    }

    pub fn get(&self, name: &str) -> Option<State> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, State)> {
        self.0.iter().map(|(name, state)| (name.as_str(), *state))
    }
}

impl FromIterator<(String, State)> for ServiceStates {
    fn from_iter<I: IntoIterator<Item = (String, State)>>(iter: I) -> Self {
        Self(HashMap::from_iter(iter))
    }
}

impl IntoIterator for ServiceStates {
    type Item = (String, State);
    type IntoIter = hash_map::IntoIter<String, State>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// How a [`ServiceFilter`] treats its name set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// No filtering; deliver the full snapshot.
    #[default]
    None,
    /// Retain only the named services.
    Include,
    /// Retain all but the named services.
    Exclude,
}

/// Snapshot filter for [`watch_all_states`](crate::ServiceContext::watch_all_states).
#[derive(Debug, Clone, Default)]
pub struct ServiceFilter {
    pub mode: FilterMode,
    pub names: HashSet<String>,
}

impl ServiceFilter {
    /// Pass-through filter: every snapshot is delivered unchanged.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn include<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: FilterMode::Include,
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exclude<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: FilterMode::Exclude,
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Applies the filter to a snapshot, producing the delivered subset.
    ///
    /// An empty name set behaves like [`FilterMode::None`] regardless of mode.
    pub fn apply(&self, states: &ServiceStates) -> ServiceStates {
        if self.names.is_empty() || self.mode == FilterMode::None {
            return states.clone();
        }

        states
            .iter()
            .filter(|(name, _)| match self.mode {
                FilterMode::Include => self.names.contains(*name),
                FilterMode::Exclude => !self.names.contains(*name),
                FilterMode::None => true,
            })
            .map(|(name, state)| (name.to_string(), state))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ServiceStates {
        ServiceStates::from_iter([
            ("api".to_string(), State::Run),
            ("poller".to_string(), State::Idle),
            ("janitor".to_string(), State::Stop),
        ])
    }

    #[test]
    fn filter_none_passes_snapshot_unchanged() {
        let states = snapshot();
        assert_eq!(ServiceFilter::none().apply(&states), states);
        // Empty names behaves like None regardless of mode.
        assert_eq!(ServiceFilter::include(Vec::<String>::new()).apply(&states), states);
    }

    #[test]
    fn filter_include_retains_named() {
        let filtered = ServiceFilter::include(["api"]).apply(&snapshot());
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get("api"), Some(State::Run));
    }

    #[test]
    fn filter_exclude_drops_named() {
        let filtered = ServiceFilter::exclude(["api"]).apply(&snapshot());
        assert_eq!(filtered.len(), 2);
        assert!(!filtered.contains("api"));
    }

    #[test]
    fn states_display_lowercase() {
        assert_eq!(State::Init.to_string(), "init");
        assert_eq!(State::Exit.to_string(), "exit");
        assert_eq!(ServiceAction::Entering.to_string(), "entering");
    }
}
