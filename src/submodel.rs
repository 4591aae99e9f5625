use std::collections::HashMap;
use std::rc::Rc;

use crate::error::DecodeError;
use crate::state::State;
use crate::state::StateId;

/// A sub-model before baking: a bare `start`/`end` pair plus whatever states and transitions the
/// caller adds. Several of these get concatenated into a [`crate::model::Model`] (suffix, repeat,
/// prefix) before the whole thing is baked into a flat decodable graph.
#[derive(Clone)]
pub struct SubModel {
	start: StateId,
	end: StateId,
	states: Vec<StateId>,
	transitions: HashMap<StateId, HashMap<StateId, f64>>,
}

impl SubModel {
	pub fn new() -> Self {
		let start = StateId::new(State::silent("start"));
		let end = StateId::new(State::silent("end"));
		let mut transitions = HashMap::new();
		transitions.insert(start.clone(), HashMap::new());
		transitions.insert(end.clone(), HashMap::new());
		Self { states: vec![start.clone(), end.clone()], start, end, transitions }
	}

	pub fn start(&self) -> &StateId {
		&self.start
	}

	pub fn end(&self) -> &StateId {
		&self.end
	}

	pub fn states(&self) -> &[StateId] {
		&self.states
	}

	pub fn transitions(&self) -> &HashMap<StateId, HashMap<StateId, f64>> {
		&self.transitions
	}

	pub fn add_state(&mut self, state: Rc<State>) -> StateId {
		let id = StateId::new(state);
		self.states.push(id.clone());
		self.transitions.entry(id.clone()).or_default();
		id
	}

	pub fn add_states(&mut self, states: impl IntoIterator<Item = Rc<State>>) -> Vec<StateId> {
		states.into_iter().map(|s| self.add_state(s)).collect()
	}

	/// Replaces the state ordering used when this sub-model is baked into a flat index range.
	/// Used by [`crate::topology`]; the set of states must be unchanged, only their order.
	pub(crate) fn replace_states_order(&mut self, states: Vec<StateId>) {
		debug_assert_eq!(states.len(), self.states.len(), "topology sort must not add or drop states");
		self.states = states;
	}

	/// Unchecked transition write, used internally by [`crate::model::Model::concatenate`] to
	/// stitch a previous sub-model's `end` to the next sub-model's `start` without requiring both
	/// to already live in the same `states` list.
	pub(crate) fn set_transition(&mut self, from: &StateId, to: &StateId, probability: f64) {
		self.transitions.entry(from.clone()).or_default().insert(to.clone(), probability);
	}

	/// Checked transition write: both endpoints must already have been added via [`SubModel::add_state`]
	/// (or be this sub-model's own `start`/`end`).
	pub fn add_transition(&mut self, from: &StateId, to: &StateId, probability: f64) -> Result<(), DecodeError> {
		if !self.states.contains(from) {
			return Err(DecodeError::UnknownState { name: from.name().to_owned() });
		}
		if !self.states.contains(to) {
			return Err(DecodeError::UnknownState { name: to.name().to_owned() });
		}
		self.set_transition(from, to, probability);
		Ok(())
	}
}

impl Default for SubModel {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn fresh_submodel_has_only_start_and_end() {
		let sm = SubModel::new();
		assert_eq!(sm.states().len(), 2);
		assert_eq!(sm.start().name(), "start");
		assert_eq!(sm.end().name(), "end");
	}

	#[test]
	fn add_transition_rejects_unknown_states() {
		let mut sm = SubModel::new();
		let stray = StateId::new(State::silent("nowhere"));
		let err = sm.add_transition(&stray, sm.end(), 1.0).unwrap_err();
		assert_eq!(err, DecodeError::UnknownState { name: "nowhere".to_owned() });
	}

	#[test]
	fn add_transition_between_known_states_succeeds() {
		let mut sm = SubModel::new();
		let m = sm.add_state(State::emitting_sparse("M0_1", [(b'A', 1.0)]));
		sm.add_transition(sm.start(), &m, 1.0).unwrap();
		sm.add_transition(&m, sm.end(), 1.0).unwrap();
		assert_eq!(sm.transitions()[sm.start()][&m], 1.0);
		assert_eq!(sm.transitions()[&m][sm.end()], 1.0);
	}

	#[test]
	fn set_transition_can_target_a_foreign_state() {
		let mut a = SubModel::new();
		let b = SubModel::new();
		a.set_transition(a.end(), b.start(), 0.5);
		assert_eq!(a.transitions()[a.end()][b.start()], 0.5);
	}
}
