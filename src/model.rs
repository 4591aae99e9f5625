use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::rc::Rc;

use crate::error::DecodeError;
use crate::matrix::Matrix;
use crate::path::Path;
use crate::state::State;
use crate::state::StateId;
use crate::submodel::SubModel;
use crate::topology;

/// One sparse outgoing edge in the baked adjacency list: a destination global index plus both the
/// linear- and log-domain transition probability, so neither Forward nor Viterbi has to take a
/// `ln` inside their hot loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Edge {
	pub target: usize,
	pub prob: f64,
	pub log_prob: f64,
}

/// A state whose outgoing transitions did not sum to (approximately) `1`, as reported by
/// [`Model::check_sanity_of_transition_prob`].
#[derive(Debug, Clone, PartialEq)]
pub struct SanityIssue {
	pub state_name: String,
	pub sub_model_index: usize,
	pub observed_sum: f64,
}

/// The top-level decodable container: an ordered list of sub-models (conventionally
/// `[suffix, repeat, prefix]`), concatenated and baked into one flat indexed state space.
///
/// Before baking, [`Model::add_state`]/[`Model::add_transition`] build up the last sub-model in
/// `sub_models` (a fresh `Model` starts with exactly one, empty one); [`Model::concatenate`] joins
/// in an already fully-built [`SubModel`] (typically the repeat body, itself assembled by
/// concatenating one dense unit sub-model per repeat copy, and the prefix matcher).
pub struct Model {
	name: Option<String>,
	sub_models: Vec<SubModel>,
	start: Option<StateId>,
	end: Option<StateId>,
	states: Vec<Rc<State>>,
	state_to_index: HashMap<StateId, usize>,
	adjacency: Vec<Vec<Edge>>,
	is_baked: bool,
	repeat_relaxation_passes: NonZeroUsize,
	read_length_hint: Option<usize>,
}

impl Model {
	pub fn new(name: Option<String>) -> Self {
		Self {
			name,
			sub_models: vec![SubModel::new()],
			start: None,
			end: None,
			states: Vec::new(),
			state_to_index: HashMap::new(),
			adjacency: Vec::new(),
			is_baked: false,
			repeat_relaxation_passes: NonZeroUsize::new(2).unwrap(),
			read_length_hint: None,
		}
	}

	pub fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	pub fn is_baked(&self) -> bool {
		self.is_baked
	}

	pub fn add_state(&mut self, state: Rc<State>) -> StateId {
		self.is_baked = false;
		self.sub_models.last_mut().expect("Model always owns at least one sub-model").add_state(state)
	}

	pub fn add_states(&mut self, states: impl IntoIterator<Item = Rc<State>>) -> Vec<StateId> {
		states.into_iter().map(|s| self.add_state(s)).collect()
	}

	pub fn add_transition(&mut self, from: &StateId, to: &StateId, probability: f64) -> Result<(), DecodeError> {
		self.sub_models.last_mut().expect("Model always owns at least one sub-model").add_transition(from, to, probability)?;
		self.is_baked = false;
		Ok(())
	}

	/// Exposes the configurable pass count for the repeat band's double relaxation (§9 of the
	/// spec this crate implements: "Double-pass count on repeat band"). Default is `2`.
	pub fn set_repeat_relaxation_passes(&mut self, passes: NonZeroUsize) {
		self.repeat_relaxation_passes = passes;
	}

	pub fn repeat_relaxation_passes(&self) -> NonZeroUsize {
		self.repeat_relaxation_passes
	}

	/// Appends an already-built sub-model, wiring `prev.end -> other.start` with
	/// `transition_probability`, and un-bakes the model (P8: concatenation invalidates any prior
	/// bake).
	pub fn concatenate(&mut self, other: SubModel, transition_probability: f64) {
		let prev_end = self.sub_models.last().expect("Model always owns at least one sub-model").end().clone();
		let other_start = other.start().clone();
		self.sub_models
			.last_mut()
			.expect("Model always owns at least one sub-model")
			.set_transition(&prev_end, &other_start, transition_probability);
		self.sub_models.push(other);
		self.is_baked = false;
	}

	/// Assembles the flat, decodable state space: sorts each sub-model's states into canonical
	/// (or name-sorted) order, assigns global indices, and flattens every sub-model's nested
	/// transition map into a sparse adjacency list keyed by global index.
	#[tracing::instrument(skip(self), fields(sub_models = self.sub_models.len()))]
	pub fn bake(&mut self, read_length: Option<usize>, sort_by_name: bool) {
		for sub_model in &mut self.sub_models {
			if sort_by_name {
				topology::sort_by_name(sub_model);
			} else {
				topology::sort_canonical(sub_model);
			}
		}

		self.start = Some(self.sub_models.first().expect("at least one sub-model").start().clone());
		self.end = Some(self.sub_models.last().expect("at least one sub-model").end().clone());

		self.states.clear();
		self.state_to_index.clear();
		for sub_model in &self.sub_models {
			for state_id in sub_model.states() {
				let index = self.states.len();
				self.states.push(state_id.as_rc().clone());
				self.state_to_index.insert(state_id.clone(), index);
			}
		}

		let mut adjacency: Vec<Vec<Edge>> = vec![Vec::new(); self.states.len()];
		for sub_model in &self.sub_models {
			for (from, outgoing) in sub_model.transitions() {
				let Some(&from_index) = self.state_to_index.get(from) else { continue };
				for (to, &probability) in outgoing {
					if probability <= 0.0 {
						continue;
					}
					let Some(&to_index) = self.state_to_index.get(to) else { continue };
					adjacency[from_index].push(Edge { target: to_index, prob: probability, log_prob: probability.ln() });
				}
			}
		}
		self.adjacency = adjacency;

		self.read_length_hint = read_length;
		self.is_baked = true;
		debug!(states = self.states.len(), "baked model");
	}

	pub fn start(&self) -> Option<&StateId> {
		self.start.as_ref()
	}

	pub fn end(&self) -> Option<&StateId> {
		self.end.as_ref()
	}

	pub fn states(&self) -> &[Rc<State>] {
		&self.states
	}

	pub fn index_of(&self, state: &StateId) -> Option<usize> {
		self.state_to_index.get(state).copied()
	}

	pub(crate) fn adjacency(&self) -> &[Vec<Edge>] {
		&self.adjacency
	}

	pub(crate) fn sub_models(&self) -> &[SubModel] {
		&self.sub_models
	}

	pub(crate) fn read_length_hint(&self) -> Option<usize> {
		self.read_length_hint
	}

	/// Locates the repeat band (`sub_models[1]`'s index range) used by the Viterbi column sweep
	/// (C6) and by `subseq_viterbi` (C7). Falls back to treating the whole state space as one
	/// band when the model has fewer than two sub-models (e.g. the trivial two-state model of
	/// scenario 1); the fallback is harmless since repeated relaxation passes are idempotent once
	/// no candidate strictly improves.
	pub(crate) fn repeat_band(&self) -> (usize, usize) {
		if self.sub_models.len() >= 2 {
			let repeat = &self.sub_models[1];
			let start = self.state_to_index[repeat.start()];
			let end = self.state_to_index[repeat.end()];
			(start, end)
		} else {
			(0, self.states.len().saturating_sub(1))
		}
	}

	pub fn log_probability(&self, seq: &[u8]) -> Result<f64, DecodeError> {
		crate::forward::log_probability(self, seq)
	}

	pub fn viterbi(&self, seq: &[u8]) -> Result<(f64, Path), DecodeError> {
		crate::viterbi::run(self, seq)
	}

	pub fn subseq_viterbi(&self, seq: &[u8], unit_id: &str) -> Result<(f64, Path), DecodeError> {
		crate::subseq_viterbi::run(self, seq, unit_id)
	}

	pub fn subseq_viterbi_score(&self, seq: &[u8], unit_id: &str) -> Result<f64, DecodeError> {
		crate::subseq_viterbi::score(self, seq, unit_id)
	}

	pub fn dense_transition_matrix(&self) -> Matrix {
		let n = self.states.len();
		let mut matrix = Matrix::zeros(n, n);
		for (from, edges) in self.adjacency.iter().enumerate() {
			for edge in edges {
				matrix.set(from, edge.target, edge.prob);
			}
		}
		matrix
	}

	/// Advisory pre-bake check (C8): for every sub-model and every state, verifies its outgoing
	/// transitions sum to (approximately) `1`. Never mutates the model.
	pub fn check_sanity_of_transition_prob(&self, verbose: bool) -> Vec<SanityIssue> {
		const TOLERANCE: f64 = 1e-4;
		let mut issues = Vec::new();
		for (sub_model_index, sub_model) in self.sub_models.iter().enumerate() {
			for state in sub_model.states() {
				let sum: f64 = sub_model.transitions().get(state).map(|row| row.values().sum()).unwrap_or(0.0);
				if (sum - 1.0).abs() > TOLERANCE {
					if verbose {
						tracing::warn!(
							state = state.name(),
							sub_model_index,
							observed_sum = sum,
							"transition row does not sum to 1"
						);
					}
					issues.push(SanityIssue { state_name: state.name().to_owned(), sub_model_index, observed_sum: sum });
				}
			}
		}
		issues
	}
}

impl Default for Model {
	fn default() -> Self {
		Self::new(None)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::state::State;

	fn two_state_emitter() -> Model {
		let mut model = Model::new(None);
		let a = model.add_state(State::emitting_sparse("A", [(b'x', 1.0)]));
		let b = model.add_state(State::emitting_sparse("B", [(b'y', 1.0)]));
		let start = model.sub_models()[0].start().clone();
		let end = model.sub_models()[0].end().clone();
		model.add_transition(&start, &a, 1.0).unwrap();
		model.add_transition(&a, &b, 1.0).unwrap();
		model.add_transition(&b, &end, 1.0).unwrap();
		model.bake(None, false);
		model
	}

	#[test]
	fn bake_assigns_sentinel_indices_p2() {
		let model = two_state_emitter();
		assert_eq!(model.index_of(model.start().unwrap()), Some(0));
		assert_eq!(model.index_of(model.end().unwrap()), Some(model.states().len() - 1));
	}

	#[test]
	fn bake_is_idempotent_p7() {
		let mut model = two_state_emitter();
		let names_before: Vec<String> = model.states().iter().map(|s| s.name().to_owned()).collect();
		model.bake(None, false);
		let names_after: Vec<String> = model.states().iter().map(|s| s.name().to_owned()).collect();
		assert_eq!(names_before, names_after);
	}

	#[test]
	fn concatenate_unbakes_p8() {
		let mut model = two_state_emitter();
		assert!(model.is_baked());
		let extra = SubModel::new();
		model.concatenate(extra, 1.0);
		assert!(!model.is_baked());
		assert_eq!(model.viterbi(b"xy").unwrap_err(), DecodeError::NotBaked);
	}

	#[test]
	fn scenario_two_state_emitter_log_probability_and_viterbi() {
		let model = two_state_emitter();
		let logp = model.log_probability(b"xy").unwrap();
		assert!(logp.abs() < 1e-12, "expected log 1 = 0, got {logp}");
		let (vp, path) = model.viterbi(b"xy").unwrap();
		assert!(vp.abs() < 1e-12);
		assert_eq!(path.state_names(), vec!["start", "A", "B", "end"]);
	}

	#[test]
	fn dense_transition_matrix_matches_adjacency() {
		let model = two_state_emitter();
		let matrix = model.dense_transition_matrix();
		let start_idx = model.index_of(model.start().unwrap()).unwrap();
		assert_eq!(matrix.rows(), model.states().len());
		assert!(matrix.get(start_idx, start_idx + 1) > 0.99);
	}

	#[test]
	fn sanity_checker_flags_bad_row() {
		let mut model = Model::new(None);
		let a = model.add_state(State::emitting_sparse("A", [(b'x', 0.5)]));
		let start = model.sub_models()[0].start().clone();
		model.add_transition(&start, &a, 0.5).unwrap();
		let issues = model.check_sanity_of_transition_prob(false);
		assert!(issues.iter().any(|i| i.state_name == "start"));
	}
}
