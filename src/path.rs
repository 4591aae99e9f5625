use std::rc::Rc;

use crate::state::State;

/// A decoded Viterbi path: an ordered sequence of `(global_index, state)` steps. For the full
/// Viterbi engine this runs from `(0, start)` to `(|states| - 1, end)`; for the sub-sequence
/// engine it runs from `unit_start_<id>`'s global index to `unit_end_<id>`'s.
#[derive(Debug, Clone, Default)]
pub struct Path(Vec<(usize, Rc<State>)>);

impl Path {
	pub(crate) fn new(steps: Vec<(usize, Rc<State>)>) -> Self {
		Self(steps)
	}

	pub fn empty() -> Self {
		Self(Vec::new())
	}

	pub fn steps(&self) -> &[(usize, Rc<State>)] {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// The state names visited, in traversal order; convenient for tests and diagnostics.
	pub fn state_names(&self) -> Vec<&str> {
		self.0.iter().map(|(_, s)| s.name()).collect()
	}
}

impl IntoIterator for Path {
	type Item = (usize, Rc<State>);
	type IntoIter = std::vec::IntoIter<(usize, Rc<State>)>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}
