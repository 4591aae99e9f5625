//! The sub-sequence Viterbi engine (C7): full decoding confined to a single repeat unit's band,
//! entering at its `unit_start_<id>` and leaving at its `unit_end_<id>`.

use std::rc::Rc;

use crate::error::DecodeError;
use crate::model::Model;
use crate::path::Path;
use crate::state::State;

const STRICT_IMPROVEMENT_TOLERANCE: f64 = 1e-10;

#[derive(Clone, Copy, Debug)]
struct BackPointer {
	row: usize,
	col: usize,
}

struct Band {
	/// Global index of the unit's `unit_start_<id>` state; row `0` of every band-local table.
	base: usize,
	/// Number of rows, `B - A + 1`.
	len: usize,
	cols: usize,
	delta: Vec<f64>,
	back: Vec<Option<BackPointer>>,
}

impl Band {
	fn new(base: usize, len: usize, cols: usize) -> Self {
		Self { base, len, cols, delta: vec![f64::NEG_INFINITY; len * cols], back: vec![None; len * cols] }
	}

	#[inline]
	fn idx(&self, row: usize, col: usize) -> usize {
		row * self.cols + col
	}

	fn get(&self, row: usize, col: usize) -> f64 {
		self.delta[self.idx(row, col)]
	}

	fn set(&mut self, row: usize, col: usize, value: f64, from: BackPointer) {
		let i = self.idx(row, col);
		self.delta[i] = value;
		self.back[i] = Some(from);
	}

	fn back_of(&self, row: usize, col: usize) -> Option<BackPointer> {
		self.back[self.idx(row, col)]
	}
}

/// Locates `A = state_to_index[unit_start_<unit_id>]`, `B = state_to_index[unit_end_<unit_id>]`
/// within `sub_models[1]` by exact name match. **UnknownUnit** if either is missing.
fn find_unit_bounds(model: &Model, unit_id: &str) -> Result<(usize, usize), DecodeError> {
	let repeat = model
		.sub_models()
		.get(1)
		.ok_or_else(|| DecodeError::UnknownUnit { unit_id: unit_id.to_owned() })?;
	let start_name = format!("unit_start_{unit_id}");
	let end_name = format!("unit_end_{unit_id}");

	let start_state = repeat.states().iter().find(|s| s.name() == start_name);
	let end_state = repeat.states().iter().find(|s| s.name() == end_name);
	let (Some(start_state), Some(end_state)) = (start_state, end_state) else {
		return Err(DecodeError::UnknownUnit { unit_id: unit_id.to_owned() });
	};

	let a = model.index_of(start_state).ok_or_else(|| DecodeError::UnknownUnit { unit_id: unit_id.to_owned() })?;
	let b = model.index_of(end_state).ok_or_else(|| DecodeError::UnknownUnit { unit_id: unit_id.to_owned() })?;
	Ok((a, b))
}

fn relax_row(model: &Model, seq: &[u8], band: &mut Band, row: usize, t: usize, t_len: usize) {
	let global = band.base + row;
	let v = band.get(row, t);
	if v == f64::NEG_INFINITY {
		return;
	}
	let state = &model.states()[global];
	let silent = state.is_silent();
	for edge in &model.adjacency()[global] {
		let Some(local_target) = edge.target.checked_sub(band.base) else { continue };
		if local_target >= band.len {
			continue;
		}
		let (candidate, target_col) = if silent {
			(v + edge.log_prob, t)
		} else {
			if t >= t_len {
				continue;
			}
			(v + edge.log_prob + state.log_emission(seq[t]), t + 1)
		};
		if candidate - band.get(local_target, target_col) > STRICT_IMPROVEMENT_TOLERANCE {
			band.set(local_target, target_col, candidate, BackPointer { row, col: t });
		}
	}
}

fn traceback(model: &Model, band: &Band) -> Path {
	let last_row = band.len - 1;
	let last_col = band.cols - 1;
	if band.get(last_row, last_col) == f64::NEG_INFINITY {
		return Path::empty();
	}
	let mut steps: Vec<(usize, Rc<State>)> = Vec::new();
	let mut cur = (last_row, last_col);
	loop {
		let global = band.base + cur.0;
		steps.push((global, model.states()[global].clone()));
		if cur == (0, 0) {
			break;
		}
		let Some(back) = band.back_of(cur.0, cur.1) else { break };
		cur = (back.row, back.col);
	}
	steps.reverse();
	Path::new(steps)
}

/// Shared engine behind `subseq_viterbi`/`subseq_viterbi_score`: both run the identical
/// band-restricted decode, they only differ in what they report for `logp` (§4.6, Open
/// Questions).
fn run_banded(model: &Model, seq: &[u8], unit_id: &str) -> Result<(f64, Path), DecodeError> {
	if !model.is_baked() {
		return Err(DecodeError::NotBaked);
	}
	if seq.is_empty() {
		return Err(DecodeError::EmptySequence);
	}
	let (a, b) = find_unit_bounds(model, unit_id)?;
	let len = b - a + 1;
	let t_len = seq.len();
	let mut band = Band::new(a, len, t_len + 1);
	band.set(0, 0, 0.0, BackPointer { row: 0, col: 0 });

	let last_source_row = len.saturating_sub(2);
	for t in 0..=t_len {
		if len >= 2 {
			for row in 0..=last_source_row {
				relax_row(model, seq, &mut band, row, t, t_len);
			}
		}
	}

	let logp = band.get(len - 1, t_len);
	let path = traceback(model, &band);
	Ok((logp, path))
}

pub(crate) fn run(model: &Model, seq: &[u8], unit_id: &str) -> Result<(f64, Path), DecodeError> {
	let (_logp, path) = run_banded(model, seq, unit_id)?;
	// Preserved literally from the distilled spec (§4.6, §9): the log-probability component of
	// `subseq_viterbi` is a meaningless placeholder, not the achieved score. Use
	// `subseq_viterbi_score` for the real value.
	Ok((0.0, path))
}

pub(crate) fn score(model: &Model, seq: &[u8], unit_id: &str) -> Result<f64, DecodeError> {
	let (logp, _path) = run_banded(model, seq, unit_id)?;
	Ok(logp)
}
