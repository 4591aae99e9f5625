//! The full Viterbi engine (C6): best-path log-domain decoding over the entire baked state space,
//! with the domain-specific double-pass relaxation over the repeat band.

use crate::error::DecodeError;
use crate::model::Model;
use crate::path::Path;
use crate::state::State;
use std::rc::Rc;

const STRICT_IMPROVEMENT_TOLERANCE: f64 = 1e-10;

/// Back-pointer for one `(state, column)` cell: the predecessor cell it was relaxed from.
#[derive(Clone, Copy, Debug)]
struct BackPointer {
	row: usize,
	col: usize,
}

struct Tables {
	total: usize,
	cols: usize,
	delta: Vec<f64>,
	back: Vec<Option<BackPointer>>,
}

impl Tables {
	fn new(total: usize, cols: usize) -> Self {
		Self { total, cols, delta: vec![f64::NEG_INFINITY; total * cols], back: vec![None; total * cols] }
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

/// Relaxes every edge out of cell `(i, t)`, translating `t_len` (the sequence length) so that a
/// non-silent edge is only followed when column `t + 1` actually exists (`t < t_len`); this is
/// what makes the same relaxation rule correct both for the `t = 0..T-1` sweep and for the final
/// silent-only closing column `t = T`.
fn relax_cell(model: &Model, seq: &[u8], tables: &mut Tables, i: usize, t: usize, t_len: usize) {
	let v = tables.get(i, t);
	if v == f64::NEG_INFINITY {
		return;
	}
	let state = &model.states()[i];
	let silent = state.is_silent();
	for edge in &model.adjacency()[i] {
		let j = edge.target;
		let (candidate, target_col) = if silent {
			(v + edge.log_prob, t)
		} else {
			if t >= t_len {
				continue;
			}
			(v + edge.log_prob + state.log_emission(seq[t]), t + 1)
		};
		if candidate - tables.get(j, target_col) > STRICT_IMPROVEMENT_TOLERANCE {
			tables.set(j, target_col, candidate, BackPointer { row: i, col: t });
		}
	}
}

fn relax_range(model: &Model, seq: &[u8], tables: &mut Tables, lo: usize, hi: usize, t: usize, t_len: usize) {
	if lo > hi {
		return;
	}
	for i in lo..=hi {
		relax_cell(model, seq, tables, i, t, t_len);
	}
}

fn traceback(model: &Model, tables: &Tables, end_row: usize, end_col: usize) -> Path {
	if tables.get(end_row, end_col) == f64::NEG_INFINITY {
		return Path::empty();
	}
	let mut steps: Vec<(usize, Rc<State>)> = Vec::new();
	let mut cur = (end_row, end_col);
	loop {
		steps.push((cur.0, model.states()[cur.0].clone()));
		if cur == (0, 0) {
			break;
		}
		let Some(back) = tables.back_of(cur.0, cur.1) else { break };
		cur = (back.row, back.col);
	}
	steps.reverse();
	Path::new(steps)
}

#[tracing::instrument(skip(model, seq), fields(len = seq.len()))]
pub(crate) fn run(model: &Model, seq: &[u8]) -> Result<(f64, Path), DecodeError> {
	if !model.is_baked() {
		return Err(DecodeError::NotBaked);
	}
	if seq.is_empty() {
		return Err(DecodeError::EmptySequence);
	}

	let total = model.states().len();
	let t_len = seq.len();
	if let Some(hint) = model.read_length_hint() {
		if hint != t_len {
			tracing::trace!(hint, actual = t_len, "decoding a sequence length different from bake's read_length hint");
		}
	}
	let mut tables = Tables::new(total, t_len + 1);
	tables.set(0, 0, 0.0, BackPointer { row: 0, col: 0 });
	// the root's own back-pointer is never followed (traceback stops at (0, 0)), but `set` always
	// wants a predecessor, so it points at itself.

	let (repeat_start, repeat_end) = model.repeat_band();
	let passes = model.repeat_relaxation_passes().get();

	for t in 0..t_len {
		relax_range(model, seq, &mut tables, 0, repeat_start.saturating_sub(1), t, t_len);
		for _ in 0..passes {
			relax_range(model, seq, &mut tables, repeat_start, repeat_end, t, t_len);
		}
		relax_range(model, seq, &mut tables, repeat_end + 1, total - 1, t, t_len);
		tracing::trace!(column = t, "viterbi column swept");
	}

	// Final, silent-only closing column: the distilled source only relaxes from `states[n-2]`
	// into `end`, not from every state that can reach `end` via a silent chain. Preserved
	// literally (see the crate's design notes on this specific narrowing).
	if total >= 2 {
		relax_cell(model, seq, &mut tables, total - 2, t_len, t_len);
	}

	let end_row = total - 1;
	let logp = tables.get(end_row, t_len);
	let path = traceback(model, &tables, end_row, t_len);
	tracing::debug!(logp, path_len = path.len(), "viterbi traceback complete");
	Ok((logp, path))
}
