//! The Forward engine (C5): `log P(seq | model)` via a two-column rolling linear-domain buffer.

use crate::error::DecodeError;
use crate::model::Model;

/// Computes `log P(seq | model)` per §4.4. Numerically naive on purpose (linear-domain sums, a
/// single `ln` at the very end). The crate's log-domain Viterbi (`viterbi`/`subseq_viterbi`) is
/// the recommended path for sequences long enough that this would underflow.
#[tracing::instrument(skip(model, seq), fields(len = seq.len()))]
pub(crate) fn log_probability(model: &Model, seq: &[u8]) -> Result<f64, DecodeError> {
	if !model.is_baked() {
		return Err(DecodeError::NotBaked);
	}
	if seq.is_empty() {
		return Err(DecodeError::EmptySequence);
	}

	let total = model.states().len();
	let n = total.saturating_sub(2);
	let t_len = seq.len();
	let adjacency = model.adjacency();
	let states = model.states();

	if n == 0 {
		return Ok(f64::NEG_INFINITY);
	}

	let mut alpha = [vec![0.0_f64; n], vec![0.0_f64; n]];

	// t = 0: alpha[n] = transitions[start][states[n]] * states[n].distribution[seq[0]]
	for edge in &adjacency[0] {
		if edge.target == 0 || edge.target == total - 1 {
			continue;
		}
		let n_idx = edge.target - 1;
		alpha[0][n_idx] = edge.prob * states[edge.target].emission(seq[0]);
	}

	for t in 1..t_len {
		let cur = t % 2;
		let prev = 1 - cur;
		alpha[cur].iter_mut().for_each(|v| *v = 0.0);
		for n_prime in 0..n {
			let a = alpha[prev][n_prime];
			if a == 0.0 {
				continue;
			}
			let global_src = n_prime + 1;
			for edge in &adjacency[global_src] {
				if edge.target == 0 || edge.target == total - 1 {
					continue;
				}
				alpha[cur][edge.target - 1] += a * edge.prob;
			}
		}
		for n_idx in 0..n {
			let global = n_idx + 1;
			alpha[cur][n_idx] *= states[global].emission(seq[t]);
		}
	}

	let last = (t_len - 1) % 2;
	let mut total_prob = 0.0_f64;
	for n_idx in 0..n {
		let global_src = n_idx + 1;
		let a = alpha[last][n_idx];
		if a == 0.0 {
			continue;
		}
		for edge in &adjacency[global_src] {
			if edge.target == total - 1 {
				total_prob += a * edge.prob;
			}
		}
	}

	tracing::debug!(total_prob, "forward termination sum");
	Ok(total_prob.ln())
}

#[cfg(test)]
mod test {
	use crate::model::Model;
	use crate::state::State;

	#[test]
	fn empty_sequence_is_rejected() {
		let mut model = Model::new(None);
		model.bake(None, false);
		assert_eq!(model.log_probability(b"").unwrap_err(), crate::error::DecodeError::EmptySequence);
	}

	#[test]
	fn not_baked_is_rejected() {
		let model = Model::new(None);
		assert_eq!(model.log_probability(b"x").unwrap_err(), crate::error::DecodeError::NotBaked);
	}

	#[test]
	fn two_state_emitter_scenario_2() {
		let mut model = Model::new(None);
		let a = model.add_state(State::emitting_sparse("A", [(b'x', 1.0)]));
		let b = model.add_state(State::emitting_sparse("B", [(b'y', 1.0)]));
		let start = model.sub_models()[0].start().clone();
		let end = model.sub_models()[0].end().clone();
		model.add_transition(&start, &a, 1.0).unwrap();
		model.add_transition(&a, &b, 1.0).unwrap();
		model.add_transition(&b, &end, 1.0).unwrap();
		model.bake(None, false);
		let logp = model.log_probability(b"xy").unwrap();
		assert!(logp.abs() < 1e-12, "expected 0.0, got {logp}");
	}

	#[test]
	fn diamond_forward_exceeds_viterbi_scenario_3() {
		// start -> (A or B, each 0.5) -> end, both A and B emit 'x' with p=1.
		let mut model = Model::new(None);
		let a = model.add_state(State::emitting_sparse("A", [(b'x', 1.0)]));
		let b = model.add_state(State::emitting_sparse("B", [(b'x', 1.0)]));
		let start = model.sub_models()[0].start().clone();
		let end = model.sub_models()[0].end().clone();
		model.add_transition(&start, &a, 0.5).unwrap();
		model.add_transition(&start, &b, 0.5).unwrap();
		model.add_transition(&a, &end, 1.0).unwrap();
		model.add_transition(&b, &end, 1.0).unwrap();
		model.bake(None, false);
		let forward = model.log_probability(b"x").unwrap();
		let (viterbi, _path) = model.viterbi(b"x").unwrap();
		assert!(viterbi < forward - 1e-9, "viterbi ({viterbi}) should be strictly less than forward ({forward})");
		assert!((forward - (2.0_f64 * 0.5).ln()).abs() < 1e-9);
		assert!((viterbi - 0.5_f64.ln()).abs() < 1e-9);
	}
}
