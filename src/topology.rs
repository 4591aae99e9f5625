//! Parses profile-state names into a typed key and sorts a sub-model's state list into the
//! canonical bake order: `start`, then per repeat-unit (ascending lexicographic unit id) the
//! dummy boundary states plus the profile triples, then `end`.

use std::collections::BTreeMap;

use crate::submodel::SubModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ProfileKind {
	Delete,
	Match,
	Insert,
}

/// Parses a single profile-state name of the form `<I|M|D><index>_<unit_id>`.
///
/// Returns `None` on a malformed name rather than panicking: not every `SubModel` fed through
/// bake follows the profile naming scheme (a caller is free to build a generic, non-repeat state
/// machine directly via `Model::add_state`/`add_transition`, e.g. in tests). Such states are not
/// part of any repeat unit and are kept, unordered relative to the unit buckets, in the trailing
/// "miscellaneous" group (see `sort_canonical`).
fn try_parse_profile_key(name: &str) -> Option<(ProfileKind, u32, String)> {
	let mut chars = name.chars();
	let kind = match chars.next() {
		Some('I') => ProfileKind::Insert,
		Some('M') => ProfileKind::Match,
		Some('D') => ProfileKind::Delete,
		_ => return None,
	};
	let rest = chars.as_str();
	let underscore = rest.find('_')?;
	let index: u32 = rest[..underscore].parse().ok()?;
	let unit_id = rest[underscore + 1..].to_owned();
	Some((kind, index, unit_id))
}

#[derive(Default)]
struct UnitBucket {
	dummy_start: Vec<crate::state::StateId>,
	dummy_end: Vec<crate::state::StateId>,
	inserts: Vec<(u32, crate::state::StateId)>,
	matches: Vec<(u32, crate::state::StateId)>,
	deletes: Vec<(u32, crate::state::StateId)>,
}

/// Sorts `sub_model`'s state list into the canonical bake order described above. A sub-model that
/// is only `start`/`end` (no profile states) is left untouched.
pub fn sort_canonical(sub_model: &mut SubModel) {
	let states = sub_model.states().to_vec();
	if states.len() <= 2 {
		return;
	}
	let start = sub_model.start().clone();
	let end = sub_model.end().clone();

	let mut by_unit: BTreeMap<String, UnitBucket> = BTreeMap::new();
	let mut misc = Vec::new();
	for s in &states {
		if *s == start || *s == end {
			continue;
		}
		let name = s.name();
		if let Some(pos) = name.find("_start_") {
			let unit_id = name[pos + "_start_".len()..].to_owned();
			by_unit.entry(unit_id).or_default().dummy_start.push(s.clone());
			continue;
		}
		if let Some(pos) = name.find("_end_") {
			let unit_id = name[pos + "_end_".len()..].to_owned();
			by_unit.entry(unit_id).or_default().dummy_end.push(s.clone());
			continue;
		}
		match try_parse_profile_key(name) {
			Some((kind, index, unit_id)) => {
				let bucket = by_unit.entry(unit_id).or_default();
				match kind {
					ProfileKind::Insert => bucket.inserts.push((index, s.clone())),
					ProfileKind::Match => bucket.matches.push((index, s.clone())),
					ProfileKind::Delete => bucket.deletes.push((index, s.clone())),
				}
			}
			None => misc.push(s.clone()),
		}
	}

	let mut ordered = Vec::with_capacity(states.len());
	ordered.push(start);
	for (_unit_id, mut bucket) in by_unit {
		ordered.extend(bucket.dummy_start.drain(..));

		bucket.inserts.sort_by_key(|(i, _)| *i);
		bucket.matches.sort_by_key(|(i, _)| *i);
		bucket.deletes.sort_by_key(|(i, _)| *i);

		if let Some(pos) = bucket.inserts.iter().position(|(i, _)| *i == 0) {
			let (_, leading) = bucket.inserts.remove(pos);
			ordered.push(leading);
		}

		let mut remainder: Vec<(u32, u8, crate::state::StateId)> = Vec::new();
		remainder.extend(bucket.deletes.into_iter().map(|(i, s)| (i, 0, s)));
		remainder.extend(bucket.matches.into_iter().map(|(i, s)| (i, 1, s)));
		remainder.extend(bucket.inserts.into_iter().map(|(i, s)| (i, 2, s)));
		remainder.sort_by_key(|(i, rank, _)| (*i, *rank));
		ordered.extend(remainder.into_iter().map(|(_, _, s)| s));

		ordered.extend(bucket.dummy_end.drain(..));
	}
	ordered.extend(misc);
	ordered.push(end);

	sub_model.replace_states_order(ordered);
}

/// Alternative mode: sort every non-`start`/`end` state by its raw name, lexicographically.
pub fn sort_by_name(sub_model: &mut SubModel) {
	let start = sub_model.start().clone();
	let end = sub_model.end().clone();
	let mut rest: Vec<_> = sub_model.states().iter().filter(|s| **s != start && **s != end).cloned().collect();
	rest.sort_by(|a, b| a.name().cmp(b.name()));
	let mut ordered = Vec::with_capacity(rest.len() + 2);
	ordered.push(start);
	ordered.extend(rest);
	ordered.push(end);
	sub_model.replace_states_order(ordered);
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::state::State;

	fn repeat_submodel_two_units() -> SubModel {
		let mut sm = SubModel::new();
		for unit in ["1", "2"] {
			sm.add_state(State::silent(format!("unit_start_{unit}")));
			sm.add_state(State::emitting_sparse(format!("I0_{unit}"), [(b'A', 1.0)]));
			sm.add_state(State::emitting_sparse(format!("M0_{unit}"), [(b'A', 1.0)]));
			sm.add_state(State::silent(format!("D0_{unit}")));
			sm.add_state(State::emitting_sparse(format!("I1_{unit}"), [(b'A', 1.0)]));
			sm.add_state(State::silent(format!("unit_end_{unit}")));
		}
		sm
	}

	#[test]
	fn canonical_sort_orders_dummy_then_i0_then_triples_per_unit() {
		let mut sm = repeat_submodel_two_units();
		sort_canonical(&mut sm);
		let names: Vec<&str> = sm.states().iter().map(|s| s.name()).collect();
		assert_eq!(
			names,
			vec![
				"start",
				"unit_start_1", "I0_1", "D0_1", "M0_1", "I1_1", "unit_end_1",
				"unit_start_2", "I0_2", "D0_2", "M0_2", "I1_2", "unit_end_2",
				"end",
			]
		);
	}

	#[test]
	fn sort_by_name_is_purely_lexicographic() {
		let mut sm = repeat_submodel_two_units();
		sort_by_name(&mut sm);
		let names: Vec<&str> = sm.states().iter().map(|s| s.name()).collect();
		assert_eq!(names.first().copied(), Some("start"));
		assert_eq!(names.last().copied(), Some("end"));
		let mut middle = names[1..names.len() - 1].to_vec();
		let mut sorted_middle = middle.clone();
		sorted_middle.sort();
		assert_eq!(middle, sorted_middle);
		middle.sort();
	}

	#[test]
	fn two_state_submodel_is_left_alone() {
		let mut sm = SubModel::new();
		sort_canonical(&mut sm);
		assert_eq!(sm.states().len(), 2);
	}

	#[test]
	fn non_profile_named_states_survive_as_misc_instead_of_panicking() {
		use crate::state::State;
		let mut sm = SubModel::new();
		let a = sm.add_state(State::emitting_sparse("A", [(b'x', 1.0)]));
		let b = sm.add_state(State::emitting_sparse("B", [(b'y', 1.0)]));
		sort_canonical(&mut sm);
		let names: Vec<&str> = sm.states().iter().map(|s| s.name()).collect();
		assert_eq!(names, vec!["start", "A", "B", "end"]);
		let _ = (a, b);
	}
}
