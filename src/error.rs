use thiserror::Error;

/// Errors surfaced by the decoding core. Kept small and matchable on purpose: callers are expected
/// to branch on the variant, not just print it.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum DecodeError {
	#[error("unknown state: {name}")]
	UnknownState { name: String },

	#[error("model has not been baked")]
	NotBaked,

	#[error("input sequence is empty")]
	EmptySequence,

	#[error("unknown repeat unit: {unit_id}")]
	UnknownUnit { unit_id: String },
}
