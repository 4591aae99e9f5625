//! Profile-HMM decoding over a suffix/repeat/prefix tandem-repeat topology: state topology
//! assembly ("baking"), the Forward algorithm, full Viterbi decoding with banded multi-pass
//! relaxation over the repeat unit, and a sub-sequence Viterbi restricted to one repeat unit.

#[macro_use(debug)]
extern crate tracing;

pub mod error;
pub mod forward;
pub mod matrix;
pub mod model;
pub mod path;
pub mod state;
pub mod subseq_viterbi;
pub mod submodel;
pub mod topology;
pub mod viterbi;

pub use error::DecodeError;
pub use matrix::Matrix;
pub use model::{Model, SanityIssue};
pub use path::Path;
pub use state::State;
pub use submodel::SubModel;
