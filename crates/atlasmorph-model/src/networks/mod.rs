//! Reference sub-networks and the traits the deformation engine consumes.
//!
//! Any module implementing [`LatentEncoder`] or [`MomentumDecoder`] can be
//! plugged into [`crate::deformation::DeformationEngine`]; the MLPs here are
//! the defaults used by [`crate::model::DiffeoVae`].

pub mod decoder;
pub mod encoder;
pub mod permutation;
pub mod variational;

pub use decoder::{MlpDecoder, MlpDecoderConfig, MomentumDecoder};
pub use encoder::{LatentEncoder, MlpEncoder, MlpEncoderConfig};
pub use permutation::PermutationPooling;
pub use variational::{reparametrize, VariationalHead, VariationalHeadConfig};
