//! Model Input Boundary
//!
//! Data model for layers received from the external training framework, plus
//! the adapter that normalizes a serialized model dump into an ordered
//! sequence of [`LayerDescriptor`]s.

pub mod adapter;
pub mod descriptor;
pub mod tensor;

pub use adapter::{load_model, parse_model, ModelDump};
pub use descriptor::{ChannelOrder, LayerDescriptor, LayerKind};
pub use tensor::Tensor;
