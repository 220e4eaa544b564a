//! sculpt-api-core: values, port types and parameter schemas (core, engine-agnostic)

pub mod coercion;
pub mod json;
pub mod param;
pub mod port;
pub mod value;

pub use param::{ParamError, ParamMeta};
pub use port::PortType;
pub use value::{Value, ValueKind};
