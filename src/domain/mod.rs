// Domain layer: grading model, the mark table value type and the store port.

pub mod model;
pub mod ports;
pub mod table;
