// Domain layer: export data model and the ports the pipeline talks to.

pub mod model;
pub mod ports;
