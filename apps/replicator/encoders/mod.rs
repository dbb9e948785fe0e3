pub mod angle;
pub mod curve;
pub mod snapshot;
pub mod yieldbasis;
