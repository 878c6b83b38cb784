pub mod file;
pub mod geography;
pub mod sla;
pub mod workflow;
