pub mod check;
pub mod dump;
pub mod nest;
pub mod stats;
pub mod update;
