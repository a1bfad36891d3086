pub mod scans;
pub mod stats;
