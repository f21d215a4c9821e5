pub mod aggregate;
pub mod engine;
pub mod features;
pub mod logging;
pub mod manipulation;
pub mod motifs;
pub mod outcome;
pub mod record;
pub mod state;
pub mod storage;
