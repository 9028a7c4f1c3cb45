//! dpflow flow legalizer
//!
//! Removes overlap among single-height standard cells by treating row
//! intervals as bins and pushing excess cell area along min-displacement
//! augmenting paths.
//!
//! This crate handles:
//! - Bin construction around multi-height blockages
//! - Cell-to-bin assignment, including cells split between two bins
//! - Path search and flow execution under a growing displacement bound
//! - Bin merging when flow stalls
//! - Writing segment membership and final positions back to the database

pub mod assignment;
pub mod bin;
pub mod blockage;
pub mod builder;
pub mod config;
pub mod connect;
pub mod error;
pub mod flow;
pub mod legalizer;
pub mod merge;
pub mod overlap;
pub mod reconcile;
pub mod search;
pub mod stats;

pub use assignment::{Assignment, CellBinMap};
pub use bin::{Bin, BinGraph, BinId};
pub use config::FlowLegalizerConfig;
pub use error::{LegalizationInvariantError, LegalizerError, Result};
pub use legalizer::{FlowLegalizer, LegalizationReport, RegionReport};
pub use stats::CellWidthStats;
