//! Closed-loop reachability analysis for discrete-time plants controlled by
//! feed-forward ReLU networks.
//!
//! Given an initial (or target, for backward analysis) box, a plant's
//! affine dynamics, and a frozen controller, [`analyzer::Analyzer`]
//! computes a sound over-approximation of the reachable tube (or
//! back-projection sequence) by composing a [`propagator::Propagator`]'s
//! output bound with the dynamics at each step, optionally refined by a
//! [`partition::Partitioner`].

pub mod analyzer;
pub mod closed_loop;
pub mod config;
pub mod constraint;
pub mod deadline;
pub mod diagnostics;
pub mod dynamics;
pub mod error;
pub mod network;
pub mod partition;
pub mod plant;
pub mod propagator;
pub mod rng;
