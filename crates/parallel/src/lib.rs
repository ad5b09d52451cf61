//! # limnosat parallel
//!
//! Dispatch of independent units of work (scenes, match-up records) over a
//! worker pool.
//!
//! This crate provides:
//! - `ProcessingMode`: sequential, all cores, or a fixed-size pool
//! - `ParallelStrategy`: order-preserving map over a slice of work items
//! - `map_isolated`: the same map with each unit's panic caught and turned
//!   into a per-unit failure

pub mod isolate;
pub mod strategy;

pub use isolate::{map_isolated, Panicked};
pub use strategy::{num_cpus, ParallelError, ParallelStrategy, ProcessingMode};
