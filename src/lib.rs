//! Aptitude Interview - automated interviews driven by an LLM provider.
//!
//! A candidate starts an interview, answers a fixed number of generated
//! questions, and receives structured feedback with an optional
//! recommendation of a better-fitting subject.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
