//! # devis
//!
//! HTTP server and command line front end for the devis dashboard.
//!
//! The record engine lives in `devis-core`; this crate adds the network
//! surface, authentication, configuration loading and the CLI.

pub mod api;
pub mod cli;
pub mod config;
