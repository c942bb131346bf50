//! Dealdesk - Deal Negotiation and Escrow Backend
//!
//! This crate coordinates commercial deals between advertisers and creators:
//! the deal lifecycle state machine, the versioned terms-negotiation ledger
//! and the escrow/payment controller, backed by an append-only audit log.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
