//! Command and query handlers.
//!
//! Every command handler follows the same shape: load the aggregate,
//! check the actor is a legitimate party, validate the guard, mutate
//! through the state machine, commit state plus audit entries in one
//! atomic repository call, then best-effort publish an event and
//! dispatch a notification. Publish/notify failures are logged and
//! never fail the command.

pub mod deal;
pub mod escrow;

#[cfg(test)]
pub(crate) mod support;
