//! Session lifecycle and access control service.
//!
//! Email/password authentication, renewable short-lived sessions delivered
//! as HTTP-only cookies, edge route guarding, and logout fan-out so every
//! open tab of a client drops its authenticated view at once.

pub mod cli;
pub mod pordisto;
