//! Formguard - Abuse Prevention for Contact Forms
//!
//! This crate gates submissions to a public write endpoint. An authoritative
//! server-side limiter enforces sliding-window caps, cooldowns, escalating
//! temporary bans and a permanent blocklist per caller identity, while a
//! client-side mirror runs the same engine against local state for instant
//! feedback.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
