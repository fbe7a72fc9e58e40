//! Pantry ingestion core
//!
//! This library turns noisy AI extraction results (receipts, single items, cooked
//! dishes) into reviewed pantry stock and meal log entries: it submits images as
//! background analysis jobs, normalizes quantities, keeps a review queue of drafts,
//! commits them in bounded parallel batches, and suggests replenishment after
//! home-cooked meals.

pub mod config;
pub mod models;
pub mod services;
