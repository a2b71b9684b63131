// handlers/mod.rs - HTTP handlers grouped by resource
//
// Access policy is not decided here: each route carries its guard as a
// route layer (see app.rs). Handlers that need the caller still resolve it
// from RequestIdentity.

pub mod auth;     // /api/auth/*
pub mod health;   // /healthz, /api/healthz
pub mod reports;  // /api/reports/*
pub mod tickets;  // /api/tickets/*
pub mod users;    // /api/users/*

mod util;
