//! schoolnet - a school intranet JSON API
//!
//! Announcements, resource links, a training-video library, articles,
//! calendar events, notifications and user management, served over axum
//! with session authentication and role-based permissions.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
