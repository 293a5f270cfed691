//! Records mirrored from backend tables, with their insert and patch
//! payloads. One module per product area.

pub mod budget;
pub mod chat;
pub mod desk;
pub mod files;
pub mod knowledge;
pub mod tasks;
pub mod time;
