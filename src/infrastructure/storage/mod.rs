pub mod cache;
pub mod db;
pub mod memory;
pub mod persister;
