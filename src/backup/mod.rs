//! Asynchronous persistence of delivered messages.

pub mod backupper;

pub use backupper::{BackupHandle, Backupper};
