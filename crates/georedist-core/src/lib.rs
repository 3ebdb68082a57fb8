pub mod config;
pub mod logging;

pub mod checksum;
pub mod db;
pub mod downloader;
pub mod error;
pub mod fetch;
pub mod mirror;
pub mod reader;
pub mod updater;

pub use db::{Checksum, DbName, DbPaths};
pub use error::{IntegrityError, UpdateError};
pub use fetch::download_dbs;
pub use reader::{open, DbReader, ReaderHandle};
pub use updater::{AutoUpdater, CheckOutcome, FailureSource, UpdateEvent, UpdaterState};
