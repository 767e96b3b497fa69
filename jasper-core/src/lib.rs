//! Jasper core library
//!
//! Publish queue and index synchronization for markdown notes. Notes are
//! queued with [`selection::SelectionTracker`], priced with
//! [`probe::CostProbe`], published through the external `arkb` / `bsky`
//! tools by the orchestrators in [`publish`], and recorded in small JSON
//! indexes owned by [`index`].

pub mod config;
pub mod credentials;
pub mod error;
pub mod index;
pub mod note;
pub mod notify;
pub mod probe;
pub mod publish;
pub mod runner;
pub mod selection;
pub mod status;

pub use config::{ArweaveSettings, AtprotoSettings, JasperConfig};
pub use error::{PublishError, PublishErrorKind};
pub use notify::Notifier;
pub use status::PublicationStatus;
