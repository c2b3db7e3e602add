//! # phototag-batch
//!
//! Batch keyword tagger for folders of JPEG images. Each image is sent to the
//! PhotoTag.ai keyword service, the generated title, description and keywords
//! are embedded into its EXIF data, and the file is moved into a `ready` or
//! `failed` subfolder.
//!
//! ## Quick Start
//!
//! The simplest way to use the library is [`pipeline::run_batch`], which
//! handles the full read → tag → write → move flow for a folder:
//!
//! ```rust,no_run
//! use phototag_batch::config::Config;
//! use phototag_batch::pipeline::run_batch;
//! use phototag_batch::tagging::PhotoTagClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load config from file (contains the API token)
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     config.validate()?;
//!
//!     let client = PhotoTagClient::new(&config.service);
//!
//!     let report = run_batch("./photos".as_ref(), &client, &config.output, |outcome, progress| {
//!         println!(
//!             "[{}%] {} → {}",
//!             progress.percent,
//!             outcome.file_name(),
//!             outcome.destination.as_str()
//!         );
//!     })
//!     .await?;
//!
//!     println!("{} ready, {} failed", report.ready_count(), report.failed_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! For more control, you can call the EXIF reader, tagging client, and writer individually:
//!
//! ```rust,no_run
//! use phototag_batch::config::ServiceConfig;
//! use phototag_batch::exif::{read_existing, write_tags};
//! use phototag_batch::tagging::{PhotoTagClient, TaggingService};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let path = Path::new("photo.jpg");
//!
//!     // 1. Read existing title/description as a context hint
//!     let existing = read_existing(path);
//!
//!     // 2. Tag with the remote service
//!     let mut service = ServiceConfig::default();
//!     service.api_token = "pt-...".into();
//!     let client = PhotoTagClient::new(&service);
//!     let bytes = std::fs::read(path)?;
//!     let tags = client.tag(bytes, "photo.jpg", &existing.context()).await?;
//!
//!     // 3. Write metadata back in place
//!     if tags.is_complete() {
//!         write_tags(path, &tags)?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration types and loading/saving
//! - [`error`]: Per-stage failure types
//! - [`exif`]: EXIF title/description reading and title/description/keyword writing
//! - [`pipeline`]: Folder listing, per-image processing and the batch loop
//! - [`tagging`]: Tagging service trait and the PhotoTag.ai client

pub mod config;
pub mod error;
pub mod exif;
pub mod pipeline;
pub mod tagging;
