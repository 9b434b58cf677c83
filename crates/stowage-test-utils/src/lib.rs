//! Test utilities for stowage.
//!
//! Scripted stand-ins for every collaborator the cache talks to. Each mock
//! is a cheap handle over shared state: hand one clone to the cache and
//! keep another in the test to script outcomes, advance transfers and
//! inspect recorded calls.
//!
//! # Example
//!
//! ```rust
//! use stowage::{BundleDescriptor, Manifest, ResourceCache};
//! use stowage_test_utils::{DownloadScript, ScriptedDownloads, ScriptedMounter};
//!
//! let mut manifest = Manifest::new().with_base_url("https://cdn.test");
//! manifest.add_bundle(BundleDescriptor::new("ui", "1", 100, 0), ["ui/title.txt"]);
//!
//! let downloads = ScriptedDownloads::new();
//! downloads.script("https://cdn.test/ui_1", DownloadScript::succeed_after(2));
//!
//! let mut cache = ResourceCache::new()
//!     .with_resolver(manifest)
//!     .with_download_transport(downloads.clone())
//!     .with_mounter(ScriptedMounter::new());
//!
//! let bundle = cache.load_bundle_async("ui/title.txt", None).unwrap();
//! while !cache.is_done(bundle) {
//!     downloads.advance();
//!     cache.tick();
//! }
//! assert_eq!(downloads.begin_count(), 1);
//! ```
//!
//! # Design
//!
//! The cache drives its collaborators through `&mut self`, but tests need
//! to reach the same state from outside. State therefore lives behind
//! `Arc<parking_lot::Mutex<_>>` and every clone sees the same transfers.

pub mod downloads;
pub mod mounter;
pub mod reader;
pub mod web;

pub use downloads::{DownloadScript, ScriptedDownloads};
pub use mounter::{MountCall, MountScript, ScriptedMounter};
pub use reader::CountingReader;
pub use web::{ScriptedWeb, WebScript};

