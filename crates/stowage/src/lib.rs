//! Stowage - a reference-counted, tick-driven resource cache
//!
//! Stowage loads assets (decoded payloads) and archive bundles (mounted
//! files) on behalf of a frame-driven application:
//!
//! - **Coalescing**: concurrent requests for one key share one instance and one fetch
//! - **Reference counting**: instances are reclaimed once every request has released them
//! - **Tick-driven**: all progress happens in [`ResourceCache::tick`], never in the background
//! - **Pluggable strategies**: local reads, downloads, in-memory web streaming, or your own
//! - **Versioned bundles**: loading a new version of a bundle unmounts the old one
//!
//! # Quick Start
//!
//! ```
//! use stowage::prelude::*;
//!
//! let mut manifest = Manifest::new();
//! manifest.add_asset("config/game.txt");
//!
//! let reader = MemoryReader::new().with("config/game.txt", "difficulty=hard");
//! let mut cache = ResourceCache::new()
//!     .with_resolver(manifest)
//!     .with_reader(reader);
//!
//! // Synchronous load: finished before it returns.
//! let config = cache.load_asset::<String>("config/game.txt").unwrap();
//! assert_eq!(cache.status(config), LoadableStatus::SuccessToLoad);
//!
//! // Asynchronous load of the same key: no second fetch, callback on the next tick.
//! let again = cache
//!     .load_asset_async::<String>(
//!         "config/game.txt",
//!         Some(Box::new(|loaded: &Loadable| assert!(loaded.is_done()))),
//!     )
//!     .unwrap();
//! assert_eq!(cache.ref_count(again), 2);
//! cache.tick();
//!
//! cache.release(config);
//! cache.release(again);
//! cache.tick();
//! assert_eq!(cache.status(config), LoadableStatus::Unloaded);
//! ```
//!
//! # Architecture
//!
//! - [`ResourceCache`] owns every instance in a generational arena and hands
//!   out copyable handles.
//! - Each [`Loadable`] carries a [`LoadStrategy`] chosen when it is created.
//! - Strategies reach the outside world through [`Backends`]: a
//!   [`Resolver`], [`DownloadTransport`], [`WebTransport`], [`Mounter`],
//!   [`BytesReader`] and the [`DecoderRegistry`].

pub mod cache;
pub mod config;
pub mod decoder;
pub mod error;
pub mod event;
pub mod gate;
pub mod handle;
pub mod io;
mod lifecycle;
pub mod loadable;
pub mod mount;
pub mod reference;
pub mod registry;
pub mod resolver;
mod scheduler;
pub mod status;
pub mod strategy;
pub mod transport;

pub use cache::{BundleCreator, ResourceCache};
pub use config::CacheConfig;
pub use decoder::{BytesDecoder, DecodeContext, Decoder, DecoderRegistry, TextDecoder};
pub use error::{LoadError, LoadResult};
pub use event::{LoadEvent, LoadEventBuffer};
pub use gate::{Gate, GateSwitch, Open};
pub use handle::{AssetHandle, BundleHandle, LoadableId};
pub use io::{BytesFuture, BytesReader, FileReader, MemoryReader};
pub use loadable::{Listener, LoadState, Loadable, Payload, ResourceKind};
pub use mount::{ArchiveHandle, FileMounter, MountPoll, MountTable, MountTicket, Mounter};
pub use reference::Reference;
pub use resolver::{BundleDescriptor, Manifest, Resolver};
pub use status::LoadableStatus;
pub use strategy::{
    Backends, DownloadThenMount, LoadContext, LoadStrategy, LocalAsset, LocalBundle, StreamingWeb,
};
pub use transport::{
    DownloadId, DownloadRequest, DownloadStatus, DownloadTransport, OfflineTransport, WebPoll,
    WebRequestId, WebTransport,
};

/// Marker trait for payload types the cache can hold.
pub trait Asset: Send + Sync + 'static {
    /// Human-readable name for logs and errors.
    fn type_name() -> &'static str;
}

impl Asset for String {
    fn type_name() -> &'static str {
        "String"
    }
}

impl Asset for Vec<u8> {
    fn type_name() -> &'static str {
        "Bytes"
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Asset, AssetHandle, BundleDescriptor, BundleHandle, CacheConfig, Decoder, GateSwitch,
        LoadError, LoadEvent, LoadResult, Loadable, LoadableStatus, Manifest, MemoryReader,
        ResourceCache,
    };
}
