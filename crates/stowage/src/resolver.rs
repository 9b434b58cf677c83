//! Key resolution: which keys exist and where their bytes live.
//!
//! Version resolution itself is outside the cache. The cache asks a
//! [`Resolver`] whether a key is known before it creates any instance, and
//! where a bundle should be downloaded to or read from.

use std::path::{Path, PathBuf};

use stowage_core::alloc::HashMap;

/// Describes one versioned archive bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleDescriptor {
    /// Bare name, shared by every version of the bundle.
    pub name: String,
    /// Content hash of this version.
    pub hash: String,
    /// Expected size in bytes.
    pub size: u64,
    /// Checksum handed to the download transport.
    pub checksum: u32,
}

impl BundleDescriptor {
    pub fn new(name: impl Into<String>, hash: impl Into<String>, size: u64, checksum: u32) -> Self {
        Self {
            name: name.into(),
            hash: hash.into(),
            size,
            checksum,
        }
    }

    /// The hash-qualified name; this is the bundle's cache key.
    pub fn name_with_hash(&self) -> String {
        format!("{}_{}", self.name, self.hash)
    }
}

/// Maps logical keys to concrete locations.
pub trait Resolver {
    /// Location (local path or URL) of an asset, or `None` if the key is unknown.
    fn resolve_asset(&self, path: &str) -> Option<String>;

    /// The bundle that contains `path`, or `None` if the key is unknown.
    fn resolve_bundle(&self, path: &str) -> Option<BundleDescriptor>;

    /// Where the bundle is read from: a local path or a URL.
    fn bundle_location(&self, bundle: &BundleDescriptor) -> String;

    /// Local path a downloaded bundle is saved to.
    fn download_destination(&self, bundle: &BundleDescriptor) -> PathBuf;

    /// Called once a bundle download lands on disk, so later loads of the
    /// same version read the local copy.
    fn record_mounted_path(&mut self, bundle: &BundleDescriptor, path: &Path);
}

/// In-memory [`Resolver`].
///
/// # Example
///
/// ```
/// use stowage::{BundleDescriptor, Manifest, Resolver};
///
/// let mut manifest = Manifest::new().with_base_url("https://cdn.example.com/bundles");
/// manifest.add_asset("ui/title.txt");
/// manifest.add_bundle(BundleDescriptor::new("ui", "9f2c", 2048, 7), ["ui/title.txt"]);
///
/// let bundle = manifest.resolve_bundle("ui/title.txt").unwrap();
/// assert_eq!(
///     manifest.bundle_location(&bundle),
///     "https://cdn.example.com/bundles/ui_9f2c"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Manifest {
    assets: HashMap<String, String>,
    bundles: HashMap<String, BundleDescriptor>,
    mounted_paths: HashMap<String, PathBuf>,
    bundle_root: PathBuf,
    download_root: PathBuf,
    base_url: Option<String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            assets: HashMap::new(),
            bundles: HashMap::new(),
            mounted_paths: HashMap::new(),
            bundle_root: PathBuf::new(),
            download_root: PathBuf::from("downloads"),
            base_url: None,
        }
    }

    /// Directory local bundles are read from.
    pub fn with_bundle_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.bundle_root = root.into();
        self
    }

    /// Directory downloaded bundles are saved into.
    pub fn with_download_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.download_root = root.into();
        self
    }

    /// Serve bundles from this URL instead of the bundle root.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Register an asset stored at its own path.
    pub fn add_asset(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.assets.insert(path.clone(), path);
    }

    /// Register an asset stored at an explicit location (path or URL).
    pub fn add_asset_at(&mut self, path: impl Into<String>, location: impl Into<String>) {
        self.assets.insert(path.into(), location.into());
    }

    /// Register a bundle under its bare name and under every asset path it contains.
    ///
    /// Registering a newer version replaces the older one for those keys.
    pub fn add_bundle<'a>(
        &mut self,
        bundle: BundleDescriptor,
        contents: impl IntoIterator<Item = &'a str>,
    ) {
        for path in contents {
            self.bundles.insert(path.to_string(), bundle.clone());
        }
        self.bundles.insert(bundle.name.clone(), bundle);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.assets.contains_key(path) || self.bundles.contains_key(path)
    }

    pub fn mounted_path(&self, bundle: &BundleDescriptor) -> Option<&Path> {
        self.mounted_paths
            .get(&bundle.name_with_hash())
            .map(PathBuf::as_path)
    }
}

impl Resolver for Manifest {
    fn resolve_asset(&self, path: &str) -> Option<String> {
        self.assets.get(path).cloned()
    }

    fn resolve_bundle(&self, path: &str) -> Option<BundleDescriptor> {
        self.bundles.get(path).cloned()
    }

    fn bundle_location(&self, bundle: &BundleDescriptor) -> String {
        if let Some(path) = self.mounted_path(bundle) {
            return path.display().to_string();
        }

        let file_name = bundle.name_with_hash();
        match &self.base_url {
            Some(url) => format!("{}/{}", url.trim_end_matches('/'), file_name),
            None => self.bundle_root.join(file_name).display().to_string(),
        }
    }

    fn download_destination(&self, bundle: &BundleDescriptor) -> PathBuf {
        self.download_root.join(bundle.name_with_hash())
    }

    fn record_mounted_path(&mut self, bundle: &BundleDescriptor, path: &Path) {
        self.mounted_paths
            .insert(bundle.name_with_hash(), path.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_keys_do_not_resolve() {
        let manifest = Manifest::new();
        assert!(manifest.resolve_asset("nope.txt").is_none());
        assert!(manifest.resolve_bundle("nope.txt").is_none());
    }

    #[test]
    fn test_bundle_resolves_by_content_and_name() {
        let mut manifest = Manifest::new();
        let bundle = BundleDescriptor::new("props", "a1", 10, 0);
        manifest.add_bundle(bundle.clone(), ["props/chair.mesh", "props/table.mesh"]);

        assert_eq!(manifest.resolve_bundle("props/table.mesh"), Some(bundle.clone()));
        assert_eq!(manifest.resolve_bundle("props"), Some(bundle));
    }

    #[test]
    fn test_recorded_path_overrides_location() {
        let mut manifest = Manifest::new().with_base_url("https://cdn.example.com/");
        let bundle = BundleDescriptor::new("props", "a1", 10, 0);
        assert_eq!(
            manifest.bundle_location(&bundle),
            "https://cdn.example.com/props_a1"
        );

        let saved = manifest.download_destination(&bundle);
        manifest.record_mounted_path(&bundle, &saved);
        assert_eq!(manifest.bundle_location(&bundle), saved.display().to_string());
    }
}
