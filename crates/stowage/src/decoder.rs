//! Decoders turn fetched bytes into typed asset payloads.

use std::any::{Any, TypeId};
use std::sync::Arc;

use stowage_core::alloc::HashMap;

use crate::Asset;
use crate::error::{LoadError, LoadResult};

/// Extension that matches any key of the decoder's type.
pub const ANY_EXTENSION: &str = "*";

/// Default priority for decoders.
pub const DEFAULT_DECODER_PRIORITY: i32 = 0;

/// Input handed to a decoder.
pub struct DecodeContext<'a> {
    /// The cache key being decoded.
    pub key: &'a str,
    /// The fetched bytes.
    pub bytes: &'a [u8],
    /// Lowercase extension of the key, without the dot.
    pub extension: Option<&'a str>,
}

/// Decodes bytes into one asset type.
///
/// # Example
///
/// ```
/// use stowage::{Asset, DecodeContext, Decoder, LoadResult};
///
/// struct Csv(Vec<String>);
///
/// impl Asset for Csv {
///     fn type_name() -> &'static str {
///         "Csv"
///     }
/// }
///
/// struct CsvDecoder;
///
/// impl Decoder for CsvDecoder {
///     type Asset = Csv;
///
///     fn extensions(&self) -> &[&str] {
///         &["csv"]
///     }
///
///     fn decode(&self, ctx: DecodeContext<'_>) -> LoadResult<Csv> {
///         let text = String::from_utf8_lossy(ctx.bytes);
///         Ok(Csv(text.split(',').map(str::to_string).collect()))
///     }
/// }
/// ```
pub trait Decoder: 'static {
    type Asset: Asset;

    /// Extensions handled, without dots. [`ANY_EXTENSION`] matches every key.
    fn extensions(&self) -> &[&str];

    fn decode(&self, ctx: DecodeContext<'_>) -> LoadResult<Self::Asset>;

    /// Higher priority decoders win when several handle the same type and extension.
    fn priority(&self) -> i32 {
        DEFAULT_DECODER_PRIORITY
    }
}

/// Type-erased decoder for dynamic dispatch.
pub trait ErasedDecoder {
    fn asset_type_id(&self) -> TypeId;

    fn asset_type_name(&self) -> &'static str;

    fn extensions(&self) -> &[&str];

    fn priority(&self) -> i32;

    fn decode_erased(&self, ctx: DecodeContext<'_>) -> LoadResult<Arc<dyn Any + Send + Sync>>;
}

impl<D: Decoder> ErasedDecoder for D {
    fn asset_type_id(&self) -> TypeId {
        TypeId::of::<D::Asset>()
    }

    fn asset_type_name(&self) -> &'static str {
        <D::Asset as Asset>::type_name()
    }

    fn extensions(&self) -> &[&str] {
        Decoder::extensions(self)
    }

    fn priority(&self) -> i32 {
        Decoder::priority(self)
    }

    fn decode_erased(&self, ctx: DecodeContext<'_>) -> LoadResult<Arc<dyn Any + Send + Sync>> {
        let asset = self.decode(ctx)?;
        Ok(Arc::new(asset))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DecoderKey {
    type_id: TypeId,
    extension: String,
}

struct DecoderEntry {
    decoder: Arc<dyn ErasedDecoder>,
    priority: i32,
}

/// Registry of decoders indexed by payload type and extension.
///
/// Lookup tries the key's extension first, then [`ANY_EXTENSION`].
#[derive(Default)]
pub struct DecoderRegistry {
    by_type_and_ext: HashMap<DecoderKey, Vec<DecoderEntry>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with [`TextDecoder`] and [`BytesDecoder`].
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TextDecoder);
        registry.register(BytesDecoder);
        registry
    }

    pub fn register<D: Decoder>(&mut self, decoder: D) {
        let decoder: Arc<dyn ErasedDecoder> = Arc::new(decoder);
        let type_id = decoder.asset_type_id();
        let priority = decoder.priority();

        for ext in decoder.extensions() {
            let key = DecoderKey {
                type_id,
                extension: ext.to_lowercase(),
            };
            let entries = self.by_type_and_ext.entry(key).or_default();
            entries.push(DecoderEntry {
                decoder: decoder.clone(),
                priority,
            });
            entries.sort_by(|a, b| b.priority.cmp(&a.priority));
        }
    }

    fn lookup(&self, type_id: TypeId, extension: &str) -> Option<&Arc<dyn ErasedDecoder>> {
        let key = DecoderKey {
            type_id,
            extension: extension.to_string(),
        };
        self.by_type_and_ext
            .get(&key)
            .and_then(|entries| entries.first())
            .map(|entry| &entry.decoder)
    }

    /// Best decoder for a type and extension.
    pub fn find(&self, type_id: TypeId, extension: Option<&str>) -> Option<&Arc<dyn ErasedDecoder>> {
        extension
            .and_then(|ext| self.lookup(type_id, ext))
            .or_else(|| self.lookup(type_id, ANY_EXTENSION))
    }

    pub fn has_decoder_for<T: Asset>(&self, extension: Option<&str>) -> bool {
        let extension = extension.map(str::to_lowercase);
        self.find(TypeId::of::<T>(), extension.as_deref()).is_some()
    }

    /// Decode `bytes` fetched for `key` into the payload type `type_id`.
    pub fn decode(
        &self,
        type_id: TypeId,
        type_name: &'static str,
        key: &str,
        bytes: &[u8],
    ) -> LoadResult<Arc<dyn Any + Send + Sync>> {
        let extension = extension_of(key);
        let decoder = self
            .find(type_id, extension.as_deref())
            .ok_or_else(|| LoadError::NoDecoder {
                type_name,
                extension: extension.clone(),
            })?;

        decoder.decode_erased(DecodeContext {
            key,
            bytes,
            extension: extension.as_deref(),
        })
    }
}

/// Lowercase extension of the last path segment, ignoring any query string.
pub fn extension_of(key: &str) -> Option<String> {
    let path = key.split(['?', '#']).next().unwrap_or(key);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Decodes UTF-8 text.
pub struct TextDecoder;

impl Decoder for TextDecoder {
    type Asset = String;

    fn extensions(&self) -> &[&str] {
        &[ANY_EXTENSION]
    }

    fn decode(&self, ctx: DecodeContext<'_>) -> LoadResult<String> {
        String::from_utf8(ctx.bytes.to_vec()).map_err(|e| LoadError::Decode {
            key: ctx.key.to_string(),
            message: format!("Invalid UTF-8: {}", e),
        })
    }
}

/// Passes bytes through untouched.
pub struct BytesDecoder;

impl Decoder for BytesDecoder {
    type Asset = Vec<u8>;

    fn extensions(&self) -> &[&str] {
        &[ANY_EXTENSION]
    }

    fn decode(&self, ctx: DecodeContext<'_>) -> LoadResult<Vec<u8>> {
        Ok(ctx.bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Score(u32);

    impl Asset for Score {
        fn type_name() -> &'static str {
            "Score"
        }
    }

    struct ScoreDecoder {
        priority: i32,
        bonus: u32,
    }

    impl Decoder for ScoreDecoder {
        type Asset = Score;

        fn extensions(&self) -> &[&str] {
            &["score"]
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn decode(&self, ctx: DecodeContext<'_>) -> LoadResult<Score> {
            let text = std::str::from_utf8(ctx.bytes).map_err(|e| LoadError::Decode {
                key: ctx.key.to_string(),
                message: e.to_string(),
            })?;
            let value: u32 = text.trim().parse().map_err(|_| LoadError::Decode {
                key: ctx.key.to_string(),
                message: format!("not a number: {}", text),
            })?;
            Ok(Score(value + self.bonus))
        }
    }

    fn decode_score(registry: &DecoderRegistry, key: &str, bytes: &[u8]) -> LoadResult<u32> {
        let any = registry.decode(TypeId::of::<Score>(), "Score", key, bytes)?;
        let score = any.downcast::<Score>().ok().unwrap();
        Ok(score.0)
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("ui/title.TXT"), Some("txt".to_string()));
        assert_eq!(
            extension_of("https://cdn.example.com/a/b.json?v=3"),
            Some("json".to_string())
        );
        assert_eq!(extension_of("https://cdn.example.com/a/b"), None);
        assert_eq!(extension_of(".hidden"), None);
        assert_eq!(extension_of("trailing."), None);
    }

    #[test]
    fn test_priority_wins() {
        let mut registry = DecoderRegistry::new();
        registry.register(ScoreDecoder {
            priority: -1,
            bonus: 0,
        });
        registry.register(ScoreDecoder {
            priority: 5,
            bonus: 100,
        });

        assert_eq!(decode_score(&registry, "a.score", b"1").unwrap(), 101);
    }

    #[test]
    fn test_missing_decoder() {
        let registry = DecoderRegistry::with_defaults();
        let err = decode_score(&registry, "a.score", b"1").unwrap_err();
        assert!(matches!(
            err,
            LoadError::NoDecoder {
                type_name: "Score",
                ..
            }
        ));
    }

    #[test]
    fn test_decode_error_propagates() {
        let mut registry = DecoderRegistry::new();
        registry.register(ScoreDecoder {
            priority: 0,
            bonus: 0,
        });
        let err = decode_score(&registry, "a.score", b"lots").unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
    }

    #[test]
    fn test_defaults_accept_any_extension() {
        let registry = DecoderRegistry::with_defaults();
        assert!(registry.has_decoder_for::<String>(Some("cfg")));
        assert!(registry.has_decoder_for::<Vec<u8>>(None));

        let text = registry
            .decode(TypeId::of::<String>(), "String", "notes.cfg", b"hi")
            .unwrap();
        assert_eq!(*text.downcast::<String>().ok().unwrap(), "hi");

        let bad = registry.decode(TypeId::of::<String>(), "String", "bad.txt", &[0xff, 0xfe]);
        assert!(matches!(bad, Err(LoadError::Decode { .. })));
    }
}
