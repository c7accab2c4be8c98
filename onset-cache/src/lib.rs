pub mod cache;

pub use cache::{
    AssetDecoder, AssetPayload, Atom, CacheSummary, CachedAsset, ResolvedResource, ResourceCache,
    Texture,
};
