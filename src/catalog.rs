//! The fixed catalog of downloadable pretrained checkpoints.
//!
//! Every URL embeds the expected SHA-256 digest of its payload as the
//! second-to-last path segment; the downloader relies on this invariant.

use crate::error::{ConvertError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Human-readable model identifier, e.g. "ViT-L/14".
    pub name: &'static str,
    /// Source URL with the expected digest embedded in its path.
    pub url: &'static str,
}

/// The OpenAI CLIP releases, in conversion order.
pub const PRETRAINED: &[CatalogEntry] = &[
    CatalogEntry {
        name: "RN50",
        url: "https://openaipublic.azureedge.net/clip/models/afeb0e10f9e5a86da6080e35cf09123aca3b358a0c3e3b6c78a7b63bc04b6762/RN50.pt",
    },
    CatalogEntry {
        name: "RN101",
        url: "https://openaipublic.azureedge.net/clip/models/8fa8567bab74a42d41c5915025a8e4538c3bdbe8804a470a72f30b0d94fab599/RN101.pt",
    },
    CatalogEntry {
        name: "RN50x4",
        url: "https://openaipublic.azureedge.net/clip/models/7e526bd135e493cef0776de27d5f42653e6b4c8bf9e0f653bb11773263205fdd/RN50x4.pt",
    },
    CatalogEntry {
        name: "RN50x16",
        url: "https://openaipublic.azureedge.net/clip/models/52378b407f34354e150460fe41077663dd5b39c54cd0bfd2b27167a4a06ec9aa/RN50x16.pt",
    },
    CatalogEntry {
        name: "RN50x64",
        url: "https://openaipublic.azureedge.net/clip/models/be1cfb55d75a9666199fb2206c106743da0f6468c9d327f3e0d0a543a9919d9c/RN50x64.pt",
    },
    CatalogEntry {
        name: "ViT-B/32",
        url: "https://openaipublic.azureedge.net/clip/models/40d365715913c9da98579312b702a82c18be219cc2a73407c4526f58eba950af/ViT-B-32.pt",
    },
    CatalogEntry {
        name: "ViT-B/16",
        url: "https://openaipublic.azureedge.net/clip/models/5806e77cd80f8b59890b7e101eabd078d9fb84e6937f9e85e4ecb61988df416f/ViT-B-16.pt",
    },
    CatalogEntry {
        name: "ViT-L/14",
        url: "https://openaipublic.azureedge.net/clip/models/b8cca3fd41ae0c99ba7e8951adf17d267cdb84cd88be6f7c2e0eca1737a03836/ViT-L-14.pt",
    },
    CatalogEntry {
        name: "ViT-L/14@336px",
        url: "https://openaipublic.azureedge.net/clip/models/3035c92b350959924f9f00213499208652fc7ea050643e8b385c2dac08641f02/ViT-L-14-336px.pt",
    },
];

/// Look up a catalog entry by its identifier.
pub fn lookup(name: &str) -> Result<&'static CatalogEntry> {
    PRETRAINED
        .iter()
        .find(|entry| entry.name == name)
        .ok_or_else(|| ConvertError::UnknownModel {
            name: name.to_string(),
            available: PRETRAINED
                .iter()
                .map(|entry| entry.name)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Turn a model identifier into a filesystem-safe file stem.
///
/// `@` and `/` are the only characters appearing in catalog identifiers
/// that are unsafe in filenames; both map to `-`.
pub fn normalize_name(name: &str) -> String {
    name.replace(['@', '/'], "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("RN50"), "RN50");
        assert_eq!(normalize_name("ViT-B/32"), "ViT-B-32");
        assert_eq!(normalize_name("ViT-L/14@336px"), "ViT-L-14-336px");
    }

    #[test]
    fn test_lookup_known_model() {
        let entry = lookup("ViT-L/14").unwrap();
        assert!(entry.url.ends_with("/ViT-L-14.pt"));
    }

    #[test]
    fn test_lookup_unknown_model() {
        let err = lookup("ViT-H/14").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ViT-H/14"));
        assert!(message.contains("RN50"));
    }

    #[test]
    fn test_catalog_urls_embed_digests() {
        for entry in PRETRAINED {
            let digest = crate::download::expected_sha256(entry.url).unwrap();
            assert_eq!(digest.len(), 64, "bad digest segment for {}", entry.name);
        }
    }
}
