use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::domain::model::Digest;
use crate::utils::error::{ExportError, Result};

static DIGEST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(sha256|sha512):([0-9a-fA-F]+)\b").expect("digest pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum DigestStrategy {
    /// Scan the raw manifest text for `<algorithm>:<hex>` references.
    #[default]
    PatternScan,
    /// Decode the manifest JSON and read `config.digest` and `layers[].digest`.
    Structured,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(default)]
    config: Option<Descriptor>,
    layers: Vec<Descriptor>,
}

#[derive(Debug, Deserialize)]
struct Descriptor {
    digest: String,
}

pub struct ManifestParser {
    strategy: DigestStrategy,
}

impl ManifestParser {
    pub fn new(strategy: DigestStrategy) -> Self {
        Self { strategy }
    }

    /// Digests referenced by a manifest, deduplicated and sorted.
    pub fn extract_digests(&self, manifest: &[u8]) -> Result<Vec<Digest>> {
        let digests = match self.strategy {
            DigestStrategy::PatternScan => scan_digests(manifest),
            DigestStrategy::Structured => decode_digests(manifest)?,
        };

        if digests.is_empty() {
            return Err(ExportError::ManifestParseError {
                message: "no blob references".to_string(),
            });
        }

        Ok(digests.into_iter().collect())
    }
}

fn scan_digests(manifest: &[u8]) -> BTreeSet<Digest> {
    let text = String::from_utf8_lossy(manifest);
    DIGEST_PATTERN
        .captures_iter(&text)
        .map(|caps| Digest::new(&caps[1], caps[2].to_ascii_lowercase()))
        .collect()
}

fn decode_digests(manifest: &[u8]) -> Result<BTreeSet<Digest>> {
    let manifest: Manifest =
        serde_json::from_slice(manifest).map_err(|e| ExportError::ManifestParseError {
            message: format!("invalid manifest JSON: {}", e),
        })?;

    manifest
        .config
        .iter()
        .chain(manifest.layers.iter())
        .map(|descriptor| descriptor.digest.parse::<Digest>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";
    const B: &str = "0f1e2d3c4b5a69788796a5b4c3d2e1f00f1e2d3c4b5a69788796a5b4c3d2e1f0";
    const C: &str = "ffeeddccbbaa99887766554433221100ffeeddccbbaa99887766554433221100";

    fn manifest_json() -> String {
        serde_json::json!({
            "schemaVersion": 2,
            "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
            "config": {
                "mediaType": "application/vnd.docker.container.image.v1+json",
                "digest": format!("sha256:{C}"),
                "size": 485
            },
            "layers": [
                {"mediaType": "application/vnd.ollama.image.model", "digest": format!("sha256:{A}"), "size": 100},
                {"mediaType": "application/vnd.ollama.image.license", "digest": format!("sha256:{B}"), "size": 20},
                {"mediaType": "application/vnd.ollama.image.params", "digest": format!("sha256:{A}"), "size": 100}
            ]
        })
        .to_string()
    }

    #[test]
    fn test_strategies_agree_and_deduplicate() {
        let manifest = manifest_json();
        let expected = vec![
            Digest::new("sha256", B),
            Digest::new("sha256", A),
            Digest::new("sha256", C),
        ];

        for strategy in [DigestStrategy::PatternScan, DigestStrategy::Structured] {
            let digests = ManifestParser::new(strategy)
                .extract_digests(manifest.as_bytes())
                .unwrap();
            assert_eq!(digests, expected, "strategy {strategy:?}");
        }
    }

    #[test]
    fn test_pattern_scan_tolerates_schema_drift() {
        let text = format!(r#"{{"blobs": ["sha256:{B}", "sha256:{A}"], "extra": "sha256:{B}"}}"#);
        let digests = ManifestParser::new(DigestStrategy::PatternScan)
            .extract_digests(text.as_bytes())
            .unwrap();
        assert_eq!(digests.len(), 2);
        assert_eq!(digests[0].hex, B);
    }

    #[test]
    fn test_structured_requires_layers_array() {
        let parser = ManifestParser::new(DigestStrategy::Structured);

        let missing = parser.extract_digests(br#"{"schemaVersion": 2}"#);
        assert!(matches!(missing, Err(ExportError::ManifestParseError { .. })));

        let not_array = parser.extract_digests(br#"{"layers": {"digest": "sha256:ab"}}"#);
        assert!(matches!(not_array, Err(ExportError::ManifestParseError { .. })));

        let malformed = parser.extract_digests(b"{not json");
        assert!(matches!(malformed, Err(ExportError::ManifestParseError { .. })));
    }

    #[test]
    fn test_uppercase_hex_selects_same_blob_in_both_strategies() {
        let manifest = format!(r#"{{"layers": [{{"digest": "sha256:{}"}}]}}"#, A.to_uppercase());

        for strategy in [DigestStrategy::PatternScan, DigestStrategy::Structured] {
            let digests = ManifestParser::new(strategy)
                .extract_digests(manifest.as_bytes())
                .unwrap();
            assert_eq!(digests, vec![Digest::new("sha256", A)], "strategy {strategy:?}");
        }
    }

    #[test]
    fn test_structured_rejects_path_like_algorithm() {
        let parser = ManifestParser::new(DigestStrategy::Structured);
        let result = parser.extract_digests(br#"{"layers": [{"digest": "sha256/../../../pwned:ab"}]}"#);
        assert!(matches!(result, Err(ExportError::ManifestParseError { .. })));

        // The scan only ever yields known algorithm names.
        let scanned = ManifestParser::new(DigestStrategy::PatternScan)
            .extract_digests(br#"{"layers": [{"digest": "sha256/../../../pwned:ab"}]}"#);
        assert!(matches!(scanned, Err(ExportError::ManifestParseError { .. })));
    }

    #[test]
    fn test_no_references_is_an_error() {
        for strategy in [DigestStrategy::PatternScan, DigestStrategy::Structured] {
            let err = ManifestParser::new(strategy)
                .extract_digests(br#"{"layers": []}"#)
                .unwrap_err();
            assert!(err.to_string().contains("no blob references"));
        }
    }
}
