use super::types::{
    GeneratedPosition, GeneratedToOriginal, OriginalPosition, OriginalToGenerated, Rename,
};
use base64::Engine;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct ScriptInfo {
    url: String,
    source_map_url: Option<String>,
}

enum Parsed {
    Map(sourcemap::SourceMap),
    NoMap,
}

/// Caches parsed source maps per script, keyed by the inspector's scriptId.
/// Maps are fetched lazily: `on_script_parsed` only records where to look;
/// the actual parse happens on first query against that script.
///
/// Generated positions (line/column) mirror CDP wire convention: 0-indexed.
/// Original (authored-file) line numbers are 1-indexed to match the
/// Breakpoint model; original columns stay 0-indexed.
pub struct SourceMapIndex {
    scripts: RwLock<HashMap<String, ScriptInfo>>,
    parsed: RwLock<HashMap<String, Parsed>>,
}

impl Default for SourceMapIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceMapIndex {
    pub fn new() -> Self {
        Self {
            scripts: RwLock::new(HashMap::new()),
            parsed: RwLock::new(HashMap::new()),
        }
    }

    /// Record a `Debugger.scriptParsed` notification. `source_map_url` is
    /// the event's `sourceMapURL` field, if present.
    pub async fn on_script_parsed(&self, script_id: String, url: String, source_map_url: Option<String>) {
        self.scripts
            .write()
            .await
            .insert(script_id, ScriptInfo { url, source_map_url });
    }

    /// The script's own reported URL, for callers that need a path to
    /// fall back to when no source map is available.
    pub async fn script_url(&self, script_id: &str) -> Option<String> {
        self.scripts.read().await.get(script_id).map(|i| i.url.clone())
    }

    async fn ensure_parsed(&self, script_id: &str) {
        if self.parsed.read().await.contains_key(script_id) {
            return;
        }

        let info = self.scripts.read().await.get(script_id).cloned();
        let parsed = match info {
            Some(info) => Self::load_map(&info).await,
            None => Parsed::NoMap,
        };

        self.parsed
            .write()
            .await
            .insert(script_id.to_string(), parsed);
    }

    async fn load_map(info: &ScriptInfo) -> Parsed {
        let bytes = match &info.source_map_url {
            Some(u) if u.starts_with("data:") => Self::decode_data_url(u),
            Some(u) => Self::read_sibling(&info.url, u).await,
            None => Self::read_sibling(&info.url, &format!("{u}.map", u = basename(&info.url))).await,
        };

        match bytes {
            Some(bytes) => match sourcemap::SourceMap::from_slice(&bytes) {
                Ok(map) => Parsed::Map(map),
                Err(e) => {
                    warn!("malformed source map for {}: {}", info.url, e);
                    Parsed::NoMap
                }
            },
            None => Parsed::NoMap,
        }
    }

    fn decode_data_url(url: &str) -> Option<Vec<u8>> {
        let (meta, payload) = url.strip_prefix("data:")?.split_once(',')?;
        if meta.contains("base64") {
            base64::engine::general_purpose::STANDARD
                .decode(payload)
                .ok()
        } else {
            Some(payload.as_bytes().to_vec())
        }
    }

    async fn read_sibling(script_url: &str, map_ref: &str) -> Option<Vec<u8>> {
        let map_path = resolve_sibling_path(script_url, map_ref)?;
        match tokio::fs::read(&map_path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!("no source map at {}: {}", map_path.display(), e);
                None
            }
        }
    }

    /// `originalToGenerated(file, line)`. `line` is 1-indexed.
    pub async fn original_to_generated(&self, file: &str, line: u32) -> OriginalToGenerated {
        let script_ids: Vec<String> = self.scripts.read().await.keys().cloned().collect();
        for id in &script_ids {
            self.ensure_parsed(id).await;
        }

        let parsed = self.parsed.read().await;
        let mut any_map = false;
        let mut best: Option<(u32, u32, String)> = None;

        for (script_id, state) in parsed.iter() {
            let Parsed::Map(map) = state else { continue };
            any_map = true;
            let url = self
                .scripts
                .try_read()
                .ok()
                .and_then(|s| s.get(script_id).map(|i| i.url.clone()))
                .unwrap_or_default();

            for token in map.tokens() {
                let Some(source) = token.get_source() else {
                    continue;
                };
                if !paths_match(source, file) {
                    continue;
                }
                if token.get_src_line() != line.saturating_sub(1) {
                    continue;
                }

                let candidate = (token.get_dst_line(), token.get_dst_col(), url.clone());
                best = Some(match best {
                    Some(current) if current <= candidate => current,
                    _ => candidate,
                });
            }
        }

        match best {
            Some((dst_line, dst_col, url)) => OriginalToGenerated::Found(GeneratedPosition {
                script_url: url,
                line: dst_line,
                column: dst_col,
            }),
            None if any_map => OriginalToGenerated::NotFound,
            None => OriginalToGenerated::NoMap,
        }
    }

    /// `generatedToOriginal(scriptId, line, column)`. `line`/`column` are
    /// 0-indexed, matching CDP.
    pub async fn generated_to_original(
        &self,
        script_id: &str,
        line: u32,
        column: u32,
    ) -> GeneratedToOriginal {
        self.ensure_parsed(script_id).await;

        let parsed = self.parsed.read().await;
        let Some(Parsed::Map(map)) = parsed.get(script_id) else {
            return GeneratedToOriginal::NoMap;
        };

        match map.lookup_token(line, column) {
            Some(token) => {
                let Some(source) = token.get_source() else {
                    return GeneratedToOriginal::NoMap;
                };
                GeneratedToOriginal::Found(OriginalPosition {
                    file: source.to_string(),
                    line: token.get_src_line() + 1,
                    column: token.get_src_col(),
                    name: token.get_name().map(str::to_string),
                })
            }
            None => GeneratedToOriginal::NoMap,
        }
    }

    /// `renameFromMap(generatedName, scope)`. `scope` pins the lexical
    /// position (script/line/column) the identifier was read at; the name
    /// table only covers identifiers actually referenced at mapped
    /// positions, so a miss degrades to `Unmapped` rather than an error.
    pub async fn rename_from_map(
        &self,
        script_id: &str,
        line: u32,
        column: u32,
        generated_name: &str,
    ) -> Rename {
        self.ensure_parsed(script_id).await;

        let parsed = self.parsed.read().await;
        let Some(Parsed::Map(map)) = parsed.get(script_id) else {
            return Rename::Unmapped;
        };

        match map.lookup_token(line, column).and_then(|t| t.get_name()) {
            Some(name) => Rename::Found(name.to_string()),
            None => {
                debug!("no original name for `{}` at {}:{}", generated_name, line, column);
                Rename::Unmapped
            }
        }
    }
}

fn basename(url: &str) -> String {
    Path::new(url)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| url.to_string())
}

fn resolve_sibling_path(script_url: &str, map_ref: &str) -> Option<PathBuf> {
    let stripped = script_url.strip_prefix("file://").unwrap_or(script_url);
    if stripped.starts_with("http://") || stripped.starts_with("https://") {
        return None;
    }
    let script_path = Path::new(stripped);
    let dir = script_path.parent().unwrap_or_else(|| Path::new("."));
    Some(dir.join(map_ref))
}

fn paths_match(source: &str, file: &str) -> bool {
    source == file || basename(source) == basename(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `"AAAA"` is the canonical single-segment identity mapping: generated
    /// (0,0) -> source 0, original line 0, original column 0, no name.
    fn sample_map_json() -> &'static str {
        r#"{
            "version": 3,
            "sources": ["original.ts"],
            "names": [],
            "mappings": "AAAA"
        }"#
    }

    #[tokio::test]
    async fn missing_script_degrades_to_no_map() {
        let index = SourceMapIndex::new();
        let result = index.generated_to_original("unknown-script", 0, 0).await;
        assert_eq!(result, GeneratedToOriginal::NoMap);
    }

    #[tokio::test]
    async fn data_url_map_parses_and_resolves_generated_to_original() {
        let index = SourceMapIndex::new();
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(sample_map_json().as_bytes());
        let data_url = format!("data:application/json;base64,{encoded}");

        index
            .on_script_parsed(
                "script-1".to_string(),
                "file:///app/dist/bundle.js".to_string(),
                Some(data_url),
            )
            .await;

        match index.generated_to_original("script-1", 0, 0).await {
            GeneratedToOriginal::Found(pos) => {
                assert_eq!(pos.file, "original.ts");
                assert_eq!(pos.line, 1);
                assert_eq!(pos.column, 0);
                assert_eq!(pos.name, None);
            }
            other => panic!("expected a mapping, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_map_degrades_to_no_map_without_panicking() {
        let index = SourceMapIndex::new();
        let data_url = "data:application/json;base64,bm90IGpzb24=".to_string();
        index
            .on_script_parsed("bad".to_string(), "file:///x.js".to_string(), Some(data_url))
            .await;

        let result = index.generated_to_original("bad", 0, 0).await;
        assert_eq!(result, GeneratedToOriginal::NoMap);
    }

    #[tokio::test]
    async fn original_to_generated_with_no_scripts_is_no_map() {
        let index = SourceMapIndex::new();
        let result = index.original_to_generated("missing.ts", 1).await;
        assert_eq!(result, OriginalToGenerated::NoMap);
    }
}
