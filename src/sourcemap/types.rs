/// A position in a generated (served-to-the-runtime) script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPosition {
    pub script_url: String,
    pub line: u32,
    pub column: u32,
}

/// A position in an original (authored) source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub name: Option<String>,
}

/// Result of mapping an original position forward to a generated one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginalToGenerated {
    Found(GeneratedPosition),
    /// The script has no source map at all.
    NoMap,
    /// The script has a map, but no mapping covers this file/line.
    NotFound,
}

/// Result of mapping a generated position back to its original one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedToOriginal {
    Found(OriginalPosition),
    NoMap,
}

/// Result of resolving a generated identifier name through the map's name table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rename {
    Found(String),
    Unmapped,
}
