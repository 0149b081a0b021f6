// Artifact keys: the cache identity and on-disk file name of an etude.
//
// The key is the ten canonical path fields joined with `_`, plus `.midi`:
//
//   c_pentatonic_none_none_none_acoustic_grand_piano_on_120_3_0.midi
//
// Unused tonic/interval slots read `none`. Only the instrument name may
// itself contain `_`; the five fields before it and the four after it never
// do, so splitting from both ends recovers every field and two distinct
// parameter sets can never share a key. Every character is in
// `[a-z0-9_.]`, which keeps the key a safe single path component.

use std::fmt;

use infinite_etudes_music::EtudeParams;

/// File extension of cached artifacts.
pub const EXTENSION: &str = "midi";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Derive the key for a validated request. Pure and stable across runs.
    pub fn derive(params: &EtudeParams) -> Self {
        let mut key = params.segments().join("_");
        key.push('.');
        key.push_str(EXTENSION);
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
