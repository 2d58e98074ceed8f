use clockke_types::Manifest;

/// Map a score onto a manifest band label.
///
/// Bands are walked highest cutoff first; the first cutoff `<= a_out` wins.
/// Anything below every cutoff, and NaN, maps to the fallback label.
#[must_use]
pub fn classify(a_out: f64, manifest: &Manifest) -> &str {
    manifest
        .bands()
        .iter()
        .find(|rule| rule.cutoff <= a_out)
        .map_or(manifest.fallback_band(), |rule| rule.label.as_str())
}
