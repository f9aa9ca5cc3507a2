//! Local filenames for fetched media.

use url::Url;

/// Linux NAME_MAX, minus room for the `NN_` prefix added by `media_filename`.
const NAME_MAX: usize = 240;

/// Makes `name` safe to use as a single path component on Linux.
///
/// Separators, NUL, control characters and whitespace become `_`; runs of `_`
/// collapse; leading/trailing dots and underscores are trimmed so the result
/// can never be `.`/`..` or a hidden file. Length is capped on a char boundary.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c == '/' || c == '\\' || c.is_control() || c.is_whitespace() {
            '_'
        } else {
            c
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut end = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

/// Filename for the `index`-th item fetched from `url`.
///
/// Uses the last path segment when it is usable, otherwise `media`, and makes
/// sure the name ends in an extension (`fallback_ext` if the segment has none).
/// The index prefix keeps names unique and ordered inside a job directory.
pub fn media_filename(url: &Url, index: usize, fallback_ext: &str) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut s| s.rfind(|seg| !seg.is_empty()))
        .map(sanitize_filename)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "media".to_string());

    let has_ext = segment
        .rsplit_once('.')
        .map(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
        .unwrap_or(false);

    if has_ext {
        format!("{:02}_{}", index + 1, segment)
    } else {
        format!("{:02}_{}.{}", index + 1, segment, fallback_ext)
    }
}
