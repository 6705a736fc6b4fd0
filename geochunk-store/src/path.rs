//! Helpers for the `/`-delimited chunk paths used as storage keys.
//!
//! Paths are plain strings rather than [`std::path::Path`] values: they name
//! objects inside the store and must look the same on every platform.

/// The root folder
pub const ROOT: &str = "/";

/// Normalize a chunk path.
///
/// Empty and `.` segments are dropped, `..` removes the previous segment (but
/// never climbs above the root), and trailing separators are stripped. A
/// leading `/` is kept if the input had one.
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Join two path fragments with a single separator and normalize the result.
pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        return normalize(child);
    }
    normalize(&format!("{parent}/{child}"))
}
