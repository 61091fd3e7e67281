//! Path algebra.
//!
//! Pure functions over `/`-separated path strings; no I/O. The cache and
//! facade lean on these for every lookup, so the edge cases are pinned down
//! precisely: an empty path normalises to `"."`, `dirname("/")` is `"/"`,
//! `basename("/")` is `""`.

/// True iff `path` starts with `/`.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Splits a path into a root marker followed by its components.
///
/// The first element is `"/"` for absolute paths and `"."` otherwise; the
/// rest are the non-empty slash-delimited components. An empty input splits
/// to `["."]`.
pub fn split(path: &str) -> Vec<String> {
    let marker = if is_absolute(path) { "/" } else { "." };
    let mut parts = vec![marker.to_string()];
    parts.extend(components(path).map(String::from));
    parts
}

/// Joins parts with `/`, collapsing separator runs and normalising.
///
/// Empty parts are filtered out; an all-empty join returns `"."`.
pub fn join(parts: &[&str]) -> String {
    let kept: Vec<&str> = parts.iter().copied().filter(|p| !p.is_empty()).collect();
    if kept.is_empty() {
        return ".".to_string();
    }
    normalize(&kept.join("/"))
}

/// Normalises a path: folds `.` and `..`, collapses separator runs.
///
/// A `..` pops the previous component, except at an absolute root (dropped)
/// or when the path is relative and nothing precedes it (kept). A trailing
/// `/` in the input is preserved when the result does not already end in one.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let absolute = is_absolute(path);
    let mut out: Vec<&str> = Vec::new();
    for comp in components(path) {
        match comp {
            "." => {}
            ".." => {
                if let Some(last) = out.last() {
                    if *last == ".." {
                        out.push("..");
                    } else {
                        out.pop();
                    }
                } else if !absolute {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    let mut result = if absolute {
        format!("/{}", out.join("/"))
    } else {
        out.join("/")
    };
    if result.is_empty() {
        result.push('.');
    }
    if path.ends_with('/') && !result.ends_with('/') {
        result.push('/');
    }
    result
}

/// Resolves parts right-to-left into a single path.
///
/// Everything before the last absolute part is discarded; the remainder is
/// joined and a trailing `/` (other than the bare root) is trimmed. With no
/// parts at all the result is `"/"`.
pub fn resolve(parts: &[&str]) -> String {
    if parts.is_empty() {
        return "/".to_string();
    }
    let start = parts
        .iter()
        .rposition(|p| is_absolute(p))
        .unwrap_or(0);
    let mut result = join(&parts[start..]);
    if result.len() > 1 && result.ends_with('/') {
        result.truncate(result.len() - 1);
    }
    result
}

/// Computes the relative path leading from `from` to `to`.
///
/// Both arguments are resolved to absolute form first. Equal paths yield an
/// empty string.
pub fn relative(from: &str, to: &str) -> String {
    let from = resolve(&[from]);
    let to = resolve(&[to]);
    if from == to {
        return String::new();
    }
    let from_parts: Vec<&str> = components(&from).collect();
    let to_parts: Vec<&str> = components(&to).collect();
    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut out: Vec<&str> = Vec::with_capacity(from_parts.len() - common + to_parts.len() - common);
    for _ in common..from_parts.len() {
        out.push("..");
    }
    out.extend(&to_parts[common..]);
    out.join("/")
}

/// The final path component, with any trailing `/` stripped.
///
/// `basename("/")` is `""`.
pub fn basename(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit('/').next() {
        Some(name) => name.to_string(),
        None => String::new(),
    }
}

/// The path prefix before the last component.
///
/// Defaults to `"."` for relative paths and `"/"` for absolute ones when no
/// directory part remains. `dirname("/")` is `"/"`.
pub fn dirname(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if is_absolute(path) { "/" } else { "." }.to_string();
    }
    match trimmed.rfind('/') {
        None => ".".to_string(),
        Some(0) => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
    }
}

/// The extension of the final component, from its last `.` inclusive.
///
/// A leading dot (hidden files) does not count as an extension start.
pub fn extname(path: &str) -> String {
    let base = basename(path);
    match base.rfind('.') {
        Some(idx) if idx > 0 => base[idx..].to_string(),
        _ => String::new(),
    }
}

/// True iff no component of `path` equals `.` or `..`.
pub fn is_normalized(path: &str) -> bool {
    components(path).all(|c| c != "." && c != "..")
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}
