//! Member path rules.
//!
//! Paths inside a volume are relative, `/`-separated UTF-8 strings. Input
//! paths are normalized on the way in; member paths are resolved against the
//! extraction destination on the way out and may never climb above it.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, ZarError};
use crate::wire::MAX_STRING_LEN;

/// Convert a filesystem path given to `create` into its member path.
///
/// Backslashes become `/`, a drive prefix and leading separators are
/// dropped, and `.` components are removed. A `..` discards itself and
/// everything before it, so `../shared/a.txt` is stored as `shared/a.txt`
/// and the result always resolves under an extraction destination.
pub fn member_path(input: &Path) -> Result<String> {
    let raw = input
        .to_str()
        .ok_or_else(|| ZarError::InvalidPath(input.to_string_lossy().into_owned()))?;
    let unified = raw.replace('\\', "/");
    let s = if has_drive_prefix(&unified) { &unified[2..] } else { unified.as_str() };

    let mut parts: Vec<&str> = Vec::new();
    for part in s.split('/') {
        match part {
            "" | "." => {}
            ".." => parts.clear(),
            p => parts.push(p),
        }
    }
    if parts.is_empty() {
        return Err(ZarError::EmptyPath);
    }

    let name = parts.join("/");
    if name.len() > MAX_STRING_LEN {
        return Err(ZarError::PathTooLong { max: MAX_STRING_LEN });
    }
    Ok(name)
}

fn has_drive_prefix(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
}

/// Directory part of a member path; `"."` when there is none.
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => ".",
    }
}

/// Final component of a member path.
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Place a member path under `dest`, refusing anything that would land
/// outside of it.
pub fn resolve(dest: &Path, member: &str) -> Result<PathBuf> {
    let mut out = dest.to_path_buf();
    let mut pushed = false;
    for part in member.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(ZarError::UnsafePath(member.to_owned())),
            p => {
                // Reject anything the host would read as a root or prefix.
                let mut comps = Path::new(p).components();
                match (comps.next(), comps.next()) {
                    (Some(Component::Normal(_)), None) => {}
                    _ => return Err(ZarError::UnsafePath(member.to_owned())),
                }
                out.push(p);
                pushed = true;
            }
        }
    }
    if !pushed {
        return Err(ZarError::EmptyPath);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_inputs() {
        assert_eq!(member_path(Path::new("a.txt")).unwrap(), "a.txt");
        assert_eq!(member_path(Path::new("/etc/hosts")).unwrap(), "etc/hosts");
        assert_eq!(member_path(Path::new("./dir/./x")).unwrap(), "dir/x");
        assert_eq!(member_path(Path::new("dir//x/")).unwrap(), "dir/x");
        assert_eq!(member_path(Path::new("dir\\sub\\f.bin")).unwrap(), "dir/sub/f.bin");
        assert_eq!(member_path(Path::new("C:\\data\\f")).unwrap(), "data/f");
        assert!(matches!(member_path(Path::new("/")), Err(ZarError::EmptyPath)));
    }

    #[test]
    fn parent_components_never_reach_the_member_path() {
        assert_eq!(member_path(Path::new("../shared/a.txt")).unwrap(), "shared/a.txt");
        assert_eq!(member_path(Path::new("a/../b")).unwrap(), "b");
        assert_eq!(member_path(Path::new("x/../../y/./z")).unwrap(), "y/z");
        assert!(matches!(member_path(Path::new("a/..")), Err(ZarError::EmptyPath)));
        assert!(matches!(member_path(Path::new("..")), Err(ZarError::EmptyPath)));

        // Whatever comes out must be extractable.
        for input in ["../shared/a.txt", "a/../b", "/../../etc/x"] {
            let name = member_path(Path::new(input)).unwrap();
            assert!(resolve(Path::new("out"), &name).is_ok(), "{input} -> {name}");
        }
    }

    #[test]
    fn oversized_member_path_rejected() {
        let ok = "d/".repeat(MAX_STRING_LEN / 2) + "f";
        assert_eq!(member_path(Path::new(&ok)).unwrap().len(), MAX_STRING_LEN);
        let long = "x".repeat(MAX_STRING_LEN + 1);
        assert!(matches!(
            member_path(Path::new(&long)),
            Err(ZarError::PathTooLong { max: MAX_STRING_LEN })
        ));
    }

    #[test]
    fn dirname_and_basename() {
        assert_eq!(dirname("a/b/c.txt"), "a/b");
        assert_eq!(dirname("c.txt"), ".");
        assert_eq!(basename("a/b/c.txt"), "c.txt");
        assert_eq!(basename("c.txt"), "c.txt");
    }

    #[test]
    fn resolve_stays_inside_destination() {
        let dest = Path::new("out");
        assert_eq!(resolve(dest, "a/b.txt").unwrap(), Path::new("out").join("a").join("b.txt"));
        assert_eq!(resolve(dest, "./a//b").unwrap(), Path::new("out").join("a").join("b"));
        assert!(matches!(resolve(dest, "../evil"), Err(ZarError::UnsafePath(_))));
        assert!(matches!(resolve(dest, "a/../../evil"), Err(ZarError::UnsafePath(_))));
        assert!(matches!(resolve(dest, "./"), Err(ZarError::EmptyPath)));
    }
}
