use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Lexically normalize a path: drop `.` segments and fold `..` into its parent.
///
/// Leading `..` segments on a relative path are kept. The file system is never
/// consulted, so symlinks are not followed.
pub fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut out: Vec<Utf8Component<'_>> = Vec::new();
    for comp in path.components() {
        match comp {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => match out.last() {
                Some(Utf8Component::Normal(_)) => {
                    out.pop();
                }
                Some(Utf8Component::RootDir) | Some(Utf8Component::Prefix(_)) => {}
                _ => out.push(comp),
            },
            other => out.push(other),
        }
    }
    out.iter().map(|c| c.as_str()).collect()
}

/// Stable module id for a local path: `/`-separated.
pub fn module_id(path: &Utf8Path) -> String {
    path.as_str().replace('\\', "/")
}

/// Directory of `path`, or the empty path for a bare file name.
pub fn parent_dir(path: &Utf8Path) -> Utf8PathBuf {
    path.parent().map(Utf8Path::to_path_buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_dot_segments() {
        assert_eq!(normalize(Utf8Path::new("a/./b/../c.sol")), "a/c.sol");
        assert_eq!(normalize(Utf8Path::new("./c.sol")), "c.sol");
        assert_eq!(normalize(Utf8Path::new("../x/c.sol")), "../x/c.sol");
        assert_eq!(normalize(Utf8Path::new("a/../../c.sol")), "../c.sol");
        assert_eq!(normalize(Utf8Path::new("/a/../../c.sol")), "/c.sol");
    }

    #[test]
    fn parent_of_bare_name_is_empty() {
        assert_eq!(parent_dir(Utf8Path::new("Token.sol")), "");
        assert_eq!(parent_dir(Utf8Path::new("contracts/Token.sol")), "contracts");
    }
}
