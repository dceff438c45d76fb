use serde::Serialize;
use std::{
    fs::{self, ReadDir},
    io,
    path::{Path, PathBuf},
};

pub mod error {
    use std::{io, path::PathBuf};

    pub type Result<T> = std::result::Result<T, self::Error>;

    type Msg = &'static str;

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("{0} ({1}): {2}")]
        SingleIO(Msg, PathBuf, #[source] io::Error),

        #[error("{0} (from='{1}', to='{2}): {3}")]
        FromToIO(Msg, PathBuf, PathBuf, #[source] io::Error),

        #[error("Failed to canonicalize path '{0}': {1}")]
        CanonicalizePath(PathBuf, #[source] io::Error),

        #[error("Invalid glob '{0}': {1}")]
        InvalidGlob(String, #[source] ::glob::PatternError),

        #[error("Cannot access entry matched by glob '{0}': {1}")]
        GlobEntry(String, #[source] ::glob::GlobError),

        #[error("Cannot serialize to JSON (dest='{0}'): {1}")]
        SerializeToJson(PathBuf, #[source] serde_json::Error),
    }
}
pub use error::{Error, Result};

#[must_use]
pub fn mkdir_all(path: impl AsRef<Path>) -> Result<()> {
    let dir = path.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::SingleIO("Cannot create dir", dir.to_owned(), e))
}

#[must_use]
pub fn write<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    fs::write(&filepath, contents)
        .map_err(|e| Error::SingleIO("Cannot write file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn write_with_mkdir<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    if let Some(dir) = filepath.as_ref().parent() {
        self::mkdir_all(dir)?;
    }
    self::write(filepath, contents)
}

#[must_use]
pub fn read_to_string(filepath: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn remove_file(filepath: impl AsRef<Path>) -> Result<()> {
    fs::remove_file(&filepath)
        .map_err(|e| Error::SingleIO("Cannot remove file", filepath.as_ref().to_owned(), e))
}

/// Remove the file, treating an already-absent file as success.
/// Returns whether a file was actually removed.
#[must_use]
pub fn remove_file_if_exists(filepath: impl AsRef<Path>) -> Result<bool> {
    match fs::remove_file(&filepath) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::SingleIO(
            "Cannot remove file",
            filepath.as_ref().to_owned(),
            e,
        )),
    }
}

#[must_use]
pub fn write_json_with_mkdir<P, T>(filepath: P, data: &T) -> Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let s = serde_json::to_string_pretty(data)
        .map_err(|e| Error::SerializeToJson(filepath.as_ref().to_owned(), e))?;
    write_with_mkdir(filepath, &s)
}

#[must_use]
pub fn copy_file(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<u64> {
    fs::copy(&from, &to).map_err(|e| {
        Error::FromToIO(
            "Cannot copy file",
            from.as_ref().to_owned(),
            to.as_ref().to_owned(),
            e,
        )
    })
}

/// Copy permission bits of `from` onto `to` (like `chmod --reference`).
#[must_use]
pub fn copy_permissions(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
    let (from, to) = (from.as_ref(), to.as_ref());
    let perm = fs::metadata(from)
        .map_err(|e| Error::SingleIO("Cannot read metadata", from.to_owned(), e))?
        .permissions();
    fs::set_permissions(to, perm).map_err(|e| {
        Error::FromToIO("Cannot copy permissions", from.to_owned(), to.to_owned(), e)
    })
}

#[must_use]
pub fn read_dir(dir: impl AsRef<Path>) -> Result<ReadDir> {
    fs::read_dir(&dir).map_err(|e| Error::SingleIO("Cannot read dir", dir.as_ref().to_owned(), e))
}

pub fn canonicalize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    path.canonicalize()
        .map_err(|e| Error::CanonicalizePath(path.to_owned(), e))
}

/// Expand glob `pattern` (relative patterns are resolved against `base_dir`)
/// and return regular files only, sorted by path.
pub fn glob_files(base_dir: impl AsRef<Path>, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = if Path::new(pattern).is_absolute() {
        pattern.to_owned()
    } else {
        let escaped_base = ::glob::Pattern::escape(&base_dir.as_ref().to_string_lossy());
        format!("{}/{}", escaped_base.trim_end_matches('/'), pattern)
    };

    let paths =
        ::glob::glob(&full).map_err(|e| Error::InvalidGlob(pattern.to_owned(), e))?;

    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| Error::GlobEntry(pattern.to_owned(), e))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Normalize the path
/// ```
/// use fsutil::normalize_path;
/// use std::path::Path;
///
/// assert_eq!(normalize_path("./hoge/.config/././foo"), Path::new("hoge/.config/foo"));
/// assert_eq!(normalize_path("hoge/.config/../../bar/."), Path::new("bar"));
/// assert_eq!(normalize_path("../foo/../hello"), Path::new("../hello"));
/// assert_eq!(normalize_path("/"), Path::new("/"));
/// assert_eq!(normalize_path("/foo/"), Path::new("/foo"));
/// assert_eq!(normalize_path("./foo/"), Path::new("foo"));
/// assert_eq!(normalize_path("."), Path::new("."));
/// assert_eq!(normalize_path("./././."), Path::new("."));
/// ```
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    use ::std::path::Component;
    let components = path.as_ref().components();
    let mut stack = Vec::with_capacity(components.size_hint().1.unwrap_or(4));
    for c in components {
        match c {
            Component::CurDir => (),
            Component::ParentDir
                if matches!(stack.last(), Some(Component::Normal(_))) =>
            {
                stack.pop();
            }
            _ => {
                stack.push(c);
            }
        }
    }
    if stack.is_empty() {
        stack.push(Component::CurDir);
    }
    stack.iter().collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn glob_files_sorted_and_files_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["xxxx.txt", "gg.txt", "a.txt", "b.txt", "note.md"] {
            write(dir.path().join(name), "").unwrap();
        }
        mkdir_all(dir.path().join("sub.txt")).unwrap();

        let files = glob_files(dir.path(), "*.txt").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.txt", "b.txt", "gg.txt", "xxxx.txt"]);
    }

    #[test]
    fn glob_files_invalid_pattern() {
        let res = glob_files(".", "[a");
        assert!(matches!(res, Err(Error::InvalidGlob(..))));
    }

    #[test]
    fn remove_file_if_exists_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("out");
        write(&f, "x").unwrap();
        assert_eq!(remove_file_if_exists(&f).unwrap(), true);
        assert_eq!(remove_file_if_exists(&f).unwrap(), false);
    }

    #[cfg(unix)]
    #[test]
    fn copy_permissions_ok() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let (a, b) = (dir.path().join("a"), dir.path().join("b"));
        write(&a, "").unwrap();
        write(&b, "").unwrap();
        fs::set_permissions(&a, fs::Permissions::from_mode(0o640)).unwrap();

        copy_permissions(&a, &b).unwrap();
        let mode = fs::metadata(&b).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}
