use crate::artifacts::index::index_entry::EntryMetadata;
use crate::errors::{Error, IoContext, Result};
use bytes::Bytes;
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const IGNORED_PATHS: [&str; 3] = [".git", ".", ".."];

/// The working directory the index stages files from
///
/// All paths handed to the workspace are repository-relative strings with
/// `/` separators, the same form the index stores.
#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the content to be hashed for `file_path`
    ///
    /// Symlinks are not followed: their content is the link target.
    pub fn read_file(&self, file_path: &str) -> Result<Bytes> {
        let absolute_path = self.path.join(file_path);
        let metadata = self.lstat(file_path)?;

        if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(&absolute_path).io_context(|| {
                format!("Unable to read symlink {}", absolute_path.display())
            })?;
            return Ok(Bytes::copy_from_slice(target.as_os_str().as_bytes()));
        }

        if metadata.is_dir() {
            return Err(Error::NotAFile(PathBuf::from(file_path)));
        }

        std::fs::read(&absolute_path)
            .map(Bytes::from)
            .map_err(|err| Self::not_found_or(file_path, err, "Unable to read file"))
    }

    pub fn stat_file(&self, file_path: &str) -> Result<EntryMetadata> {
        let metadata = self.lstat(file_path)?;
        let absolute_path = self.path.join(file_path);

        (absolute_path.as_path(), &metadata).try_into()
    }

    /// List the files under `root_file_path`, or `root_file_path` itself if it is a file
    ///
    /// Returned paths are repository-relative, `/`-separated and sorted.
    pub fn list_files(&self, root_file_path: &str) -> Result<Vec<String>> {
        let absolute_path = self.path.join(root_file_path);
        let metadata = self.lstat(root_file_path)?;

        if !metadata.is_dir() {
            return Ok(vec![self.to_repo_path(&absolute_path)?]);
        }

        let mut files = WalkDir::new(&absolute_path)
            .into_iter()
            .filter_entry(|entry| {
                let relative = entry.path().strip_prefix(&self.path).unwrap_or(entry.path());
                !Self::is_ignored(relative)
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| !entry.file_type().is_dir())
            .map(|entry| self.to_repo_path(entry.path()))
            .collect::<Result<Vec<_>>>()?;
        files.sort();

        Ok(files)
    }

    /// Turn a path inside the workspace into its index form
    pub fn to_repo_path(&self, path: &Path) -> Result<String> {
        let relative = path.strip_prefix(&self.path).unwrap_or(path);

        let components = relative
            .components()
            .filter(|component| !matches!(component, Component::CurDir))
            .map(|component| match component {
                Component::Normal(name) => name.to_str().ok_or_else(|| Error::InvalidPath {
                    path: relative.display().to_string(),
                    reason: "not valid UTF-8",
                }),
                _ => Err(Error::InvalidPath {
                    path: relative.display().to_string(),
                    reason: "outside of the repository",
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(components.join("/"))
    }

    fn is_ignored(path: &Path) -> bool {
        path.components().any(|component| {
            if let Component::Normal(name) = component {
                let name_str = name.to_string_lossy();
                IGNORED_PATHS.contains(&name_str.as_ref())
            } else {
                false
            }
        })
    }

    fn lstat(&self, file_path: &str) -> Result<std::fs::Metadata> {
        self.check_parents(file_path)?;

        std::fs::symlink_metadata(self.path.join(file_path))
            .map_err(|err| Self::not_found_or(file_path, err, "Unable to stat file"))
    }

    /// Refuse paths that reach through a symlinked directory
    ///
    /// Missing parents are left for the final stat to report.
    fn check_parents(&self, file_path: &str) -> Result<()> {
        let mut parent = self.path.to_path_buf();
        let mut components = Path::new(file_path).components().peekable();

        while let Some(component) = components.next() {
            if components.peek().is_none() {
                break;
            }
            parent.push(component);

            if let Ok(metadata) = std::fs::symlink_metadata(&parent)
                && metadata.file_type().is_symlink()
            {
                return Err(Error::InvalidPath {
                    path: file_path.to_string(),
                    reason: "beyond a symbolic link",
                });
            }
        }

        Ok(())
    }

    fn not_found_or(file_path: &str, err: std::io::Error, context: &str) -> Error {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(PathBuf::from(file_path)),
            _ => Error::Io {
                context: format!("{context} {file_path}"),
                source: err,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_file_content_as_bytes() {
        let dir = TempDir::new().unwrap();
        dir.child("lame.name.txt").write_str("new_file\n").unwrap();
        let workspace = Workspace::new(dir.path().into());

        assert_eq!(
            workspace.read_file("lame.name.txt").unwrap(),
            Bytes::from_static(b"new_file\n")
        );
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path().into());

        assert!(matches!(
            workspace.read_file("missing.txt"),
            Err(Error::FileNotFound(_))
        ));
        assert!(matches!(
            workspace.stat_file("missing.txt"),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn symlinks_read_as_their_target() {
        let dir = TempDir::new().unwrap();
        dir.child("target.txt").write_str("content").unwrap();
        dir.child("link").symlink_to_file("target.txt").unwrap();
        let workspace = Workspace::new(dir.path().into());

        assert_eq!(
            workspace.read_file("link").unwrap(),
            Bytes::from_static(b"target.txt")
        );
        assert_eq!(workspace.stat_file("link").unwrap().mode, EntryMode::Symlink);
    }

    #[test]
    fn stats_regular_files() {
        let dir = TempDir::new().unwrap();
        dir.child("a.txt").write_str("12345").unwrap();
        let workspace = Workspace::new(dir.path().into());

        let stat = workspace.stat_file("a.txt").unwrap();

        assert_eq!(stat.size, 5);
        assert_eq!(stat.mode, EntryMode::File(FileMode::Regular));
    }

    #[test]
    fn lists_nested_files_skipping_git_dir() {
        let dir = TempDir::new().unwrap();
        dir.child("b.txt").write_str("b").unwrap();
        dir.child("src/a.rs").write_str("a").unwrap();
        dir.child(".git/index").write_str("").unwrap();
        let workspace = Workspace::new(dir.path().into());

        assert_eq!(
            workspace.list_files(".").unwrap(),
            vec![String::from("b.txt"), String::from("src/a.rs")]
        );
        assert_eq!(
            workspace.list_files("src/a.rs").unwrap(),
            vec![String::from("src/a.rs")]
        );
    }

    #[test]
    fn paths_through_symlinked_directories_are_rejected() {
        let outside = TempDir::new().unwrap();
        outside.child("secret.txt").write_str("secret").unwrap();
        let dir = TempDir::new().unwrap();
        dir.child("link").symlink_to_dir(outside.path()).unwrap();
        let workspace = Workspace::new(dir.path().into());

        assert!(matches!(
            workspace.read_file("link/secret.txt"),
            Err(Error::InvalidPath { .. })
        ));
        assert!(matches!(
            workspace.stat_file("link/secret.txt"),
            Err(Error::InvalidPath { .. })
        ));
        assert_eq!(workspace.stat_file("link").unwrap().mode, EntryMode::Symlink);
    }
}
