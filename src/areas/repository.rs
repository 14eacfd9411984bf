use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::workspace::Workspace;
use crate::artifacts::objects::object_format::ObjectFormat;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{IoContext, Result};
use file_guard::FileGuard;
use std::cell::{RefCell, RefMut};
use std::fs::File;
use std::path::Path;

const GIT_DIR: &str = ".git";
const LOCK_FILE: &str = "bit.lock";

/// Settings that shape a repository's storage
#[derive(Debug, Clone, Copy)]
pub struct RepositoryOptions {
    pub object_format: ObjectFormat,
    pub compression: flate2::Compression,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        RepositoryOptions {
            object_format: ObjectFormat::default(),
            compression: flate2::Compression::default(),
        }
    }
}

/// Exclusive hold on the repository for the duration of a mutating command
///
/// Released when dropped.
pub struct RepositoryLock {
    _guard: FileGuard<Box<File>>,
}

pub struct Repository {
    path: Box<Path>,
    git_path: Box<Path>,
    writer: RefCell<Box<dyn std::io::Write>>,
    index: Index,
    database: Database,
    workspace: Workspace,
}

impl Repository {
    pub fn new(
        path: &Path,
        options: RepositoryOptions,
        writer: Box<dyn std::io::Write>,
    ) -> anyhow::Result<Self> {
        if !path.exists() {
            std::fs::create_dir_all(path)?;
        }
        let path = path.canonicalize()?;
        let git_path = path.join(GIT_DIR);

        let index = Index::new(
            git_path.join("index").into_boxed_path(),
            options.object_format,
        );
        let database = Database::new(
            git_path.join("objects").into_boxed_path(),
            options.object_format,
            options.compression,
        );
        let workspace = Workspace::new(path.clone().into_boxed_path());

        Ok(Repository {
            path: path.into_boxed_path(),
            git_path: git_path.into_boxed_path(),
            writer: RefCell::new(writer),
            index,
            database,
            workspace,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_path(&self) -> &Path {
        &self.git_path
    }

    pub fn writer(&'_ self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut Index {
        &mut self.index
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Stage one workspace file; see [`Index::add_by_path`]
    pub fn add_by_path(&mut self, path: &str) -> Result<ObjectId> {
        self.index
            .add_by_path(path, &self.workspace, &self.database)
    }

    /// Take the repository-wide writer lock, blocking until it is free
    ///
    /// Readers are never blocked: the index is replaced by rename, so a
    /// concurrent reader sees either the old or the new file.
    pub fn lock(&self) -> Result<RepositoryLock> {
        let lock_path = self.git_path.join(LOCK_FILE);
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .io_context(|| format!("Unable to open lock file {}", lock_path.display()))?;

        let guard = file_guard::lock(Box::new(lock_file), file_guard::Lock::Exclusive, 0, 1)
            .io_context(|| format!("Unable to lock {}", lock_path.display()))?;

        Ok(RepositoryLock { _guard: guard })
    }
}
