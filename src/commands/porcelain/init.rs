use crate::areas::repository::Repository;
use anyhow::Context;
use std::fs;

const DEFAULT_BRANCH: &str = "master";

impl Repository {
    /// Lay out `.git` so both bit and git recognize the repository
    ///
    /// Running it again on an existing repository leaves stored objects,
    /// the index and HEAD untouched.
    pub fn init(&mut self) -> anyhow::Result<()> {
        fs::create_dir_all(self.database().objects_path())
            .context("Failed to create .git/objects directory")?;

        fs::create_dir_all(self.git_path().join("refs").join("heads"))
            .context("Failed to create .git/refs/heads directory")?;

        let head_path = self.git_path().join("HEAD");
        if !head_path.exists() {
            fs::write(&head_path, format!("ref: refs/heads/{DEFAULT_BRANCH}\n"))
                .context("Failed to create initial HEAD reference")?;
        }

        writeln!(
            self.writer(),
            "Initialized empty Git repository in {}",
            self.git_path().display()
        )?;

        Ok(())
    }
}
