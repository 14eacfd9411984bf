use crate::areas::repository::Repository;
use anyhow::Context;

impl Repository {
    /// Stage every file named by `paths`, expanding directories
    ///
    /// Nothing is written unless every path could be staged.
    pub fn add(&mut self, paths: &[String]) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        // Load the index file from the disk
        self.index_mut().rehydrate()?;

        let files = paths
            .iter()
            .map(|path| {
                self.workspace()
                    .list_files(path)
                    .with_context(|| format!("pathspec '{path}' did not match any files"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
            .into_iter()
            .flatten();

        for file in files {
            self.add_by_path(&file)?;
        }

        self.index_mut().write_updates()?;

        Ok(())
    }
}
