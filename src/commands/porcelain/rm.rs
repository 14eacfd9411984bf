use crate::areas::repository::Repository;
use crate::artifacts::index::stage::Stage;

impl Repository {
    /// Remove `paths` from the index only; workspace files are untouched
    ///
    /// With a `stage`, only that stage of each path is removed.
    pub fn rm_cached(&mut self, paths: &[String], stage: Option<Stage>) -> anyhow::Result<()> {
        let _lock = self.lock()?;
        self.index_mut().rehydrate()?;

        for path in paths {
            match stage {
                Some(stage) => self.index_mut().remove(path, stage)?,
                None => {
                    self.index_mut().remove_by_path(path)?;
                }
            }
            writeln!(self.writer(), "rm '{path}'")?;
        }

        self.index_mut().write_updates()?;

        Ok(())
    }
}
