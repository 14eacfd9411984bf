use crate::areas::repository::Repository;

impl Repository {
    pub fn ls_files(&mut self, show_stage: bool) -> anyhow::Result<()> {
        self.index_mut().rehydrate()?;

        for entry in self.index().entries() {
            if show_stage {
                writeln!(
                    self.writer(),
                    "{} {} {}\t{}",
                    entry.mode(),
                    entry.oid,
                    entry.stage,
                    entry.path
                )?;
            } else {
                writeln!(self.writer(), "{}", entry.path)?;
            }
        }

        Ok(())
    }
}
