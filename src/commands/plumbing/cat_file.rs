use crate::areas::repository::Repository;

/// What `cat-file` prints about the object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatFileMode {
    /// The object content
    #[default]
    Pretty,
    /// The object type tag
    Type,
    /// The content size in bytes
    Size,
}

impl Repository {
    pub fn cat_file(&mut self, object_id: &str, mode: CatFileMode) -> anyhow::Result<()> {
        let object_id = self.database().resolve_prefix(object_id)?;

        match mode {
            CatFileMode::Pretty => {
                let object = self.database().read_object(&object_id)?;
                self.writer().write_all(&object.content)?;
            }
            CatFileMode::Type => {
                let header = self.database().read_header(&object_id)?;
                writeln!(self.writer(), "{}", header.object_type)?;
            }
            CatFileMode::Size => {
                let header = self.database().read_header(&object_id)?;
                writeln!(self.writer(), "{}", header.size)?;
            }
        }

        Ok(())
    }
}
