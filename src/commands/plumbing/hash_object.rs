use crate::areas::repository::Repository;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;

impl Repository {
    pub fn hash_object(&mut self, object_path: &str, write: bool) -> anyhow::Result<()> {
        let object_data = self.workspace().read_file(object_path)?;
        let object = Blob::new(object_data);

        let object_id = match write {
            true => self.database().store(&object)?,
            false => object.object_id(self.database().format())?,
        };

        writeln!(self.writer(), "{object_id}")?;

        Ok(())
    }
}
