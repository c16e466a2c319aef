use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use super::StorageBackend;
use crate::{
    err::{Error, Result},
    util::{from_hex, to_hex},
};

const SUFFIX: &str = ".rev";

/// One file per key under a root directory. File names are the hex of the
/// key; writes go through a temporary file and a rename so a reader never
/// sees half a value.
#[derive(Debug)]
pub struct FileSystem {
    root: PathBuf,
}

impl FileSystem {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| Error::from_msg_err("failed to create store directory", &e))?;
        Ok(Self { root })
    }

    fn path_of(&self, key: &[u8]) -> PathBuf {
        self.root.join(format!("{}{}", to_hex(key), SUFFIX))
    }
}

impl StorageBackend for FileSystem {
    fn put_batch<I, K, V>(&mut self, iter: I) -> Result<()>
    where
        I: Iterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        for (key, value) in iter {
            let path = self.path_of(key.as_ref());
            let tmp = path.with_extension("tmp");
            fs::write(&tmp, value.as_ref())
                .map_err(|e| Error::from_msg_err("failed to write value file", &e))?;
            fs::rename(&tmp, &path)
                .map_err(|e| Error::from_msg_err("failed to move value file into place", &e))?;
        }
        Ok(())
    }

    fn get<K>(&self, key: K) -> Result<Option<Vec<u8>>>
    where
        K: AsRef<[u8]>,
    {
        match fs::read(self.path_of(key.as_ref())) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::from_msg_err("failed to read value file", &e)),
        }
    }

    fn delete<K>(&mut self, key: K) -> Result<()>
    where
        K: AsRef<[u8]>,
    {
        fs::remove_file(self.path_of(key.as_ref()))
            .map_err(|e| Error::from_msg_err("failed to delete value file", &e))
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| Error::from_msg_err("failed to list store directory", &e))?;
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::from_msg_err("failed to list store directory", &e))?;
            let name = entry.file_name();
            let Some(hex) = name.to_str().and_then(|n| n.strip_suffix(SUFFIX)) else {
                continue;
            };
            match from_hex(hex) {
                Some(key) => keys.push(key),
                None => log::warn!("skipping foreign file {:?} in store", name),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_file_system_storage() {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let mut storage = FileSystem::new(temp_dir.path().join("store")).unwrap();

        storage
            .put_batch(vec![(b"key1", b"value1"), (b"key2", b"value2")].into_iter())
            .unwrap();
        assert_eq!(storage.get(b"key1").unwrap().unwrap(), b"value1");
        assert_eq!(storage.get(b"key2").unwrap().unwrap(), b"value2");
        assert!(storage.get(b"nonexistent_key").unwrap().is_none());

        storage.put("revisions/6/5", b"chain").unwrap();
        let keys = storage.keys().unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&b"revisions/6/5".to_vec()));

        storage.delete(b"key1").unwrap();
        assert!(storage.get(b"key1").unwrap().is_none());
        assert!(storage.delete(b"key1").is_err());

        fs::write(temp_dir.path().join("store").join("notes.txt"), "x").unwrap();
        assert_eq!(storage.keys().unwrap().len(), 2);

        temp_dir.close().expect("Failed to clean up temp directory");
    }
}
