use std::collections::BTreeMap;

use super::StorageBackend;
use crate::err::{Error, Result};

#[derive(Debug, Default)]
pub struct Memory {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for Memory {
    fn put_batch<I, K, V>(&mut self, iter: I) -> Result<()>
    where
        I: Iterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        for (key, value) in iter {
            self.map
                .insert(key.as_ref().to_vec(), value.as_ref().to_vec());
        }
        Ok(())
    }

    fn get<K>(&self, key: K) -> Result<Option<Vec<u8>>>
    where
        K: AsRef<[u8]>,
    {
        Ok(self.map.get(key.as_ref()).cloned())
    }

    fn delete<K>(&mut self, key: K) -> Result<()>
    where
        K: AsRef<[u8]>,
    {
        let key_bytes = key.as_ref();
        self.map
            .remove(key_bytes)
            .map(|_| ())
            .ok_or_else(|| Error::Storage(format!("key {:?} not exists in Memory storage", key_bytes)))
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self.map.keys().cloned().collect())
    }
}
