use crate::err::Result;

mod fs;
mod mem;
mod repository;

pub use fs::FileSystem;
pub use mem::Memory;
pub use repository::{Repository, encode_chain};

/// Byte key/value store the revision repository sits on.
pub trait StorageBackend {
    fn put_batch<I, K, V>(&mut self, iter: I) -> Result<()>
    where
        I: Iterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>;

    fn put<K, V>(&mut self, key: K, value: V) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        self.put_batch(std::iter::once((key, value)))
    }

    /// `None` when the key was never written or has been deleted.
    fn get<K>(&self, key: K) -> Result<Option<Vec<u8>>>
    where
        K: AsRef<[u8]>;

    fn delete<K>(&mut self, key: K) -> Result<()>
    where
        K: AsRef<[u8]>;

    fn keys(&self) -> Result<Vec<Vec<u8>>>;
}
