use bincode::{decode_from_slice, encode_to_vec};

use super::StorageBackend;
use crate::{
    compress::CompressionType,
    err::{Error, Result},
    object::{ContentKey, RevisionChain, RevisionRecord},
    util::create_bincode_config,
};

/// Revision chains on top of a key/value backend. Each content item's chain
/// is one value: its records in append order, bincode encoded and packed.
pub struct Repository<B: StorageBackend> {
    backend: B,
    compression: CompressionType,
}

impl<B: StorageBackend> Repository<B> {
    pub fn new(backend: B, compression: CompressionType) -> Self {
        Self {
            backend,
            compression,
        }
    }

    /// The stored chain of `key`, or an empty one if nothing was saved yet.
    pub fn load(&self, key: ContentKey) -> Result<RevisionChain> {
        let records = match self.backend.get(key.storage_key())? {
            Some(packed) => decode_records(&packed)?,
            None => Vec::new(),
        };
        log::debug!("loaded {} revisions of {}", records.len(), key);
        RevisionChain::from_records(key, records)
    }

    /// Appends `record` to its chain. The record must extend the stored head.
    pub fn save(&mut self, record: &RevisionRecord) -> Result<()> {
        let mut chain = self.load(record.key())?;
        chain.append(record.clone())?;
        self.write(&chain)
    }

    /// Replaces the stored chain wholesale.
    pub fn write(&mut self, chain: &RevisionChain) -> Result<()> {
        let packed = encode_chain(chain, self.compression)?;
        self.put_packed(chain.key(), packed)
    }

    /// Stores a value produced by [`encode_chain`] as `key`'s chain.
    pub fn put_packed(&mut self, key: ContentKey, packed: Vec<u8>) -> Result<()> {
        self.backend.put(key.storage_key(), packed)
    }

    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    /// Every content item with a stored chain.
    pub fn contents(&self) -> Result<Vec<ContentKey>> {
        Ok(self
            .backend
            .keys()?
            .iter()
            .filter_map(|key| ContentKey::from_storage_key(key))
            .collect())
    }
}

/// Encodes a chain's records and packs them into one stored value.
pub fn encode_chain(chain: &RevisionChain, compression: CompressionType) -> Result<Vec<u8>> {
    let encoded = encode_to_vec(chain.records(), create_bincode_config()).map_err(Error::codec)?;
    let packed = compression.pack(&encoded)?;
    log::trace!(
        "{}: {} revisions, {} bytes encoded, {} bytes packed ({})",
        chain.key(),
        chain.len(),
        encoded.len(),
        packed.len(),
        compression
    );
    Ok(packed)
}

fn decode_records(packed: &[u8]) -> Result<Vec<RevisionRecord>> {
    let encoded = CompressionType::unpack(packed)?;
    let (records, _): (Vec<RevisionRecord>, usize) =
        decode_from_slice(&encoded, create_bincode_config()).map_err(Error::codec)?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        object::{RevisionId, Snapshot, Timestamp},
        storage::{FileSystem, Memory},
    };

    fn key() -> ContentKey {
        ContentKey::new(6, 5)
    }

    fn revisions() -> Vec<RevisionRecord> {
        let ts = Timestamp::parse("2018-09-04 12:19:34Z").unwrap();
        let v1 = RevisionRecord::build_root(
            RevisionId(1),
            key(),
            Snapshot::new("A test post", "", "Bunch of content here"),
            ts,
        )
        .unwrap();
        let v2 = RevisionRecord::build_next(
            &v1,
            key(),
            Snapshot::new("A test post", "excerpt", "Bunch of other content here"),
            ts,
        )
        .unwrap();
        vec![v1, v2]
    }

    #[test]
    fn test_load_missing_is_empty() {
        let repo = Repository::new(Memory::new(), CompressionType::Zlib);
        let chain = repo.load(key()).unwrap();
        assert!(chain.is_empty());
        assert!(repo.contents().unwrap().is_empty());
    }

    #[test]
    fn test_save_load() {
        for compression in [CompressionType::Zlib, CompressionType::LZ4, CompressionType::No] {
            let mut repo = Repository::new(Memory::new(), compression);
            for record in revisions() {
                repo.save(&record).unwrap();
            }
            let chain = repo.load(key()).unwrap();
            assert_eq!(chain.records(), revisions().as_slice());
            assert_eq!(
                chain.reconstruct(RevisionId(2)).unwrap().content,
                "Bunch of other content here"
            );
            assert_eq!(repo.contents().unwrap(), vec![key()]);
        }
    }

    #[test]
    fn test_save_rejects_gap() {
        let mut repo = Repository::new(Memory::new(), CompressionType::Gzip);
        let records = revisions();
        assert!(matches!(repo.save(&records[1]), Err(Error::BrokenChain(_))));
        repo.save(&records[0]).unwrap();
        assert!(matches!(repo.save(&records[0]), Err(Error::BrokenChain(_))));
        assert_eq!(repo.load(key()).unwrap().len(), 1);
    }

    #[test]
    fn test_file_system_repository() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        {
            let mut repo =
                Repository::new(FileSystem::new(temp_dir.path()).unwrap(), CompressionType::Zlib);
            for record in revisions() {
                repo.save(&record).unwrap();
            }
        }
        let repo = Repository::new(FileSystem::new(temp_dir.path()).unwrap(), CompressionType::No);
        let chain = repo.load(key()).unwrap();
        chain.validate().unwrap();
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_put_packed() {
        let mut chain = RevisionChain::new(key());
        for record in revisions() {
            chain.append(record).unwrap();
        }
        let mut repo = Repository::new(Memory::new(), CompressionType::Gzip);
        let packed = encode_chain(&chain, CompressionType::LZ4).unwrap();
        repo.put_packed(key(), packed).unwrap();
        assert_eq!(repo.load(key()).unwrap().records(), chain.records());
    }

    #[test]
    fn test_corrupt_blob() {
        let mut memory = Memory::new();
        memory.put(key().storage_key(), [2u8, 0, 0]).unwrap();
        let repo = Repository::new(memory, CompressionType::Zlib);
        assert!(repo.load(key()).is_err());
    }
}
