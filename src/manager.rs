//! Serialised appends and snapshot reads over stored revision chains.
//!
//! Each content item gets a slot holding its current chain behind an `Arc`.
//! Appends to one item take that slot's append lock, build the new chain
//! off to the side, persist it and only then swap the `Arc`. Readers clone
//! the `Arc` and never wait for an append in progress: they see the chain
//! either before or after a revision, never half of one.
//!
//! Backends take `&mut self`, so the final write of every chain and the
//! first load of a chain share one repository lock. Diffing and encoding
//! happen before it is taken.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, RwLock},
};

use rayon::prelude::*;

use crate::{
    compress::CompressionType,
    diff::Granularity,
    err::{Error, Result},
    object::{ContentKey, RevisionBuilder, RevisionChain, RevisionId, RevisionRecord, Snapshot, Timestamp},
    storage::{Repository, StorageBackend, encode_chain},
};

struct ChainSlot {
    append: Mutex<()>,
    current: RwLock<Arc<RevisionChain>>,
}

impl ChainSlot {
    fn new(chain: RevisionChain) -> Self {
        Self {
            append: Mutex::new(()),
            current: RwLock::new(Arc::new(chain)),
        }
    }

    fn snapshot(&self) -> Arc<RevisionChain> {
        match self.current.read() {
            Ok(chain) => Arc::clone(&chain),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn publish(&self, chain: RevisionChain) {
        let chain = Arc::new(chain);
        match self.current.write() {
            Ok(mut current) => *current = chain,
            Err(poisoned) => *poisoned.into_inner() = chain,
        }
    }
}

/// A new revision to record for one content item.
#[derive(Debug, Clone)]
pub struct Commit {
    pub snapshot: Snapshot,
    pub author_id: Option<i64>,
    pub timestamp: Timestamp,
}

impl Commit {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            author_id: None,
            timestamp: Timestamp::now(),
        }
    }
}

pub struct RevisionManager<B: StorageBackend> {
    repository: Mutex<Repository<B>>,
    compression: CompressionType,
    slots: RwLock<HashMap<ContentKey, Arc<ChainSlot>>>,
    granularity: Granularity,
}

impl<B: StorageBackend> RevisionManager<B> {
    pub fn new(repository: Repository<B>, granularity: Granularity) -> Self {
        Self {
            compression: repository.compression(),
            repository: Mutex::new(repository),
            slots: RwLock::new(HashMap::new()),
            granularity,
        }
    }

    fn repository(&self) -> Result<MutexGuard<'_, Repository<B>>> {
        self.repository
            .lock()
            .map_err(|_| Error::Storage("repository lock poisoned".to_string()))
    }

    fn slot(&self, key: ContentKey) -> Result<Arc<ChainSlot>> {
        if let Some(slot) = self
            .slots
            .read()
            .map_err(|_| Error::Storage("slot table lock poisoned".to_string()))?
            .get(&key)
        {
            return Ok(Arc::clone(slot));
        }
        let chain = self.repository()?.load(key)?;
        let mut slots = self
            .slots
            .write()
            .map_err(|_| Error::Storage("slot table lock poisoned".to_string()))?;
        // Another thread may have loaded it meanwhile; keep whichever came first.
        Ok(Arc::clone(
            slots
                .entry(key)
                .or_insert_with(|| Arc::new(ChainSlot::new(chain))),
        ))
    }

    /// Current chain of `key`. The returned value is immutable and stays
    /// valid while later revisions are appended.
    pub fn chain(&self, key: ContentKey) -> Result<Arc<RevisionChain>> {
        Ok(self.slot(key)?.snapshot())
    }

    /// Records `commit` as the new head of `key`'s chain. Returns `None`
    /// when the text equals the current head and nothing was written.
    pub fn commit(&self, key: ContentKey, commit: Commit) -> Result<Option<RevisionRecord>> {
        let slot = self.slot(key)?;
        let _append = slot
            .append
            .lock()
            .map_err(|_| Error::Storage(format!("append lock of {} poisoned", key)))?;
        let current = slot.snapshot();

        let mut builder = RevisionBuilder::new(key)
            .snapshot(commit.snapshot)
            .created(commit.timestamp)
            .granularity(self.granularity);
        if let Some(author_id) = commit.author_id {
            builder = builder.author(author_id);
        }
        let record = match current.head() {
            None => builder.build_root(current.next_id()?)?,
            Some(head) => {
                let record = builder.build_next(head, current.next_id()?)?;
                if record.diffs().is_noop() {
                    log::debug!("{}: unchanged since {}, nothing to commit", key, head.id());
                    return Ok(None);
                }
                record
            }
        };

        let mut next = (*current).clone();
        next.append(record.clone())?;
        let packed = encode_chain(&next, self.compression)?;
        self.repository()?.put_packed(key, packed)?;
        slot.publish(next);
        log::info!(
            "{}: committed revision {} (+{} -{})",
            key,
            record.id(),
            record.total_additions(),
            record.total_deletions()
        );
        Ok(Some(record))
    }

    pub fn reconstruct(&self, key: ContentKey, id: RevisionId) -> Result<Snapshot> {
        self.chain(key)?.reconstruct(id)
    }

    /// Latest text of `key`, or `None` if it has no revisions.
    pub fn latest(&self, key: ContentKey) -> Result<Option<Snapshot>> {
        let chain = self.chain(key)?;
        match chain.head() {
            Some(head) => chain.reconstruct(head.id()).map(Some),
            None => Ok(None),
        }
    }

    /// Every content item in the repository.
    pub fn contents(&self) -> Result<Vec<ContentKey>> {
        self.repository()?.contents()
    }
}

impl<B: StorageBackend + Send> RevisionManager<B> {
    /// Validates the chains of `keys` in parallel.
    pub fn verify_all(&self, keys: &[ContentKey]) -> Vec<(ContentKey, Result<()>)> {
        keys.par_iter()
            .map(|&key| {
                let result = self.chain(key).and_then(|chain| chain.validate());
                if let Err(e) = &result {
                    if e.is_defect() {
                        log::error!("{}: {}", key, e);
                    } else {
                        log::warn!("{}: {}", key, e);
                    }
                }
                (key, result)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::storage::Memory;

    fn manager() -> RevisionManager<Memory> {
        RevisionManager::new(
            Repository::new(Memory::new(), CompressionType::Zlib),
            Granularity::Word,
        )
    }

    fn snap(content: &str) -> Snapshot {
        Snapshot::new("A test post", "", content)
    }

    #[test]
    fn test_commit_and_reconstruct() {
        let manager = manager();
        let key = ContentKey::new(6, 5);
        let v1 = manager.commit(key, Commit::new(snap("v1"))).unwrap().unwrap();
        let v2 = manager.commit(key, Commit::new(snap("v2"))).unwrap().unwrap();
        let v3 = manager.commit(key, Commit::new(snap("v3"))).unwrap().unwrap();
        assert!(v1.is_root());
        assert_eq!(v2.parent(), Some(v1.id()));
        assert_eq!(v3.parent(), Some(v2.id()));
        assert_eq!(manager.reconstruct(key, v2.id()).unwrap(), snap("v2"));
        assert_eq!(manager.latest(key).unwrap(), Some(snap("v3")));
        assert!(matches!(
            manager.reconstruct(key, RevisionId(99)),
            Err(Error::UnknownRevision(_))
        ));
    }

    #[test]
    fn test_unchanged_commit_is_skipped() {
        let manager = manager();
        let key = ContentKey::new(6, 5);
        manager.commit(key, Commit::new(snap("v1"))).unwrap().unwrap();
        assert!(manager.commit(key, Commit::new(snap("v1"))).unwrap().is_none());
        assert_eq!(manager.chain(key).unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_is_stable_across_appends() {
        let manager = manager();
        let key = ContentKey::new(6, 5);
        manager.commit(key, Commit::new(snap("v1"))).unwrap();
        let before = manager.chain(key).unwrap();
        manager.commit(key, Commit::new(snap("v2"))).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(manager.chain(key).unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_commits_stay_linear() {
        let manager = manager();
        let key = ContentKey::new(6, 5);
        thread::scope(|s| {
            for t in 0..8 {
                let manager = &manager;
                s.spawn(move || {
                    for i in 0..10 {
                        let mut commit = Commit::new(snap(&format!("writer {} edit {}", t, i)));
                        commit.author_id = Some(t);
                        manager.commit(key, commit).unwrap();
                    }
                });
            }
        });
        let chain = manager.chain(key).unwrap();
        chain.validate().unwrap();
        assert!(chain.len() > 1);
        let stored = manager.repository().unwrap().load(key).unwrap();
        assert_eq!(stored.records(), chain.records());
    }

    #[test]
    fn test_verify_all() {
        let manager = manager();
        let keys: Vec<_> = (0..16).map(|i| ContentKey::new(6, i)).collect();
        for &key in &keys {
            manager.commit(key, Commit::new(snap("v1"))).unwrap();
            manager.commit(key, Commit::new(snap(&format!("v2 of {}", key)))).unwrap();
        }
        assert_eq!(manager.contents().unwrap().len(), keys.len());
        let results = manager.verify_all(&keys);
        assert_eq!(results.len(), keys.len());
        assert!(results.iter().all(|(_, r)| r.is_ok()));
    }
}
