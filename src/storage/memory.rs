use dashmap::DashMap;

/// In-memory key-value map owned by one worker.
///
/// The store has no notion of shards or replicas: it only knows the keys the
/// orchestrator has sent to it.
#[derive(Default)]
pub struct WorkerStore {
    data: DashMap<String, String>,
}

impl WorkerStore {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.data.get(key).map(|value| value.clone())
    }

    /// Stores `value`, returning the value it replaced.
    pub fn put(&self, key: &str, value: &str) -> Option<String> {
        self.data.insert(key.to_string(), value.to_string())
    }

    /// Removes `key`, returning its prior value.
    pub fn delete(&self, key: &str) -> Option<String> {
        self.data.remove(key).map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }
}
