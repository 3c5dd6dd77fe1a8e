use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::RwLock;

use bloodcore_core::HospitalId;

/// Hospital-isolated key/value store abstraction for disposable read models.
pub trait HospitalStore<K, V>: Send + Sync {
    fn get(&self, hospital_id: HospitalId, key: &K) -> Option<V>;
    fn upsert(&self, hospital_id: HospitalId, key: K, value: V);
    fn remove(&self, hospital_id: HospitalId, key: &K);
    fn list(&self, hospital_id: HospitalId) -> Vec<V>;
    /// Clear all read-model records for a hospital (rebuild support).
    fn clear_hospital(&self, hospital_id: HospitalId);
}

impl<K, V, S> HospitalStore<K, V> for Arc<S>
where
    S: HospitalStore<K, V> + ?Sized,
{
    fn get(&self, hospital_id: HospitalId, key: &K) -> Option<V> {
        (**self).get(hospital_id, key)
    }

    fn upsert(&self, hospital_id: HospitalId, key: K, value: V) {
        (**self).upsert(hospital_id, key, value)
    }

    fn remove(&self, hospital_id: HospitalId, key: &K) {
        (**self).remove(hospital_id, key)
    }

    fn list(&self, hospital_id: HospitalId) -> Vec<V> {
        (**self).list(hospital_id)
    }

    fn clear_hospital(&self, hospital_id: HospitalId) {
        (**self).clear_hospital(hospital_id)
    }
}

/// In-memory hospital-isolated store for tests/dev.
///
/// Records live in a per-hospital partition, so `list` and
/// `clear_hospital` operate on one partition without scanning the others.
#[derive(Debug)]
pub struct InMemoryHospitalStore<K, V> {
    partitions: RwLock<HashMap<HospitalId, HashMap<K, V>>>,
}

impl<K, V> InMemoryHospitalStore<K, V> {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryHospitalStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> HospitalStore<K, V> for InMemoryHospitalStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, hospital_id: HospitalId, key: &K) -> Option<V> {
        let partitions = self.partitions.read().ok()?;
        partitions.get(&hospital_id)?.get(key).cloned()
    }

    fn upsert(&self, hospital_id: HospitalId, key: K, value: V) {
        if let Ok(mut partitions) = self.partitions.write() {
            partitions.entry(hospital_id).or_default().insert(key, value);
        }
    }

    fn remove(&self, hospital_id: HospitalId, key: &K) {
        if let Ok(mut partitions) = self.partitions.write() {
            if let Some(partition) = partitions.get_mut(&hospital_id) {
                partition.remove(key);
            }
        }
    }

    fn list(&self, hospital_id: HospitalId) -> Vec<V> {
        let partitions = match self.partitions.read() {
            Ok(p) => p,
            Err(_) => return vec![],
        };

        partitions
            .get(&hospital_id)
            .map(|partition| partition.values().cloned().collect())
            .unwrap_or_default()
    }

    fn clear_hospital(&self, hospital_id: HospitalId) {
        if let Ok(mut partitions) = self.partitions.write() {
            partitions.remove(&hospital_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_scoped_to_their_hospital() {
        let store: InMemoryHospitalStore<&str, u32> = InMemoryHospitalStore::new();
        let first = HospitalId::new();
        let second = HospitalId::new();

        store.upsert(first, "o_neg", 900);
        store.upsert(second, "o_neg", 450);

        assert_eq!(store.get(first, &"o_neg"), Some(900));
        assert_eq!(store.get(second, &"o_neg"), Some(450));
        assert_eq!(store.list(first), vec![900]);
    }

    #[test]
    fn clearing_a_hospital_leaves_the_others_intact() {
        let store: InMemoryHospitalStore<&str, u32> = InMemoryHospitalStore::new();
        let cleared = HospitalId::new();
        let kept = HospitalId::new();

        store.upsert(cleared, "a_pos", 450);
        store.upsert(kept, "a_pos", 450);

        store.clear_hospital(cleared);

        assert!(store.list(cleared).is_empty());
        assert_eq!(store.get(kept, &"a_pos"), Some(450));
    }

    #[test]
    fn remove_deletes_a_single_record() {
        let store: InMemoryHospitalStore<&str, u32> = InMemoryHospitalStore::new();
        let hospital_id = HospitalId::new();

        store.upsert(hospital_id, "b_neg", 450);
        store.upsert(hospital_id, "ab_pos", 900);

        store.remove(hospital_id, &"b_neg");

        assert_eq!(store.get(hospital_id, &"b_neg"), None);
        assert_eq!(store.list(hospital_id), vec![900]);
    }
}
