//! In-memory entity store.
//!
//! Entities live in per-kind ordered maps so that the default iteration
//! order is ascending key. The whole store can be snapshotted to a file
//! with bincode and reopened later.

use crate::store::{
    Direction, Entity, EntityStore, Key, PropertyDef, StoreError, StoreQuery, StoreResult,
    KEY_PROPERTY,
};
use crate::value::Value;
use log::{info, trace};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

#[derive(Debug, Default, Serialize, Deserialize)]
struct KindData {
    properties: Vec<PropertyDef>,
    entities: BTreeMap<i64, BTreeMap<String, Value>>,
    next_id: i64,
}

impl KindData {
    fn property(&self, kind: &str, name: &str) -> StoreResult<&PropertyDef> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| StoreError::UnknownProperty {
                kind: kind.to_string(),
                property: name.to_string(),
            })
    }

    fn check_indexed(&self, kind: &str, name: &str) -> StoreResult<()> {
        if name == KEY_PROPERTY {
            return Ok(());
        }
        if !self.property(kind, name)?.property_type.is_indexed() {
            return Err(StoreError::NotIndexed {
                kind: kind.to_string(),
                property: name.to_string(),
            });
        }
        Ok(())
    }

    /// Validate and normalize the properties of an entity being written.
    fn prepare(
        &self,
        kind: &str,
        properties: BTreeMap<String, Value>,
    ) -> StoreResult<BTreeMap<String, Value>> {
        let mut prepared = BTreeMap::new();
        for (name, value) in properties {
            let def = self.property(kind, &name)?;
            let actual = value.type_name();
            let value = def.property_type.normalize(value).ok_or_else(|| {
                StoreError::TypeMismatch {
                    kind: kind.to_string(),
                    property: name.clone(),
                    expected: def.property_type.clone(),
                    actual,
                }
            })?;
            prepared.insert(name, value);
        }
        for def in self.properties.iter().filter(|p| p.required) {
            if prepared.get(&def.name).map_or(true, Value::is_null) {
                return Err(StoreError::RequiredProperty {
                    kind: kind.to_string(),
                    property: def.name.clone(),
                });
            }
        }
        Ok(prepared)
    }
}

/// Total order used for filtering and sorting property values.
///
/// Null sorts first. Numbers compare numerically (NaN above every other
/// number, equal only to itself), temporal values compare
/// as datetimes, keys compare by kind then id. Values of unrelated types
/// order by a fixed type rank.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Double(_) => 2,
            Value::String(_) => 3,
            Value::Blob(_) => 4,
            Value::Date(_) | Value::Time(_) | Value::DateTime(_) => 5,
            Value::Key(_) => 6,
        }
    }

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Blob(x), Value::Blob(y)) => x.cmp(y),
        (Value::Key(x), Value::Key(y)) => x.cmp(y),
        _ if rank(a) == 2 && rank(b) == 2 => {
            let x = a.as_f64().unwrap_or_default();
            let y = b.as_f64().unwrap_or_default();
            x.total_cmp(&y)
        }
        _ if rank(a) == 5 && rank(b) == 5 => {
            a.to_comparable_datetime().cmp(&b.to_comparable_datetime())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Entity store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    kinds: RwLock<HashMap<String, KindData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reopen a store from a snapshot written by [`MemoryStore::save`].
    pub fn open(path: &Path) -> StoreResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let kinds: HashMap<String, KindData> = bincode::deserialize_from(reader)?;
        info!("Opened store snapshot {} ({} kinds)", path.display(), kinds.len());
        Ok(Self {
            kinds: RwLock::new(kinds),
        })
    }

    /// Open the snapshot at `path` if it exists, otherwise start empty.
    pub fn open_or_create(path: &Path) -> StoreResult<Self> {
        if path.exists() {
            Self::open(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Write every kind and entity to `path`.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let kinds = self.kinds.read();
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, &*kinds)?;
        info!("Saved store snapshot {} ({} kinds)", path.display(), kinds.len());
        Ok(())
    }

    /// Number of entities of a kind.
    pub fn len(&self, kind: &str) -> usize {
        self.kinds
            .read()
            .get(kind)
            .map_or(0, |data| data.entities.len())
    }
}

impl EntityStore for MemoryStore {
    fn create_kind(&self, kind: &str, properties: &[PropertyDef]) -> StoreResult<()> {
        let mut kinds = self.kinds.write();
        let data = kinds.entry(kind.to_string()).or_insert_with(|| KindData {
            next_id: 1,
            ..KindData::default()
        });
        data.properties = properties.to_vec();
        Ok(())
    }

    fn put(&self, entity: Entity) -> StoreResult<Key> {
        let mut kinds = self.kinds.write();
        let kind = entity.kind().to_string();
        let data = kinds
            .get_mut(&kind)
            .ok_or_else(|| StoreError::KindNotFound(kind.clone()))?;

        let key = entity.key().cloned();
        let properties = data.prepare(&kind, entity.into_properties())?;

        let id = match key {
            Some(key) if key.kind != kind => {
                return Err(StoreError::KindMismatch {
                    expected: kind,
                    actual: key.kind,
                })
            }
            Some(key) => key.id,
            None => {
                let id = data.next_id;
                data.next_id += 1;
                id
            }
        };
        data.entities.insert(id, properties);
        trace!("put {}({})", kind, id);
        Ok(Key::new(kind, id))
    }

    fn get(&self, key: &Key) -> StoreResult<Option<Entity>> {
        let kinds = self.kinds.read();
        let data = kinds
            .get(&key.kind)
            .ok_or_else(|| StoreError::KindNotFound(key.kind.clone()))?;
        Ok(data
            .entities
            .get(&key.id)
            .map(|properties| Entity::with_key(key.clone(), properties.clone())))
    }

    fn delete(&self, key: &Key) -> StoreResult<bool> {
        let mut kinds = self.kinds.write();
        let data = kinds
            .get_mut(&key.kind)
            .ok_or_else(|| StoreError::KindNotFound(key.kind.clone()))?;
        let removed = data.entities.remove(&key.id).is_some();
        trace!("delete {} (removed: {})", key, removed);
        Ok(removed)
    }

    fn query(&self, query: &StoreQuery) -> StoreResult<Vec<Entity>> {
        let kinds = self.kinds.read();
        let kind = query.kind.as_str();
        let data = kinds
            .get(kind)
            .ok_or_else(|| StoreError::KindNotFound(kind.to_string()))?;

        for filter in &query.filters {
            data.check_indexed(kind, &filter.property)?;
        }
        for order in &query.orders {
            data.check_indexed(kind, &order.property)?;
        }

        let mut matched: Vec<(i64, &BTreeMap<String, Value>)> = data
            .entities
            .iter()
            .filter(|(_, props)| {
                query.filters.iter().all(|filter| {
                    let value = props.get(&filter.property).unwrap_or(&Value::Null);
                    filter.op.matches(compare_values(value, &filter.value))
                })
            })
            .map(|(id, props)| (*id, props))
            .collect();

        if !query.orders.is_empty() {
            matched.sort_by(|(a_id, a), (b_id, b)| {
                for order in &query.orders {
                    let ordering = if order.property == KEY_PROPERTY {
                        a_id.cmp(b_id)
                    } else {
                        let x = a.get(&order.property).unwrap_or(&Value::Null);
                        let y = b.get(&order.property).unwrap_or(&Value::Null);
                        compare_values(x, y)
                    };
                    let ordering = match order.direction {
                        Direction::Ascending => ordering,
                        Direction::Descending => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a_id.cmp(b_id)
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(matched
            .into_iter()
            .skip(query.offset)
            .take(limit)
            .map(|(id, props)| Entity::with_key(Key::new(kind, id), props.clone()))
            .collect())
    }
}
