//! A map type implemented as a list of key/value pairs kept in insertion order.
//!
//! Enumeration order of block, variable, and comment maps is observable
//! behavior in this vm (script start order follows the order entries appear
//! in the project file), so the general-purpose collection used for them must
//! never reorder. For the small maps the vm deals in (inputs, fields, symbol
//! tables) a linear scan is also faster in practice than a hashed or ordered
//! structure.

use std::borrow::Borrow;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct Entry<K, V> {
    pub key: K,
    pub value: V,
}

/// An insertion-ordered map. Lookups are `O(n)`, insertions are `O(1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct VecMap<K: Eq, V> {
    values: Vec<Entry<K, V>>,
}
impl<K: Eq, V> VecMap<K, V> {
    /// Creates a new, empty map.
    pub fn new() -> Self {
        Self { values: vec![] }
    }
    /// Creates a new, empty map with the specified capacity.
    pub fn with_capacity(cap: usize) -> Self {
        Self { values: Vec::with_capacity(cap) }
    }
    /// Gets an immutable reference to a stored value, if it exists.
    pub fn get<Q: ?Sized + Eq>(&self, key: &Q) -> Option<&V> where K: Borrow<Q> {
        self.values.iter().find(|x| x.key.borrow() == key).map(|x| &x.value)
    }
    /// Gets a mutable reference to a stored value, if it exists.
    pub fn get_mut<Q: ?Sized + Eq>(&mut self, key: &Q) -> Option<&mut V> where K: Borrow<Q> {
        self.values.iter_mut().find(|x| x.key.borrow() == key).map(|x| &mut x.value)
    }
    /// Checks if the map contains the given key.
    pub fn contains_key<Q: ?Sized + Eq>(&self, key: &Q) -> bool where K: Borrow<Q> {
        self.values.iter().any(|x| x.key.borrow() == key)
    }
    /// Inserts a new value into the map, appending it to the enumeration order.
    /// If an entry with the same key already exists, the previous value is replaced
    /// in place (keeping its position) and returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.get_mut(&key) {
            Some(x) => Some(std::mem::replace(x, value)),
            None => {
                self.values.push(Entry { key, value });
                None
            }
        }
    }
    /// Removes an entry from the map, preserving the order of the remaining entries.
    pub fn remove<Q: ?Sized + Eq>(&mut self, key: &Q) -> Option<V> where K: Borrow<Q> {
        let i = self.values.iter().position(|x| x.key.borrow() == key)?;
        Some(self.values.remove(i).value)
    }
    /// Gets the number of values stored in the map.
    pub fn len(&self) -> usize {
        self.values.len()
    }
    /// Checks if the map is currently empty (no values).
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    /// Removes all entries from the map.
    pub fn clear(&mut self) {
        self.values.clear();
    }
    /// Iterates through the map in insertion order.
    pub fn iter(&self) -> Iter<K, V> {
        Iter(self.values.iter())
    }
    /// Iterates through the map in insertion order.
    pub fn iter_mut(&mut self) -> IterMut<K, V> {
        IterMut(self.values.iter_mut())
    }
    /// Iterates through the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.values.iter().map(|x| &x.key)
    }
    /// Iterates through the values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.values.iter().map(|x| &x.value)
    }
}

impl<K: Eq, V> Default for VecMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq, V> IntoIterator for VecMap<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;
    fn into_iter(self) -> Self::IntoIter {
        IntoIter(self.values.into_iter())
    }
}

pub struct IntoIter<K, V>(std::vec::IntoIter<Entry<K, V>>);
impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|x| (x.key, x.value))
    }
}

pub struct Iter<'a, K, V>(std::slice::Iter<'a, Entry<K, V>>);
impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|x| (&x.key, &x.value))
    }
}

pub struct IterMut<'a, K, V>(std::slice::IterMut<'a, Entry<K, V>>);
impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|x| (&x.key, &mut x.value))
    }
}

impl<K: Eq + Serialize, V: Serialize> Serialize for VecMap<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for entry in self.values.iter() {
            map.serialize_entry(&entry.key, &entry.value)?;
        }
        map.end()
    }
}

impl<'de, K: Eq + Deserialize<'de>, V: Deserialize<'de>> Deserialize<'de> for VecMap<K, V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor<K, V>(PhantomData<(K, V)>);
        impl<'de, K: Eq + Deserialize<'de>, V: Deserialize<'de>> Visitor<'de> for MapVisitor<K, V> {
            type Value = VecMap<K, V>;
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a map")
            }
            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut res = VecMap::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry()? {
                    res.insert(key, value);
                }
                Ok(res)
            }
        }
        deserializer.deserialize_map(MapVisitor(PhantomData))
    }
}

#[test]
fn test_vecmap_order() {
    let mut v = VecMap::<&str, usize>::new();
    assert_eq!(v.len(), 0);
    assert!(v.is_empty());

    assert_eq!(v.insert("zebra", 12), None);
    assert_eq!(v.insert("apple", 6), None);
    assert_eq!(v.insert("mango", 3), None);
    assert_eq!(v.len(), 3);
    assert_eq!(v.keys().copied().collect::<Vec<_>>(), ["zebra", "apple", "mango"]);

    assert_eq!(v.insert("apple", 98), Some(6));
    assert_eq!(v.len(), 3);
    assert_eq!(v.keys().copied().collect::<Vec<_>>(), ["zebra", "apple", "mango"]);
    assert_eq!(v.get("apple"), Some(&98));

    *v.get_mut("mango").unwrap() = 13;
    assert_eq!(v.iter().map(|x| (*x.0, *x.1)).collect::<Vec<_>>(), [("zebra", 12), ("apple", 98), ("mango", 13)]);

    assert_eq!(v.remove("zebra"), Some(12));
    assert_eq!(v.keys().copied().collect::<Vec<_>>(), ["apple", "mango"]);
    assert_eq!(v.remove("zebra"), None);
    assert!(!v.contains_key("zebra"));
    assert!(v.contains_key("mango"));
}

#[test]
fn test_vecmap_serde_order() {
    let src = r#"{"zebra":1,"apple":2,"0":3,"mango":4}"#;
    let v: VecMap<String, usize> = serde_json::from_str(src).unwrap();
    assert_eq!(v.keys().map(|x| x.as_str()).collect::<Vec<_>>(), ["zebra", "apple", "0", "mango"]);
    assert_eq!(serde_json::to_string(&v).unwrap(), src);
}
