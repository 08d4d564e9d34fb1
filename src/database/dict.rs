//! Хеш-таблица (Dict) с инкрементальным рехешированием.
//!
//! Цепочечная таблица с двумя внутренними таблицами: вставки и удаления
//! понемногу переносят элементы из старой таблицы в новую, без пауз.
//! Поверх базовых операций добавлены примитивы, нужные слою кодировок:
//! пре-аллокация с опциональным отказом, усадка после удалений и
//! честный случайный ключ.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::Rng;
use serde::{Deserialize, Serialize};

const INITIAL_SIZE: usize = 4;
const REHASH_BATCH: usize = 1;

/// Жёсткий предел числа бакетов. Запрос пре-аллокации сверх него — это
/// отказ `try_expand`, а не попытка аллокации.
pub const HT_MAX_SIZE: usize = 1 << 30;

/// Порог заполненности (в процентах), ниже которого таблице нужна
/// усадка.
const HT_MIN_FILL: usize = 10;

/// Один элемент в цепочке коллизий.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
struct Entry<K, V> {
    key: K,
    val: V,
    next: Option<Box<Entry<K, V>>>,
}

/// Одна таблица: вектор бакетов, маска размера и число занятых элементов.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
struct HashTable<K, V> {
    buckets: Vec<Option<Box<Entry<K, V>>>>,
    size_mask: usize,
    used: usize,
}

/// Основной словарь с двумя таблицами для рехеша.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Dict<K, V> {
    ht: [HashTable<K, V>; 2],
    rehash_idx: isize, // -1 = рехеш не идёт, иначе индекс в ht[0]
}

pub struct DictIter<'a, K, V> {
    tables: [&'a HashTable<K, V>; 2],
    table_idx: usize,
    bucket_idx: usize,
    current_entry: Option<&'a Entry<K, V>>,
}

impl<K, V> Entry<K, V> {
    fn new(key: K, val: V, next: Option<Box<Entry<K, V>>>) -> Box<Self> {
        Box::new(Entry { key, val, next })
    }
}

impl<K, V> HashTable<K, V> {
    /// Создаёт таблицу мощности `cap` (округл. в степень двойки, минимум
    /// INITIAL_SIZE).
    fn with_capacity(cap: usize) -> Self {
        let sz = cap.next_power_of_two().max(INITIAL_SIZE);
        let mut buckets = Vec::with_capacity(sz);
        buckets.resize_with(sz, || None);

        HashTable {
            buckets,
            size_mask: sz - 1,
            used: 0,
        }
    }

    fn empty() -> Self {
        HashTable {
            buckets: Vec::new(),
            size_mask: 0,
            used: 0,
        }
    }
}

impl<K, V> Default for Dict<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Dict<K, V>
where
    K: Hash + Eq,
{
    /// Новый пустой словарь.
    pub fn new() -> Self {
        Dict {
            ht: [HashTable::empty(), HashTable::empty()],
            rehash_idx: -1,
        }
    }

    /// Новый словарь, пре-аллоцированный под `cap` элементов.
    pub fn with_capacity(cap: usize) -> Self {
        let mut d = Self::new();
        d.expand(cap);
        d
    }

    /// Пре-аллоцирует таблицу под `cap` элементов. Паникует при запросе
    /// сверх жёсткого предела.
    pub fn expand(&mut self, cap: usize) {
        assert!(
            self.try_expand(cap),
            "dict expand over hard limit: {cap} entries"
        );
    }

    /// Пре-аллокация с правом на отказ: возвращает false, если запрос
    /// превышает жёсткий предел таблицы. Словарь при отказе не меняется.
    pub fn try_expand(&mut self, cap: usize) -> bool {
        if cap > HT_MAX_SIZE {
            return false;
        }
        if self.is_rehashing() || cap <= self.ht[0].buckets.len() {
            return true;
        }
        if self.ht[0].used == 0 {
            self.ht[0] = HashTable::with_capacity(cap);
        } else {
            // запускаем инкрементальную миграцию в таблицу нового размера
            self.ht[1] = HashTable::with_capacity(cap);
            self.rehash_idx = 0;
        }
        true
    }

    /// Вставить (key, val). Если ключ есть — обновить и вернуть false.
    pub fn insert(&mut self, key: K, val: V) -> bool {
        self.expand_if_needed();
        self.rehash_step();

        // проверяем, нет ли уже такого ключа (в обеих таблицах)
        if let Some(v) = self.get_mut(&key) {
            *v = val;
            return false;
        }

        // вставляем новое звено в начало цепочки
        let table_idx = if self.is_rehashing() { 1 } else { 0 };
        let slot = (Self::hash_key(&key) as usize) & self.ht[table_idx].size_mask;
        let next = self.ht[table_idx].buckets[slot].take();
        self.ht[table_idx].buckets[slot] = Some(Entry::new(key, val, next));
        self.ht[table_idx].used += 1;
        true
    }

    /// Получить `&V` по ключу или None.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.lookup(key).map(|e| &e.val)
    }

    /// Получить `&mut V` по ключу или None.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let table_idx = self.probe_table(key)?;
        let slot = (Self::hash_key(key) as usize) & self.ht[table_idx].size_mask;
        let mut cur = &mut self.ht[table_idx].buckets[slot];
        while let Some(ref mut e) = cur {
            if &e.key == key {
                return Some(&mut e.val);
            }
            cur = &mut e.next;
        }
        None
    }

    /// Проверить наличие ключа без какой-либо мутации.
    pub fn contains(&self, key: &K) -> bool {
        self.lookup(key).is_some()
    }

    /// Удалить ключ. Вернёт true, если было удалено.
    pub fn remove(&mut self, key: &K) -> bool {
        if self.is_rehashing() {
            self.rehash_step();
        }

        for table_idx in 0..=1 {
            let table = &mut self.ht[table_idx];
            if table.size_mask == 0 {
                continue;
            }

            let slot = (Self::hash_key(key) as usize) & table.size_mask;
            let old_chain = std::mem::take(&mut table.buckets[slot]);
            let (new_chain, removed) = Self::remove_from_chain(old_chain, key);
            table.buckets[slot] = new_chain;

            if removed {
                table.used -= 1;
                return true;
            }
            if !self.is_rehashing() {
                break;
            }
        }

        false
    }

    /// Общее число элементов (во всех таблицах).
    pub fn len(&self) -> usize {
        let mut total = self.ht[0].used;
        if self.is_rehashing() {
            total += self.ht[1].used;
        }
        total
    }

    /// Returns `true` if the dictionary has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Нужна ли таблице усадка после серии удалений.
    pub fn needs_resize(&self) -> bool {
        if self.is_rehashing() {
            return false;
        }
        let size = self.ht[0].buckets.len();
        size > INITIAL_SIZE && self.len() * 100 / size < HT_MIN_FILL
    }

    /// Усаживает таблицу до текущего числа элементов.
    pub fn resize(&mut self) {
        if self.is_rehashing() {
            return;
        }
        let mut rebuilt = HashTable::with_capacity(self.len());
        let old = std::mem::replace(&mut self.ht[0], HashTable::empty());
        for bucket in old.buckets {
            let mut entry_opt = bucket;
            while let Some(mut e) = entry_opt {
                entry_opt = e.next.take();
                let slot = (Self::hash_key(&e.key) as usize) & rebuilt.size_mask;
                e.next = rebuilt.buckets[slot].take();
                rebuilt.buckets[slot] = Some(e);
                rebuilt.used += 1;
            }
        }
        self.ht[0] = rebuilt;
    }

    /// Равновероятный случайный ключ независимо от перекоса цепочек:
    /// выбираем порядковый номер и идём к нему итератором.
    pub fn random_key(&self) -> Option<&K> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let nth = rand::thread_rng().gen_range(0..len);
        self.iter().nth(nth).map(|(k, _)| k)
    }

    pub fn iter(&self) -> DictIter<'_, K, V> {
        DictIter {
            tables: [&self.ht[0], &self.ht[1]],
            table_idx: 0,
            bucket_idx: 0,
            current_entry: None,
        }
    }

    /// Ищет запись по ключу в обеих таблицах.
    fn lookup(&self, key: &K) -> Option<&Entry<K, V>> {
        for table_idx in 0..=1 {
            if self.ht[table_idx].size_mask == 0 {
                continue;
            }
            let slot = (Self::hash_key(key) as usize) & self.ht[table_idx].size_mask;
            let mut cur = &self.ht[table_idx].buckets[slot];
            while let Some(ref e) = cur {
                if &e.key == key {
                    return Some(e);
                }
                cur = &e.next;
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }

    /// Номер таблицы, содержащей ключ.
    fn probe_table(&self, key: &K) -> Option<usize> {
        for table_idx in 0..=1 {
            if self.ht[table_idx].size_mask == 0 {
                continue;
            }
            let slot = (Self::hash_key(key) as usize) & self.ht[table_idx].size_mask;
            let mut cur = &self.ht[table_idx].buckets[slot];
            while let Some(ref e) = cur {
                if &e.key == key {
                    return Some(table_idx);
                }
                cur = &e.next;
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }

    /// Рекурсивно разбирает цепочку: вынимает первый узел с ключом `key`.
    fn remove_from_chain(
        chain: Option<Box<Entry<K, V>>>,
        key: &K,
    ) -> (Option<Box<Entry<K, V>>>, bool) {
        match chain {
            None => (None, false),
            Some(mut boxed) => {
                if &boxed.key == key {
                    (boxed.next.take(), true)
                } else {
                    let (next_chain, removed) = Self::remove_from_chain(boxed.next.take(), key);
                    boxed.next = next_chain;
                    (Some(boxed), removed)
                }
            }
        }
    }

    #[inline]
    fn is_rehashing(&self) -> bool {
        self.rehash_idx != -1
    }

    fn hash_key(key: &K) -> u64 {
        let mut h = DefaultHasher::new();
        key.hash(&mut h);
        h.finish()
    }

    /// Выполнить один шаг инкрементального рехеша.
    fn rehash_step(&mut self) {
        if !self.is_rehashing() {
            return;
        }
        for _ in 0..REHASH_BATCH {
            let idx = self.rehash_idx as usize;
            if idx >= self.ht[0].buckets.len() {
                self.ht[0] = std::mem::replace(&mut self.ht[1], HashTable::empty());
                self.rehash_idx = -1;
                return;
            }
            let mut entry_opt = self.ht[0].buckets[idx].take();
            while let Some(mut e) = entry_opt {
                entry_opt = e.next.take();
                let h = (Self::hash_key(&e.key) as usize) & self.ht[1].size_mask;
                e.next = self.ht[1].buckets[h].take();
                self.ht[1].buckets[h] = Some(e);
                self.ht[0].used -= 1;
                self.ht[1].used += 1;
            }
            self.rehash_idx += 1;
        }
    }

    /// Если заполненность достигла 100%, запускает рехеш в таблицу
    /// вдвое большего размера.
    fn expand_if_needed(&mut self) {
        if self.is_rehashing() {
            return;
        }
        let used = self.ht[0].used;
        let size = self.ht[0].buckets.len();
        if size == 0 {
            self.ht[0] = HashTable::with_capacity(INITIAL_SIZE);
        } else if used >= size {
            self.ht[1] = HashTable::with_capacity(size * 2);
            self.rehash_idx = 0;
        }
    }
}

impl<'a, K, V> Iterator for DictIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.current_entry.take() {
                self.current_entry = entry.next.as_deref();
                return Some((&entry.key, &entry.val));
            }

            if self.bucket_idx >= self.tables[self.table_idx].buckets.len() {
                if self.table_idx == 0 && self.tables[1].size_mask != 0 {
                    self.table_idx = 1;
                    self.bucket_idx = 0;
                    continue;
                } else {
                    return None;
                }
            }

            self.current_entry = self.tables[self.table_idx].buckets[self.bucket_idx].as_deref();
            self.bucket_idx += 1;
        }
    }
}

impl<'a, K, V> IntoIterator for &'a Dict<K, V>
where
    K: Hash + Eq,
{
    type Item = (&'a K, &'a V);
    type IntoIter = DictIter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
