//! `SetObject` — множество с тремя сменными представлениями.
//!
//! Множество из одних целых чисел живёт в `IntSet`, небольшое смешанное
//! множество — в компактном буфере (`ListPack`), большое — в хеш-таблице.
//! Промоции монотонны: IntSet -> ListPack -> HashTable, обратных
//! переходов нет, поэтому удаления никогда не меняют представление.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    dict::Dict,
    intset::IntSet,
    limits::digits10,
    list_object::BeforeConvert,
    listpack::{ListPack, LP_MAX_SAFE_SIZE},
    sds::{parse_decimal, Sds},
    types::{EntryValue, SetEncoding},
};
use crate::{
    config::Settings,
    error::{StoreError, StoreResult},
};

/// Жёсткий потолок числа элементов IntSet независимо от конфигурации.
pub const INTSET_MAX_ENTRIES: usize = 1 << 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SetObject {
    IntSet(IntSet),
    ListPack(ListPack),
    Dict(Dict<Sds, ()>),
}

impl SetObject {
    /// Выбирает стартовое представление по первому значению и ожидаемому
    /// числу элементов.
    pub fn create(value: &[u8], size_hint: usize, settings: &Settings) -> Self {
        if parse_decimal(value).is_some() && size_hint <= settings.set_max_intset_entries {
            return SetObject::IntSet(IntSet::new());
        }
        if size_hint <= settings.set_max_listpack_entries
            && value.len() <= settings.set_max_listpack_value
        {
            return SetObject::ListPack(ListPack::new());
        }
        SetObject::Dict(Dict::with_capacity(size_hint))
    }

    pub fn encoding(&self) -> SetEncoding {
        match self {
            SetObject::IntSet(_) => SetEncoding::IntSet,
            SetObject::ListPack(_) => SetEncoding::ListPack,
            SetObject::Dict(_) => SetEncoding::HashTable,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SetObject::IntSet(is) => is.len(),
            SetObject::ListPack(lp) => lp.len(),
            SetObject::Dict(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Добавляет значение. Возвращает true, если элемент новый. При
    /// выходе за пороги представление повышается до вставки результата.
    pub fn add(&mut self, value: &[u8], settings: &Settings) -> bool {
        if let SetObject::Dict(d) = self {
            return d.insert(Sds::from_bytes(value), ());
        }

        if let SetObject::ListPack(lp) = self {
            if lp.find(value).is_some() {
                return false;
            }
            let entry = ListPack::encode_varint(value.len()).len() + value.len();
            if lp.len() < settings.set_max_listpack_entries
                && value.len() <= settings.set_max_listpack_value
                && lp.safe_to_add(entry)
            {
                lp.push_back(value);
                return true;
            }
            let cap = lp.len() + 1;
            self.promote_to_dict(cap);
            if let SetObject::Dict(d) = self {
                return d.insert(Sds::from_bytes(value), ());
            }
            unreachable!("promote_to_dict leaves dict encoding");
        }

        // IntSet
        let is = match self {
            SetObject::IntSet(is) => is,
            _ => unreachable!("remaining encoding is intset"),
        };
        if let Some(v) = parse_decimal(value) {
            if !is.insert(v) {
                return false;
            }
            let max = settings.set_max_intset_entries.min(INTSET_MAX_ENTRIES);
            if is.len() > max {
                let len = is.len();
                self.promote_to_dict(len);
            }
            return true;
        }

        // Нечисловое значение в IntSet: членство исключено, выбираем
        // новое представление по прогнозу размера.
        let fits_listpack = is.len() < settings.set_max_listpack_entries
            && value.len() <= settings.set_max_listpack_value
            && intset_listpack_estimate_safe(is, value.len(), settings.set_max_listpack_value);
        if fits_listpack {
            self.intset_to_listpack();
            if let SetObject::ListPack(lp) = self {
                lp.push_back(value);
                return true;
            }
            unreachable!("intset_to_listpack leaves listpack encoding");
        }
        let cap = is.len() + 1;
        self.promote_to_dict(cap);
        if let SetObject::Dict(d) = self {
            return d.insert(Sds::from_bytes(value), ());
        }
        unreachable!("promote_to_dict leaves dict encoding");
    }

    /// Удаляет значение. Представление никогда не понижается; ужавшаяся
    /// хеш-таблица лишь пересобирает свои корзины.
    pub fn remove(&mut self, value: &[u8]) -> bool {
        match self {
            SetObject::IntSet(is) => match parse_decimal(value) {
                Some(v) => is.remove(v),
                None => false,
            },
            SetObject::ListPack(lp) => match lp.find(value) {
                Some(idx) => lp.remove(idx),
                None => false,
            },
            SetObject::Dict(d) => {
                let removed = d.remove(&Sds::from_bytes(value));
                if removed && d.needs_resize() {
                    d.resize();
                }
                removed
            }
        }
    }

    /// Проверка членства без побочных эффектов: нечисловой запрос к
    /// IntSet просто даёт false.
    pub fn is_member(&self, value: &[u8]) -> bool {
        match self {
            SetObject::IntSet(is) => match parse_decimal(value) {
                Some(v) => is.contains(v),
                None => false,
            },
            SetObject::ListPack(lp) => lp.find(value).is_some(),
            SetObject::Dict(d) => d.contains(&Sds::from_bytes(value)),
        }
    }

    /// Равновероятный случайный элемент.
    pub fn random_member(&self) -> Option<EntryValue<'_>> {
        match self {
            SetObject::IntSet(is) => is.random().map(EntryValue::Int),
            SetObject::ListPack(lp) => {
                if lp.is_empty() {
                    return None;
                }
                let idx = rand::thread_rng().gen_range(0..lp.len());
                lp.get(idx).map(EntryValue::from_bytes)
            }
            SetObject::Dict(d) => d.random_key().map(|k| EntryValue::from_bytes(k.as_slice())),
        }
    }

    /// Итератор по элементам множества.
    pub fn iter(&self) -> SetIter<'_> {
        match self {
            SetObject::IntSet(is) => SetIter::IntSet(Box::new(is.iter())),
            SetObject::ListPack(lp) => SetIter::ListPack(Box::new(lp.iter())),
            SetObject::Dict(d) => SetIter::Dict(Box::new(d.iter().map(|(k, _)| k))),
        }
    }

    /// Принудительная смена представления с предварительным резервом
    /// места. При `allow_failure` невозможный резерв хеш-таблицы
    /// возвращает ошибку, не трогая множество.
    pub fn convert_to(
        &mut self,
        target: SetEncoding,
        cap: usize,
        allow_failure: bool,
        before: BeforeConvert<'_>,
    ) -> StoreResult<()> {
        if self.encoding() == target {
            return Ok(());
        }
        match target {
            SetEncoding::IntSet => Err(StoreError::ConvertPresize(cap)),
            SetEncoding::ListPack => {
                match self {
                    SetObject::IntSet(_) => {}
                    _ => return Err(StoreError::ConvertPresize(cap)),
                }
                if let Some(f) = before {
                    f();
                }
                self.intset_to_listpack();
                Ok(())
            }
            SetEncoding::HashTable => {
                if allow_failure {
                    let mut probe: Dict<Sds, ()> = Dict::new();
                    if !probe.try_expand(cap) {
                        return Err(StoreError::ConvertPresize(cap));
                    }
                }
                if let Some(f) = before {
                    f();
                }
                self.promote_to_dict(cap);
                Ok(())
            }
        }
    }

    /// Глубокая копия. Компактные представления копируются блобом,
    /// хеш-таблица пересобирается с чистой раскладкой корзин.
    pub fn duplicate(&self) -> Self {
        match self {
            SetObject::IntSet(is) => SetObject::IntSet(is.clone()),
            SetObject::ListPack(lp) => SetObject::ListPack(lp.clone()),
            SetObject::Dict(d) => {
                let mut copy = Dict::with_capacity(d.len());
                for (k, _) in d.iter() {
                    copy.insert(k.clone(), ());
                }
                SetObject::Dict(copy)
            }
        }
    }

    fn intset_to_listpack(&mut self) {
        let is = match std::mem::replace(self, SetObject::ListPack(ListPack::new())) {
            SetObject::IntSet(is) => is,
            other => {
                *self = other;
                return;
            }
        };
        let len = is.len();
        let hint = match (is.min(), is.max()) {
            (Some(min), Some(max)) => {
                let wide = if digits10(min) >= digits10(max) { min } else { max };
                ListPack::estimate_bytes_repeated_integer(wide, len)
            }
            _ => 0,
        };
        let mut lp = ListPack::with_capacity(hint);
        for v in is.iter() {
            lp.push_back(Sds::from_int(v).as_slice());
        }
        *self = SetObject::ListPack(lp);
        debug!("set promoted to listpack encoding (len={len})");
    }

    fn promote_to_dict(&mut self, cap: usize) {
        if matches!(self, SetObject::Dict(_)) {
            return;
        }
        let old = std::mem::replace(self, SetObject::Dict(Dict::with_capacity(cap)));
        let d = match self {
            SetObject::Dict(d) => d,
            _ => unreachable!("just replaced with dict"),
        };
        match old {
            SetObject::IntSet(is) => {
                for v in is.iter() {
                    d.insert(Sds::from_int(v), ());
                }
            }
            SetObject::ListPack(lp) => {
                for e in lp.iter() {
                    d.insert(Sds::from_bytes(e), ());
                }
            }
            SetObject::Dict(_) => unreachable!("dict encoding checked above"),
        }
        debug!("set promoted to hashtable encoding (len={})", d.len());
    }
}

/// Пессимистичная оценка будущего компактного буфера: все существующие
/// элементы считаются по самой широкой десятичной записи среди минимума
/// и максимума. Точные ширины дёшево не узнать, верхняя оценка даёт
/// решение за O(1).
fn intset_listpack_estimate_safe(is: &IntSet, added_len: usize, max_value_len: usize) -> bool {
    let (min, max) = match (is.min(), is.max()) {
        (Some(min), Some(max)) => (min, max),
        _ => return true,
    };
    let wide = if digits10(min) >= digits10(max) { min } else { max };
    if digits10(wide) > max_value_len {
        return false;
    }
    let est = ListPack::estimate_bytes_repeated_integer(wide, is.len());
    est.saturating_add(added_len) <= LP_MAX_SAFE_SIZE
}

/// Итератор по множеству, скрывающий конкретное представление.
pub enum SetIter<'a> {
    IntSet(Box<dyn Iterator<Item = i64> + 'a>),
    ListPack(Box<dyn Iterator<Item = &'a [u8]> + 'a>),
    Dict(Box<dyn Iterator<Item = &'a Sds> + 'a>),
}

impl<'a> Iterator for SetIter<'a> {
    type Item = EntryValue<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            SetIter::IntSet(it) => it.next().map(EntryValue::Int),
            SetIter::ListPack(it) => it.next().map(EntryValue::from_bytes),
            SetIter::Dict(it) => it.next().map(|k| EntryValue::from_bytes(k.as_slice())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_settings() -> Settings {
        Settings {
            set_max_intset_entries: 4,
            set_max_listpack_entries: 8,
            set_max_listpack_value: 16,
            ..Settings::default()
        }
    }

    #[test]
    fn test_create_picks_encoding_by_hint() {
        let s = Settings::default();
        assert_eq!(
            SetObject::create(b"123", 10, &s).encoding(),
            SetEncoding::IntSet
        );
        assert_eq!(
            SetObject::create(b"abc", 10, &s).encoding(),
            SetEncoding::ListPack
        );
        assert_eq!(
            SetObject::create(b"123", 100_000, &s).encoding(),
            SetEncoding::HashTable
        );
        assert_eq!(
            SetObject::create(b"abc", 100_000, &s).encoding(),
            SetEncoding::HashTable
        );
    }

    #[test]
    fn test_intset_add_remove_member() {
        let s = small_settings();
        let mut set = SetObject::create(b"1", 0, &s);
        assert!(set.add(b"1", &s));
        assert!(!set.add(b"1", &s));
        assert!(set.add(b"2", &s));
        assert_eq!(set.encoding(), SetEncoding::IntSet);

        assert!(set.is_member(b"1"));
        assert!(!set.is_member(b"3"));
        // нечисловой запрос не ошибается и не конвертирует
        assert!(!set.is_member(b"one"));
        assert_eq!(set.encoding(), SetEncoding::IntSet);

        assert!(set.remove(b"1"));
        assert!(!set.remove(b"one"));
        assert_eq!(set.len(), 1);
    }

    /// Тест проверяет промоцию IntSet -> HashTable при переполнении
    /// целочисленного порога: компактный буфер не промежуточная станция
    /// для чисто целочисленного роста.
    #[test]
    fn test_intset_overflow_promotes_to_hashtable() {
        let s = small_settings(); // intset max 4
        let mut set = SetObject::create(b"0", 0, &s);
        for i in 0..4 {
            set.add(format!("{i}").as_bytes(), &s);
        }
        assert_eq!(set.encoding(), SetEncoding::IntSet);

        set.add(b"4", &s);
        assert_eq!(set.encoding(), SetEncoding::HashTable);
        assert_eq!(set.len(), 5);
        for i in 0..5 {
            assert!(set.is_member(format!("{i}").as_bytes()));
        }
    }

    /// Тест проверяет переход IntSet -> ListPack при добавлении строки.
    #[test]
    fn test_intset_string_add_promotes_to_listpack() {
        let s = small_settings();
        let mut set = SetObject::create(b"100", 2, &s);
        set.add(b"100", &s);
        assert_eq!(set.encoding(), SetEncoding::IntSet);

        assert!(set.add(b"hello", &s));
        assert_eq!(set.encoding(), SetEncoding::ListPack);
        assert!(set.is_member(b"100"));
        assert!(set.is_member(b"hello"));
    }

    /// Тест проверяет, что длинная строка уводит IntSet сразу в
    /// хеш-таблицу, минуя компактный буфер.
    #[test]
    fn test_intset_long_string_goes_to_hashtable() {
        let s = small_settings(); // max value len 16
        let mut set = SetObject::create(b"7", 0, &s);
        set.add(b"7", &s);
        assert!(set.add(b"a-rather-long-member-value", &s));
        assert_eq!(set.encoding(), SetEncoding::HashTable);
        assert!(set.is_member(b"7"));
        assert!(set.is_member(b"a-rather-long-member-value"));
    }

    /// Тест проверяет промоцию ListPack -> HashTable по числу элементов.
    #[test]
    fn test_listpack_overflow_promotes_to_hashtable() {
        let s = small_settings(); // listpack max 8
        let mut set = SetObject::create(b"x", 0, &s);
        for i in 0..8 {
            assert!(set.add(format!("s{i}").as_bytes(), &s));
        }
        assert_eq!(set.encoding(), SetEncoding::ListPack);

        assert!(set.add(b"s8", &s));
        assert_eq!(set.encoding(), SetEncoding::HashTable);
        assert_eq!(set.len(), 9);
        for i in 0..9 {
            assert!(set.is_member(format!("s{i}").as_bytes()));
        }
    }

    #[test]
    fn test_remove_never_demotes() {
        let s = small_settings();
        let mut set = SetObject::create(b"x", 0, &s);
        for i in 0..9 {
            set.add(format!("s{i}").as_bytes(), &s);
        }
        assert_eq!(set.encoding(), SetEncoding::HashTable);
        for i in 0..8 {
            assert!(set.remove(format!("s{i}").as_bytes()));
        }
        assert_eq!(set.len(), 1);
        assert_eq!(set.encoding(), SetEncoding::HashTable);
    }

    #[test]
    fn test_iter_covers_all_encodings() {
        let s = small_settings();

        let mut ints = SetObject::create(b"1", 0, &s);
        ints.add(b"2", &s);
        ints.add(b"1", &s);
        let got: Vec<i64> = ints.iter().filter_map(|e| e.as_int()).collect();
        assert_eq!(got, vec![1, 2]);

        let mut strs = SetObject::create(b"a", 0, &s);
        strs.add(b"a", &s);
        strs.add(b"b", &s);
        assert_eq!(strs.iter().count(), 2);

        let mut big = SetObject::create(b"x", 1000, &s);
        big.add(b"p", &s);
        big.add(b"q", &s);
        assert_eq!(big.encoding(), SetEncoding::HashTable);
        assert_eq!(big.iter().count(), 2);
    }

    #[test]
    fn test_random_member_is_member() {
        let s = small_settings();
        let mut set = SetObject::create(b"a", 0, &s);
        assert!(set.random_member().is_none());
        for v in ["a", "b", "c"] {
            set.add(v.as_bytes(), &s);
        }
        for _ in 0..10 {
            let m = set.random_member().unwrap().to_sds();
            assert!(set.is_member(m.as_slice()));
        }
    }

    #[test]
    fn test_convert_to_hashtable_explicit() {
        let s = small_settings();
        let mut set = SetObject::create(b"1", 0, &s);
        set.add(b"1", &s);
        set.add(b"2", &s);

        let mut calls = 0;
        let mut hook = || calls += 1;
        set.convert_to(SetEncoding::HashTable, 2, true, Some(&mut hook))
            .unwrap();
        assert_eq!(set.encoding(), SetEncoding::HashTable);
        assert_eq!(calls, 1);
        assert!(set.is_member(b"1"));
        assert!(set.is_member(b"2"));
    }

    #[test]
    fn test_convert_to_hashtable_presize_failure() {
        let s = small_settings();
        let mut set = SetObject::create(b"1", 0, &s);
        set.add(b"1", &s);

        let huge = (1usize << 30) + 1;
        let err = set
            .convert_to(SetEncoding::HashTable, huge, true, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::ConvertPresize(_)));
        // множество не тронуто
        assert_eq!(set.encoding(), SetEncoding::IntSet);
        assert!(set.is_member(b"1"));
    }

    #[test]
    fn test_convert_never_regresses() {
        let s = small_settings();
        let mut set = SetObject::create(b"a", 0, &s);
        set.add(b"a", &s);
        assert!(set
            .convert_to(SetEncoding::IntSet, 1, false, None)
            .is_err());
        assert_eq!(set.encoding(), SetEncoding::ListPack);
    }

    /// Тест проверяет независимость копии от оригинала.
    #[test]
    fn test_duplicate_is_independent() {
        let s = small_settings();
        let mut set = SetObject::create(b"x", 1000, &s);
        for v in ["x", "y", "z"] {
            set.add(v.as_bytes(), &s);
        }
        let copy = set.duplicate();
        assert_eq!(copy.len(), 3);
        assert_eq!(copy.encoding(), set.encoding());

        set.remove(b"x");
        assert!(!set.is_member(b"x"));
        assert!(copy.is_member(b"x"));
    }
}
