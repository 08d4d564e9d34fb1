//! Общие типы слоя кодировок: теги представлений, направления обхода
//! и обёртка `Value` для сериализации коллекций целиком.

use serde::{Deserialize, Serialize};

use super::{list_object::ListObject, sds::Sds, set_object::SetObject};
use crate::error::{StoreError, StoreResult};

/// Текущее представление списка.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListEncoding {
    /// Компактный односегментный буфер.
    ListPack,
    /// Связанная последовательность узлов.
    QuickList,
}

/// Текущее представление множества.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetEncoding {
    /// Отсортированный буфер целых чисел.
    IntSet,
    /// Компактный буфер байтовых строк.
    ListPack,
    /// Хеш-таблица.
    HashTable,
}

/// Конец списка для push/pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Head,
    Tail,
}

/// Направление обхода итератора.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Контекст запроса на конверсию списка.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvTrigger {
    /// Проверить обе стороны порога.
    Auto,
    /// Коллекция только что выросла: возможна лишь промоция.
    Growing,
    /// Коллекция уменьшилась: возможна лишь демоция.
    Shrinking,
}

/// Элемент коллекции в точке вызова: либо байтовая строка, либо уже
/// разобранное целое.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryValue<'a> {
    Str(&'a [u8]),
    Int(i64),
}

impl<'a> EntryValue<'a> {
    /// Разбирает сырые байты: каноническая десятичная запись даёт `Int`.
    pub fn from_bytes(raw: &'a [u8]) -> Self {
        match super::sds::parse_decimal(raw) {
            Some(v) => EntryValue::Int(v),
            None => EntryValue::Str(raw),
        }
    }

    /// Материализует значение во владеющую строку.
    pub fn to_sds(&self) -> Sds {
        match self {
            EntryValue::Str(b) => Sds::from_bytes(b),
            EntryValue::Int(v) => Sds::from_int(*v),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            EntryValue::Int(v) => Some(*v),
            EntryValue::Str(_) => None,
        }
    }
}

/// Коллекционное значение движка.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    List(ListObject),
    Set(SetObject),
}

impl Value {
    /// Сериализует значение в байты для выгрузки на диск.
    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(StoreError::Serde)
    }

    /// Восстанавливает значение из сериализованных байт.
    pub fn from_bytes(data: &[u8]) -> StoreResult<Self> {
        serde_json::from_slice(data).map_err(StoreError::Serde)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_value_parses_canonical_integers() {
        assert_eq!(EntryValue::from_bytes(b"42"), EntryValue::Int(42));
        assert_eq!(EntryValue::from_bytes(b"-7"), EntryValue::Int(-7));
        assert_eq!(EntryValue::from_bytes(b"007"), EntryValue::Str(b"007"));
        assert_eq!(EntryValue::from_bytes(b"+1"), EntryValue::Str(b"+1"));
        assert_eq!(EntryValue::from_bytes(b"hi"), EntryValue::Str(b"hi"));
    }

    #[test]
    fn test_entry_value_to_sds_roundtrip() {
        assert_eq!(EntryValue::Int(-15).to_sds().as_slice(), b"-15");
        assert_eq!(EntryValue::Str(b"abc").to_sds().as_slice(), b"abc");
    }
}
