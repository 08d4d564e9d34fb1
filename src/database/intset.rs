//! `IntSet` — компактное множество 64-битных целых чисел.
//!
//! Хранит уникальные значения отсортированными в одном байтовом буфере,
//! используя минимально необходимую ширину (`i16`, `i32` или `i64`).
//! При вставке значения, не влезающего в текущую ширину, кодировка
//! автоматически расширяется; обратного сужения нет.

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Width {
    Int16,
    Int32,
    Int64,
}

impl Width {
    fn bytes(self) -> usize {
        match self {
            Width::Int16 => 2,
            Width::Int32 => 4,
            Width::Int64 => 8,
        }
    }

    fn for_value(x: i64) -> Width {
        if x >= i16::MIN as i64 && x <= i16::MAX as i64 {
            Width::Int16
        } else if x >= i32::MIN as i64 && x <= i32::MAX as i64 {
            Width::Int32
        } else {
            Width::Int64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntSet {
    width: Width,
    data: Vec<u8>, // всегда отсортирован и без дубликатов
}

impl IntSet {
    pub fn new() -> Self {
        IntSet {
            width: Width::Int16,
            data: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.width.bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Размер сериализованного блоба в байтах.
    pub fn blob_len(&self) -> usize {
        self.data.len()
    }

    /// Бинарный поиск: (найдено, позиция). Позиция — место вставки,
    /// если значение не найдено.
    fn find(&self, value: i64) -> (bool, usize) {
        let mut lo = 0;
        let mut hi = self.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let mid_val = self.read_at(mid);
            if mid_val == value {
                return (true, mid);
            } else if mid_val < value {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        (false, lo)
    }

    pub fn contains(&self, value: i64) -> bool {
        self.find(value).0
    }

    /// Вставить значение. Возвращает true, если добавлено, false — если
    /// уже было.
    pub fn insert(&mut self, value: i64) -> bool {
        let need = Width::for_value(value);
        if need.bytes() > self.width.bytes() {
            self.upgrade(need);
        }

        let (exists, pos) = self.find(value);
        if exists {
            return false;
        }

        let eb = self.width.bytes();
        let mut buf = [0u8; 8];
        let encoded = match self.width {
            Width::Int16 => {
                buf[..2].copy_from_slice(&(value as i16).to_le_bytes());
                &buf[..2]
            }
            Width::Int32 => {
                buf[..4].copy_from_slice(&(value as i32).to_le_bytes());
                &buf[..4]
            }
            Width::Int64 => {
                buf.copy_from_slice(&value.to_le_bytes());
                &buf[..]
            }
        };
        self.data
            .splice(pos * eb..pos * eb, encoded.iter().copied());
        true
    }

    /// Удалить значение. Возвращает true, если было удалено.
    pub fn remove(&mut self, value: i64) -> bool {
        let (exists, pos) = self.find(value);
        if !exists {
            return false;
        }
        let eb = self.width.bytes();
        self.data.drain(pos * eb..pos * eb + eb);
        true
    }

    /// Элемент по порядковому номеру (в отсортированном порядке).
    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        Some(self.read_at(index))
    }

    /// Минимальный элемент множества.
    pub fn min(&self) -> Option<i64> {
        self.get(0)
    }

    /// Максимальный элемент множества.
    pub fn max(&self) -> Option<i64> {
        self.len().checked_sub(1).map(|i| self.read_at(i))
    }

    /// Равновероятный случайный элемент.
    pub fn random(&self) -> Option<i64> {
        if self.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..self.len());
        Some(self.read_at(idx))
    }

    /// Итератор по элементам в отсортированном порядке.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.len()).map(move |i| self.read_at(i))
    }

    fn read_at(&self, i: usize) -> i64 {
        let eb = self.width.bytes();
        let start = i * eb;
        let chunk = &self.data[start..start + eb];
        match self.width {
            Width::Int16 => i16::from_le_bytes(chunk.try_into().expect("width invariant")) as i64,
            Width::Int32 => i32::from_le_bytes(chunk.try_into().expect("width invariant")) as i64,
            Width::Int64 => i64::from_le_bytes(chunk.try_into().expect("width invariant")),
        }
    }

    /// Перекодирует буфер в новую ширину, сохраняя порядок.
    fn upgrade(&mut self, new_width: Width) {
        let mut new = Vec::with_capacity(self.len() * new_width.bytes());
        for v in self.iter() {
            match new_width {
                Width::Int16 => new.extend_from_slice(&(v as i16).to_le_bytes()),
                Width::Int32 => new.extend_from_slice(&(v as i32).to_le_bytes()),
                Width::Int64 => new.extend_from_slice(&v.to_le_bytes()),
            }
        }
        self.width = new_width;
        self.data = new;
    }
}

impl Default for IntSet {
    fn default() -> Self {
        Self::new()
    }
}
