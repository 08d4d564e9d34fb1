//! `ListPack` — компактное последовательное представление: один
//! растущий байтовый буфер, в котором каждый элемент предварён длиной
//! в формате varint, а занятая область завершается байтом 0xFF.
//! Содержимое центрируется в буфере, поэтому вставка с обоих концов
//! амортизированно дешёвая.

use serde::{Deserialize, Serialize};

/// Предохранитель адресуемого размера: дальше этой границы компактное
/// представление не растёт, элемент уходит в другую кодировку.
pub const LP_MAX_SAFE_SIZE: usize = 1 << 30;

const TERMINATOR: u8 = 0xFF;
const DEFAULT_CAP: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPack {
    data: Vec<u8>,
    head: usize,
    tail: usize,
    num_entries: usize,
}

impl ListPack {
    /// Пустой ListPack с ёмкостью по умолчанию.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAP)
    }

    /// Пустой ListPack, рассчитанный примерно на `bytes_hint` байт
    /// полезной нагрузки.
    pub fn with_capacity(bytes_hint: usize) -> Self {
        let cap = bytes_hint.max(16).next_power_of_two();
        let mut data = vec![0; cap];
        let head = cap / 2;
        data[head] = TERMINATOR;
        Self {
            data,
            head,
            tail: head + 1,
            num_entries: 0,
        }
    }

    /// Возвращает количество элементов.
    pub fn len(&self) -> usize {
        self.num_entries
    }

    /// Возвращает `true`, если список пуст.
    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    /// Размер занятой области буфера в байтах, включая терминатор.
    /// Именно эта величина сравнивается с лимитами кодировки.
    pub fn total_bytes(&self) -> usize {
        self.tail - self.head
    }

    /// Можно ли безопасно дописать ещё `extra` байт полезной нагрузки,
    /// не выйдя за адресуемый предел представления.
    pub fn safe_to_add(&self, extra: usize) -> bool {
        self.total_bytes().saturating_add(extra) <= LP_MAX_SAFE_SIZE
    }

    /// Оценка занятых байт для `count` повторений десятичной записи
    /// числа `value`: длина записи плюс её varint-префикс.
    pub fn estimate_bytes_repeated_integer(value: i64, count: usize) -> usize {
        let len = super::limits::digits10(value);
        let per_entry = Self::encode_varint(len).len() + len;
        per_entry.saturating_mul(count)
    }

    /// Вставляет значение в начало списка.
    pub fn push_front(&mut self, value: &[u8]) {
        let len_bytes = Self::encode_varint(value.len());
        let extra = len_bytes.len() + value.len();

        // место должно быть гарантировано ДО записи
        self.grow_and_center(extra);

        self.head -= extra;
        let h = self.head;
        self.data[h..h + len_bytes.len()].copy_from_slice(&len_bytes);
        self.data[h + len_bytes.len()..h + extra].copy_from_slice(value);
        self.num_entries += 1;
    }

    /// Вставляет значение в конец списка.
    pub fn push_back(&mut self, value: &[u8]) {
        let len_bytes = Self::encode_varint(value.len());
        let extra = len_bytes.len() + value.len();

        self.grow_and_center(extra);

        // затираем текущий терминатор, пишем запись и новый терминатор
        let term_pos = self.tail - 1;
        self.data[term_pos..term_pos + len_bytes.len()].copy_from_slice(&len_bytes);
        let vstart = term_pos + len_bytes.len();
        self.data[vstart..vstart + value.len()].copy_from_slice(value);
        self.data[vstart + value.len()] = TERMINATOR;

        self.tail = vstart + value.len() + 1;
        self.num_entries += 1;
    }

    /// Удаляет и возвращает первый элемент.
    pub fn pop_front(&mut self) -> Option<Vec<u8>> {
        if self.num_entries == 0 {
            return None;
        }

        let (start, data_start, end) = self.entry_bounds(0)?;
        debug_assert_eq!(start, self.head);
        let element = self.data[data_start..end].to_vec();

        // сдвигаем head вперёд, O(1)
        self.head = end;
        self.num_entries -= 1;

        self.after_shrink();
        Some(element)
    }

    /// Удаляет и возвращает последний элемент.
    pub fn pop_back(&mut self) -> Option<Vec<u8>> {
        if self.num_entries == 0 {
            return None;
        }

        let (start, data_start, end) = self.entry_bounds(self.num_entries - 1)?;
        let element = self.data[data_start..end].to_vec();

        self.data[start] = TERMINATOR;
        self.tail = start + 1;
        self.num_entries -= 1;

        self.after_shrink();
        Some(element)
    }

    /// Возвращает срез с данными элемента по порядковому номеру.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        let (_, data_start, end) = self.entry_bounds(index)?;
        Some(&self.data[data_start..end])
    }

    /// Линейный поиск элемента по байтовому равенству; возвращает его
    /// порядковый номер.
    pub fn find(&self, value: &[u8]) -> Option<usize> {
        let mut pos = self.head;
        let mut idx = 0;
        while self.data[pos] != TERMINATOR {
            let (len, consumed) = Self::decode_varint(&self.data[pos..])?;
            let start = pos + consumed;
            if &self.data[start..start + len] == value {
                return Some(idx);
            }
            pos = start + len;
            idx += 1;
        }
        None
    }

    /// Вставляет значение перед элементом с порядковым номером `index`.
    /// `index == len` эквивалентен вставке в конец.
    pub fn insert_before(&mut self, index: usize, value: &[u8]) {
        assert!(index <= self.num_entries, "insert index out of range");
        if index == self.num_entries {
            self.push_back(value);
            return;
        }
        if index == 0 {
            self.push_front(value);
            return;
        }

        let len_bytes = Self::encode_varint(value.len());
        let extra = len_bytes.len() + value.len();

        // grow может передвинуть head/tail, офсет считаем после него
        self.grow_and_center(extra);
        let (start, _, _) = self.entry_bounds(index).expect("index checked above");

        self.data.copy_within(start..self.tail, start + extra);
        self.data[start..start + len_bytes.len()].copy_from_slice(&len_bytes);
        self.data[start + len_bytes.len()..start + extra].copy_from_slice(value);

        self.tail += extra;
        self.num_entries += 1;
    }

    /// Вставляет значение сразу после элемента `index`.
    pub fn insert_after(&mut self, index: usize, value: &[u8]) {
        assert!(index < self.num_entries, "insert index out of range");
        self.insert_before(index + 1, value);
    }

    /// Заменяет элемент по порядковому номеру. Возвращает `false`, если
    /// такого элемента нет.
    pub fn replace(&mut self, index: usize, value: &[u8]) -> bool {
        if index >= self.num_entries {
            return false;
        }

        let len_bytes = Self::encode_varint(value.len());
        let new_total = len_bytes.len() + value.len();

        let (start, _, end) = match self.entry_bounds(index) {
            Some(b) => b,
            None => return false,
        };
        let old_total = end - start;

        if new_total > old_total {
            let extra = new_total - old_total;
            self.grow_and_center(extra);
            // буфер мог переехать
            let (start, _, end) = self.entry_bounds(index).expect("index checked above");
            self.data.copy_within(end..self.tail, end + extra);
            self.tail += extra;
            self.write_entry(start, &len_bytes, value);
        } else {
            let shrink = old_total - new_total;
            self.data.copy_within(end..self.tail, end - shrink);
            self.tail -= shrink;
            self.write_entry(start, &len_bytes, value);
        }
        true
    }

    /// Удаляет элемент по порядковому номеру. Возвращает `true`, если
    /// удаление прошло успешно.
    pub fn remove(&mut self, index: usize) -> bool {
        let (start, _, end) = match self.entry_bounds(index) {
            Some(b) => b,
            None => return false,
        };

        self.data.copy_within(end..self.tail, start);
        self.tail -= end - start;
        self.num_entries -= 1;

        self.after_shrink();
        true
    }

    /// Итератор по всем элементам списка.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        let data = &self.data;
        let mut pos = self.head;

        std::iter::from_fn(move || {
            if data[pos] == TERMINATOR {
                return None;
            }
            let (len, consumed) = ListPack::decode_varint(&data[pos..])?;
            let start = pos + consumed;
            let slice = &data[start..start + len];
            pos = start + len;
            Some(slice)
        })
    }

    /// Кодирует `usize` в формат переменной длины (varint).
    pub fn encode_varint(mut value: usize) -> Vec<u8> {
        let mut buf = Vec::new();
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                buf.push(byte);
                break;
            }
            buf.push(byte | 0x80);
        }
        buf
    }

    /// Декодирует varint из среза, возвращает (значение, прочитано байт).
    pub fn decode_varint(data: &[u8]) -> Option<(usize, usize)> {
        let mut result = 0usize;
        let mut shift = 0;
        for (i, &byte) in data.iter().enumerate() {
            result |= ((byte & 0x7F) as usize) << shift;
            if byte & 0x80 == 0 {
                return Some((result, i + 1));
            }
            shift += 7;
            if shift > usize::BITS as usize {
                return None;
            }
        }
        None
    }

    /// Границы записи с номером `index`: (начало записи, начало данных,
    /// конец записи).
    fn entry_bounds(&self, index: usize) -> Option<(usize, usize, usize)> {
        if index >= self.num_entries {
            return None;
        }
        let mut pos = self.head;
        let mut cur = 0;
        while self.data[pos] != TERMINATOR {
            let (len, consumed) = Self::decode_varint(&self.data[pos..])?;
            let data_start = pos + consumed;
            if cur == index {
                return Some((pos, data_start, data_start + len));
            }
            pos = data_start + len;
            cur += 1;
        }
        None
    }

    fn write_entry(&mut self, start: usize, len_bytes: &[u8], value: &[u8]) {
        self.data[start..start + len_bytes.len()].copy_from_slice(len_bytes);
        self.data[start + len_bytes.len()..start + len_bytes.len() + value.len()]
            .copy_from_slice(value);
    }

    /// Общая уборка после операций, уменьшивших список: сброс пустого
    /// состояния и рецентрирование при перекосе.
    fn after_shrink(&mut self) {
        if self.num_entries == 0 {
            let cap = self.data.len();
            self.head = cap / 2;
            self.tail = self.head + 1;
            self.data[self.head] = TERMINATOR;
            return;
        }
        if self.head > self.data.len() / 2 || self.tail > self.data.len() * 3 / 4 {
            self.recenter();
        }
    }

    /// Амортизированное расширение и центрирование буфера: после вызова
    /// с обеих сторон занятой области есть не менее `extra` байт.
    fn grow_and_center(&mut self, extra: usize) {
        let space_before = self.head;
        let space_after = self.data.len() - self.tail;
        if space_before >= extra && space_after >= extra {
            return;
        }

        let used = self.tail - self.head;
        let need = used + extra;
        let new_cap = (self.data.len().max(1) * 3 / 2).max(need * 2);
        let mut new_data = vec![0; new_cap];

        let new_head = (new_cap - used) / 2;
        new_data[new_head..new_head + used].copy_from_slice(&self.data[self.head..self.tail]);

        self.head = new_head;
        self.tail = new_head + used;
        self.data = new_data;
    }

    /// Возвращает занятую область в центр буфера.
    fn recenter(&mut self) {
        let used = self.tail - self.head;
        let new_head = (self.data.len() - used) / 2;
        if new_head == self.head {
            return;
        }

        if new_head < self.head {
            self.data.copy_within(self.head..self.tail, new_head);
        } else {
            // копируем с конца, области могут перекрываться
            for i in (0..used).rev() {
                self.data[new_head + i] = self.data[self.head + i];
            }
        }

        self.head = new_head;
        self.tail = new_head + used;
    }
}

impl Default for ListPack {
    fn default() -> Self {
        Self::new()
    }
}
