//! `QuickList` — узловое представление больших списков.
//!
//! Последовательность узлов, каждый из которых либо упакованный
//! (`ListPack` с несколькими элементами), либо простой (один элемент,
//! слишком крупный для упаковки). Узлы делятся при переполнении, лимит
//! узла задаётся той же знаковой конвенцией, что и у компактной
//! кодировки.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::{
    limits::{node_exceeds_limit, node_limit, SIZE_SAFETY_LIMIT},
    listpack::ListPack,
    sds::Sds,
};

/// Содержимое узла: пачка элементов или один негабаритный элемент.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeContainer {
    Packed(ListPack),
    Plain(Sds),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickListNode {
    container: NodeContainer,
}

impl QuickListNode {
    fn packed(lp: ListPack) -> Self {
        Self {
            container: NodeContainer::Packed(lp),
        }
    }

    fn plain(value: &[u8]) -> Self {
        Self {
            container: NodeContainer::Plain(Sds::from_bytes(value)),
        }
    }

    /// Число элементов в узле.
    pub fn count(&self) -> usize {
        match &self.container {
            NodeContainer::Packed(lp) => lp.len(),
            NodeContainer::Plain(_) => 1,
        }
    }

    /// Размер полезной области узла в байтах.
    pub fn bytes(&self) -> usize {
        match &self.container {
            NodeContainer::Packed(lp) => lp.total_bytes(),
            NodeContainer::Plain(s) => s.len(),
        }
    }

    pub fn is_packed(&self) -> bool {
        matches!(self.container, NodeContainer::Packed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickList {
    nodes: VecDeque<QuickListNode>,
    count: usize,
    fill: i64,
    compress_depth: u32,
}

impl QuickList {
    pub fn new() -> Self {
        Self {
            nodes: VecDeque::new(),
            count: 0,
            fill: -2,
            compress_depth: 0,
        }
    }

    /// Задаёт лимит узла и глубину несжимаемой зоны. Кодек сжатия —
    /// внешний коллаборатор, глубина только сохраняется.
    pub fn set_options(&mut self, fill: i64, compress_depth: u32) {
        self.fill = fill;
        self.compress_depth = compress_depth;
    }

    /// Общее число элементов.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Число узлов.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Головной узел для интроспекции (проверка условия демоции).
    pub fn head_node(&self) -> Option<&QuickListNode> {
        self.nodes.front()
    }

    /// Число элементов в узле с данным номером.
    pub fn node_len(&self, node_idx: usize) -> Option<usize> {
        self.nodes.get(node_idx).map(|n| n.count())
    }

    /// Поглощает готовый ListPack как единственный упакованный узел.
    /// Используется при промоции компактной кодировки.
    pub fn append_listpack(&mut self, lp: ListPack) {
        self.count += lp.len();
        self.nodes.push_back(QuickListNode::packed(lp));
    }

    /// Вставляет значение в начало списка.
    pub fn push_front(&mut self, value: &[u8]) {
        self.count += 1;
        if self.is_large_element(value.len()) {
            self.nodes.push_front(QuickListNode::plain(value));
            return;
        }
        let fits = match self.nodes.front() {
            Some(node) if node.is_packed() => !self.would_overflow(node, value.len()),
            _ => false,
        };
        if fits {
            if let Some(NodeContainer::Packed(lp)) =
                self.nodes.front_mut().map(|n| &mut n.container)
            {
                lp.push_front(value);
                return;
            }
        }
        let mut lp = ListPack::new();
        lp.push_front(value);
        self.nodes.push_front(QuickListNode::packed(lp));
    }

    /// Вставляет значение в конец списка.
    pub fn push_back(&mut self, value: &[u8]) {
        self.count += 1;
        if self.is_large_element(value.len()) {
            self.nodes.push_back(QuickListNode::plain(value));
            return;
        }
        let fits = match self.nodes.back() {
            Some(node) if node.is_packed() => !self.would_overflow(node, value.len()),
            _ => false,
        };
        if fits {
            if let Some(NodeContainer::Packed(lp)) =
                self.nodes.back_mut().map(|n| &mut n.container)
            {
                lp.push_back(value);
                return;
            }
        }
        let mut lp = ListPack::new();
        lp.push_back(value);
        self.nodes.push_back(QuickListNode::packed(lp));
    }

    /// Извлекает первый элемент, передавая его байты в `saver` без
    /// промежуточной аллокации.
    pub fn pop_front_with<T>(&mut self, saver: impl FnOnce(&[u8]) -> T) -> Option<T> {
        let node = self.nodes.front_mut()?;
        let (result, emptied) = match &mut node.container {
            NodeContainer::Packed(lp) => {
                let bytes = lp.pop_front()?;
                (saver(&bytes), lp.is_empty())
            }
            NodeContainer::Plain(s) => (saver(s.as_slice()), true),
        };
        if emptied {
            self.nodes.pop_front();
        }
        self.count -= 1;
        Some(result)
    }

    /// Извлекает последний элемент, передавая его байты в `saver`.
    pub fn pop_back_with<T>(&mut self, saver: impl FnOnce(&[u8]) -> T) -> Option<T> {
        let node = self.nodes.back_mut()?;
        let (result, emptied) = match &mut node.container {
            NodeContainer::Packed(lp) => {
                let bytes = lp.pop_back()?;
                (saver(&bytes), lp.is_empty())
            }
            NodeContainer::Plain(s) => (saver(s.as_slice()), true),
        };
        if emptied {
            self.nodes.pop_back();
        }
        self.count -= 1;
        Some(result)
    }

    /// Переводит порядковый номер в курсор (узел, позиция в узле).
    pub fn seek(&self, index: usize) -> Option<(usize, usize)> {
        if index >= self.count {
            return None;
        }
        let mut remaining = index;
        for (node_idx, node) in self.nodes.iter().enumerate() {
            let c = node.count();
            if remaining < c {
                return Some((node_idx, remaining));
            }
            remaining -= c;
        }
        None
    }

    /// Элемент по курсору.
    pub fn get_at(&self, node_idx: usize, entry_idx: usize) -> Option<&[u8]> {
        match &self.nodes.get(node_idx)?.container {
            NodeContainer::Packed(lp) => lp.get(entry_idx),
            NodeContainer::Plain(s) => {
                if entry_idx == 0 {
                    Some(s.as_slice())
                } else {
                    None
                }
            }
        }
    }

    /// Вставляет значение рядом с курсором (до или после элемента).
    pub fn insert_at(&mut self, node_idx: usize, entry_idx: usize, value: &[u8], after: bool) {
        self.count += 1;

        if self.is_large_element(value.len()) {
            self.insert_node_around(node_idx, entry_idx, QuickListNode::plain(value), after);
            return;
        }

        let node = &self.nodes[node_idx];
        if node.is_packed() && !self.would_overflow(node, value.len()) {
            if let NodeContainer::Packed(lp) = &mut self.nodes[node_idx].container {
                if after {
                    lp.insert_after(entry_idx, value);
                } else {
                    lp.insert_before(entry_idx, value);
                }
                return;
            }
        }

        let mut lp = ListPack::new();
        lp.push_back(value);
        self.insert_node_around(node_idx, entry_idx, QuickListNode::packed(lp), after);
    }

    /// Заменяет элемент по курсору.
    pub fn replace_at(&mut self, node_idx: usize, entry_idx: usize, value: &[u8]) {
        if self.is_large_element(value.len()) {
            // негабаритная замена живёт в собственном узле
            self.delete_at(node_idx, entry_idx);
            self.count += 1;
            if self.nodes.is_empty() || node_idx >= self.nodes.len() {
                self.nodes.push_back(QuickListNode::plain(value));
            } else if entry_idx == 0 {
                self.nodes.insert(node_idx, QuickListNode::plain(value));
            } else {
                self.split_packed(node_idx, entry_idx);
                self.nodes.insert(node_idx + 1, QuickListNode::plain(value));
            }
            return;
        }

        match &mut self.nodes[node_idx].container {
            NodeContainer::Packed(lp) => {
                let replaced = lp.replace(entry_idx, value);
                debug_assert!(replaced, "replace cursor out of range");
            }
            NodeContainer::Plain(_) => {
                self.nodes[node_idx] = {
                    let mut lp = ListPack::new();
                    lp.push_back(value);
                    QuickListNode::packed(lp)
                };
            }
        }
    }

    /// Удаляет элемент по курсору; пустой узел исчезает.
    pub fn delete_at(&mut self, node_idx: usize, entry_idx: usize) {
        let drop_node = match &mut self.nodes[node_idx].container {
            NodeContainer::Packed(lp) => {
                let removed = lp.remove(entry_idx);
                debug_assert!(removed, "delete cursor out of range");
                lp.is_empty()
            }
            NodeContainer::Plain(_) => true,
        };
        if drop_node {
            self.nodes.remove(node_idx);
        }
        self.count -= 1;
    }

    /// Разбирает список в единственный упакованный узел, если он таков.
    /// Используется демоцией обратно в компактную кодировку.
    pub fn into_single_packed(mut self) -> Option<ListPack> {
        if self.nodes.len() != 1 {
            return None;
        }
        match self.nodes.pop_front()?.container {
            NodeContainer::Packed(lp) => Some(lp),
            NodeContainer::Plain(_) => None,
        }
    }

    /// Итератор по всем элементам от головы к хвосту.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.nodes.iter().flat_map(|node| {
            let (packed, plain): (Option<&ListPack>, Option<&Sds>) = match &node.container {
                NodeContainer::Packed(lp) => (Some(lp), None),
                NodeContainer::Plain(s) => (None, Some(s)),
            };
            packed
                .into_iter()
                .flat_map(|lp| lp.iter())
                .chain(plain.into_iter().map(|s| s.as_slice()))
        })
    }

    /// Элемент крупнее лимита узла хранится в простом узле целиком.
    fn is_large_element(&self, len: usize) -> bool {
        let (sz_limit, _) = node_limit(self.fill);
        if sz_limit != 0 {
            len > sz_limit
        } else {
            len > SIZE_SAFETY_LIMIT
        }
    }

    /// Перельётся ли упакованный узел при добавлении элемента `len`.
    fn would_overflow(&self, node: &QuickListNode, len: usize) -> bool {
        let entry = ListPack::encode_varint(len).len() + len;
        node_exceeds_limit(self.fill, node.bytes() + entry, node.count() + 1)
    }

    /// Вставляет новый узел вокруг курсора, при необходимости разрезая
    /// упакованный узел по месту вставки.
    fn insert_node_around(
        &mut self,
        node_idx: usize,
        entry_idx: usize,
        new_node: QuickListNode,
        after: bool,
    ) {
        let node_count = self.nodes[node_idx].count();
        let boundary = if after { entry_idx + 1 } else { entry_idx };

        if boundary == 0 {
            self.nodes.insert(node_idx, new_node);
        } else if boundary >= node_count {
            self.nodes.insert(node_idx + 1, new_node);
        } else {
            self.split_packed(node_idx, boundary);
            self.nodes.insert(node_idx + 1, new_node);
        }
    }

    /// Разрезает упакованный узел: элементы с позиции `at` переезжают в
    /// новый узел сразу за ним.
    fn split_packed(&mut self, node_idx: usize, at: usize) {
        let tail_part = match &mut self.nodes[node_idx].container {
            NodeContainer::Packed(lp) => {
                let mut moved = Vec::with_capacity(lp.len() - at);
                while lp.len() > at {
                    moved.push(lp.pop_back().expect("len checked"));
                }
                moved.reverse();
                moved
            }
            NodeContainer::Plain(_) => panic!("cannot split a plain node"),
        };

        let mut lp = ListPack::new();
        for entry in &tail_part {
            lp.push_back(entry);
        }
        self.nodes.insert(node_idx + 1, QuickListNode::packed(lp));
    }
}

impl Default for QuickList {
    fn default() -> Self {
        Self::new()
    }
}
