//! `ListObject` — список с двумя сменными представлениями.
//!
//! Маленькие списки живут в компактном буфере (`ListPack`), большие —
//! в узловой структуре (`QuickList`). Переходы между представлениями
//! управляются порогами из конфигурации: промоция при росте проверяет
//! прогнозируемый след коллекции ещё до вставки, демоция при усадке
//! срабатывает только на половине порога, чтобы не дребезжать на
//! границе.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    limits::node_exceeds_limit,
    listpack::ListPack,
    quicklist::QuickList,
    sds::Sds,
    types::{ConvTrigger, Direction, End, EntryValue, ListEncoding},
};
use crate::config::Settings;

/// Колбэк, вызываемый непосредственно перед сменой представления,
/// пока старое ещё доступно для чтения.
pub type BeforeConvert<'a> = Option<&'a mut dyn FnMut()>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListObject {
    ListPack(ListPack),
    QuickList(QuickList),
}

impl ListObject {
    /// Новый пустой список в компактном представлении.
    pub fn new() -> Self {
        ListObject::ListPack(ListPack::new())
    }

    pub fn encoding(&self) -> ListEncoding {
        match self {
            ListObject::ListPack(_) => ListEncoding::ListPack,
            ListObject::QuickList(_) => ListEncoding::QuickList,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ListObject::ListPack(lp) => lp.len(),
            ListObject::QuickList(ql) => ql.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Добавляет элемент с выбранного конца. Перед вставкой выполняется
    /// проверка роста, так что компактный буфер никогда не выходит за
    /// порог.
    pub fn push(&mut self, value: &[u8], end: End, settings: &Settings) {
        self.try_convert_append(&[EntryValue::from_bytes(value)], settings, None);
        match (self, end) {
            (ListObject::ListPack(lp), End::Head) => lp.push_front(value),
            (ListObject::ListPack(lp), End::Tail) => lp.push_back(value),
            (ListObject::QuickList(ql), End::Head) => ql.push_front(value),
            (ListObject::QuickList(ql), End::Tail) => ql.push_back(value),
        }
    }

    /// Снимает элемент с выбранного конца. Представление при этом не
    /// меняется: усадку проверяет вызывающий через `try_convert`.
    pub fn pop(&mut self, end: End) -> Option<Sds> {
        match (self, end) {
            (ListObject::ListPack(lp), End::Head) => lp.pop_front().map(|b| Sds::from_vec(b)),
            (ListObject::ListPack(lp), End::Tail) => lp.pop_back().map(|b| Sds::from_vec(b)),
            (ListObject::QuickList(ql), End::Head) => ql.pop_front_with(|b| Sds::from_bytes(b)),
            (ListObject::QuickList(ql), End::Tail) => ql.pop_back_with(|b| Sds::from_bytes(b)),
        }
    }

    /// Проверяет необходимость смены представления без учёта новых
    /// элементов.
    pub fn try_convert(
        &mut self,
        trigger: ConvTrigger,
        settings: &Settings,
        before: BeforeConvert<'_>,
    ) {
        match self {
            ListObject::ListPack(_) => {
                if trigger != ConvTrigger::Shrinking {
                    self.try_promote(&[], settings, before);
                }
            }
            ListObject::QuickList(_) => {
                if trigger != ConvTrigger::Growing {
                    self.try_demote(trigger == ConvTrigger::Shrinking, settings, before);
                }
            }
        }
    }

    /// Проверка роста с учётом элементов, которые вот-вот будут
    /// добавлены: промоция происходит до вставки, если прогнозируемый
    /// след превысит порог. Целые добавляют только счётчик, строки —
    /// ещё и байты.
    pub fn try_convert_append(
        &mut self,
        added: &[EntryValue<'_>],
        settings: &Settings,
        before: BeforeConvert<'_>,
    ) {
        if matches!(self, ListObject::ListPack(_)) {
            self.try_promote(added, settings, before);
        }
    }

    fn try_promote(
        &mut self,
        added: &[EntryValue<'_>],
        settings: &Settings,
        before: BeforeConvert<'_>,
    ) {
        let lp = match self {
            ListObject::ListPack(lp) => lp,
            ListObject::QuickList(_) => return,
        };

        let mut add_bytes = 0usize;
        for v in added {
            if let EntryValue::Str(b) = v {
                add_bytes += b.len();
            }
        }

        let fill = settings.list_max_listpack_size;
        if !node_exceeds_limit(fill, lp.total_bytes() + add_bytes, lp.len() + added.len()) {
            return;
        }

        if let Some(f) = before {
            f();
        }
        let lp = match std::mem::replace(self, ListObject::QuickList(QuickList::new())) {
            ListObject::ListPack(lp) => lp,
            ListObject::QuickList(_) => unreachable!("encoding checked above"),
        };
        let len = lp.len();
        let mut ql = QuickList::new();
        ql.set_options(fill, settings.list_compress_depth);
        ql.append_listpack(lp);
        *self = ListObject::QuickList(ql);
        debug!("list promoted to quicklist encoding (len={len})");
    }

    /// Демоция возможна только когда весь список лежит в единственном
    /// упакованном узле. При усадке пороги дополнительно делятся
    /// пополам, чтобы граница не дребезжала.
    fn try_demote(&mut self, shrinking: bool, settings: &Settings, before: BeforeConvert<'_>) {
        let ql = match self {
            ListObject::QuickList(ql) => ql,
            ListObject::ListPack(_) => return,
        };

        if ql.node_count() != 1 {
            return;
        }
        let head = match ql.head_node() {
            Some(n) if n.is_packed() => n,
            _ => return,
        };

        let (mut sz_limit, mut count_limit) =
            super::limits::node_limit(settings.list_max_listpack_size);
        if shrinking {
            sz_limit /= 2;
            count_limit /= 2;
        }
        if sz_limit != 0 {
            if head.bytes() > sz_limit {
                return;
            }
        } else if ql.len() > count_limit {
            return;
        }

        if let Some(f) = before {
            f();
        }
        let ql = match std::mem::replace(self, ListObject::ListPack(ListPack::new())) {
            ListObject::QuickList(ql) => ql,
            ListObject::ListPack(_) => unreachable!("encoding checked above"),
        };
        let len = ql.len();
        match ql.into_single_packed() {
            Some(lp) => {
                *self = ListObject::ListPack(lp);
                debug!("list demoted to listpack encoding (len={len})");
            }
            None => unreachable!("single packed node checked above"),
        }
    }

    /// Итератор с правом мутации. `start` — логический индекс первого
    /// выдаваемого элемента, отрицательные значения отсчитываются от
    /// хвоста (-1 — последний).
    pub fn iter_mut(&mut self, direction: Direction, start: i64) -> ListIter<'_> {
        let len = self.len() as i64;
        let resolved = if start < 0 { len + start } else { start };
        let next_idx = if resolved >= 0 && resolved < len {
            Some(resolved as usize)
        } else {
            None
        };
        let encoding = self.encoding();
        ListIter {
            list: self,
            encoding,
            direction,
            next_idx,
            cur: None,
        }
    }

    fn entry_bytes(&self, idx: usize) -> Option<&[u8]> {
        match self {
            ListObject::ListPack(lp) => lp.get(idx),
            ListObject::QuickList(ql) => {
                let (n, e) = ql.seek(idx)?;
                ql.get_at(n, e)
            }
        }
    }

    fn insert_at_index(&mut self, idx: usize, value: &[u8], after: bool) {
        match self {
            ListObject::ListPack(lp) => {
                if after {
                    lp.insert_after(idx, value);
                } else {
                    lp.insert_before(idx, value);
                }
            }
            ListObject::QuickList(ql) => {
                if let Some((n, e)) = ql.seek(idx) {
                    ql.insert_at(n, e, value, after);
                }
            }
        }
    }

    fn replace_at_index(&mut self, idx: usize, value: &[u8]) {
        match self {
            ListObject::ListPack(lp) => {
                lp.replace(idx, value);
            }
            ListObject::QuickList(ql) => {
                if let Some((n, e)) = ql.seek(idx) {
                    ql.replace_at(n, e, value);
                }
            }
        }
    }

    fn delete_at_index(&mut self, idx: usize) {
        match self {
            ListObject::ListPack(lp) => {
                lp.remove(idx);
            }
            ListObject::QuickList(ql) => {
                if let Some((n, e)) = ql.seek(idx) {
                    ql.delete_at(n, e);
                }
            }
        }
    }
}

impl Default for ListObject {
    fn default() -> Self {
        Self::new()
    }
}

/// Итератор по списку с операциями над текущим элементом.
///
/// Держит эксклюзивную ссылку на список: пока итератор жив, никакая
/// сторонняя операция не может сменить представление у него под ногами.
/// Вставки самого итератора никогда не попадают в его собственный
/// обход.
pub struct ListIter<'a> {
    list: &'a mut ListObject,
    /// Представление на момент создания; живой итератор исключает его
    /// смену, снимок лишь страхует этот инвариант.
    encoding: ListEncoding,
    direction: Direction,
    /// Индекс элемента, на который перейдёт следующий `step`.
    next_idx: Option<usize>,
    /// Индекс текущего элемента (последнего выданного).
    cur: Option<usize>,
}

impl<'a> ListIter<'a> {
    /// Переходит к следующему элементу. Возвращает false, когда обход
    /// закончен.
    pub fn step(&mut self) -> bool {
        debug_assert_eq!(self.encoding, self.list.encoding());
        let idx = match self.next_idx {
            Some(i) if i < self.list.len() => i,
            _ => {
                self.cur = None;
                self.next_idx = None;
                return false;
            }
        };
        self.cur = Some(idx);
        self.next_idx = match self.direction {
            Direction::Forward => Some(idx + 1),
            Direction::Backward => idx.checked_sub(1),
        };
        true
    }

    /// Текущий элемент; целые в канонической записи выдаются как `Int`.
    pub fn value(&self) -> Option<EntryValue<'_>> {
        let idx = self.cur?;
        self.list.entry_bytes(idx).map(EntryValue::from_bytes)
    }

    /// Меняет направление обхода, не трогая текущий элемент.
    pub fn set_direction(&mut self, direction: Direction) {
        if self.direction == direction {
            return;
        }
        self.direction = direction;
        if let Some(c) = self.cur {
            self.next_idx = match direction {
                Direction::Forward => Some(c + 1),
                Direction::Backward => c.checked_sub(1),
            };
        }
    }

    /// Вставляет значение перед текущим элементом. Проверку роста
    /// вызывающий делает заранее через `try_convert_append`.
    pub fn insert_before(&mut self, value: &[u8]) {
        let Some(c) = self.cur else { return };
        self.list.insert_at_index(c, value, false);
        self.shift_from(c);
    }

    /// Вставляет значение после текущего элемента.
    pub fn insert_after(&mut self, value: &[u8]) {
        let Some(c) = self.cur else { return };
        self.list.insert_at_index(c, value, true);
        self.shift_from(c + 1);
    }

    /// Заменяет текущий элемент.
    pub fn replace(&mut self, value: &[u8]) {
        if let Some(c) = self.cur {
            self.list.replace_at_index(c, value);
        }
    }

    /// Удаляет текущий элемент. При прямом обходе следующим будет
    /// элемент, стоявший за удалённым; при обратном — стоявший перед
    /// ним.
    pub fn delete(&mut self) {
        let Some(c) = self.cur else { return };
        self.list.delete_at_index(c);
        self.cur = None;
        self.next_idx = match self.direction {
            Direction::Forward => Some(c),
            Direction::Backward => c.checked_sub(1),
        };
    }

    /// Сдвигает хранимые индексы после вставки в позицию `at`.
    fn shift_from(&mut self, at: usize) {
        if let Some(c) = &mut self.cur {
            if *c >= at {
                *c += 1;
            }
        }
        if let Some(n) = &mut self.next_idx {
            if *n >= at {
                *n += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_fill(fill: i64) -> Settings {
        Settings {
            list_max_listpack_size: fill,
            ..Settings::default()
        }
    }

    fn fill_list(list: &mut ListObject, n: usize, settings: &Settings) {
        for i in 0..n {
            list.push(format!("item-{i}").as_bytes(), End::Tail, settings);
        }
    }

    #[test]
    fn test_push_pop_stays_listpack_under_limit() {
        let settings = settings_with_fill(128);
        let mut list = ListObject::new();
        fill_list(&mut list, 100, &settings);

        assert_eq!(list.encoding(), ListEncoding::ListPack);
        assert_eq!(list.len(), 100);
        assert_eq!(list.pop(End::Head).unwrap().as_slice(), b"item-0");
        assert_eq!(list.pop(End::Tail).unwrap().as_slice(), b"item-99");
    }

    /// Тест проверяет промоцию ровно на пороге по числу элементов.
    #[test]
    fn test_promotion_at_count_limit() {
        let settings = settings_with_fill(8);
        let mut list = ListObject::new();
        fill_list(&mut list, 8, &settings);
        assert_eq!(list.encoding(), ListEncoding::ListPack);

        list.push(b"one-more", End::Tail, &settings);
        assert_eq!(list.encoding(), ListEncoding::QuickList);
        assert_eq!(list.len(), 9);
    }

    /// Тест проверяет, что один негабаритный элемент промоутит список
    /// по страховочному пределу размера.
    #[test]
    fn test_promotion_on_large_element() {
        let settings = settings_with_fill(128);
        let mut list = ListObject::new();
        let big = vec![b'x'; 9000];
        list.push(&big, End::Tail, &settings);
        assert_eq!(list.encoding(), ListEncoding::QuickList);
    }

    /// Тест проверяет, что канонические целые не вносят байтов в
    /// прогноз роста.
    #[test]
    fn test_growth_check_ignores_integer_bytes() {
        let settings = settings_with_fill(-1); // 4 KiB
        let mut list = ListObject::new();
        fill_list(&mut list, 10, &settings);
        assert_eq!(list.encoding(), ListEncoding::ListPack);

        // большой пакет целых: байты прогнозом не учитываются,
        // фактический размер остаётся под лимитом
        let added: Vec<EntryValue> = (0..100).map(|_| EntryValue::Int(7)).collect();
        list.try_convert_append(&added, &settings, None);
        assert_eq!(list.encoding(), ListEncoding::ListPack);
    }

    #[test]
    fn test_pop_never_demotes() {
        let settings = settings_with_fill(4);
        let mut list = ListObject::new();
        fill_list(&mut list, 10, &settings);
        assert_eq!(list.encoding(), ListEncoding::QuickList);

        while list.len() > 1 {
            list.pop(End::Tail);
        }
        assert_eq!(list.encoding(), ListEncoding::QuickList);
    }

    /// Тест проверяет гистерезис демоции: при усадке порог делится
    /// пополам.
    #[test]
    fn test_shrinking_demotes_at_half_limit() {
        let settings = settings_with_fill(8);
        let mut list = ListObject::new();
        fill_list(&mut list, 9, &settings);
        assert_eq!(list.encoding(), ListEncoding::QuickList);

        // выше половины порога — остаёмся в узловом представлении
        while list.len() > 5 {
            list.pop(End::Tail);
            list.try_convert(ConvTrigger::Shrinking, &settings, None);
        }
        assert_eq!(list.encoding(), ListEncoding::QuickList);

        // ровно половина порога — демоция
        list.pop(End::Tail);
        list.try_convert(ConvTrigger::Shrinking, &settings, None);
        assert_eq!(list.encoding(), ListEncoding::ListPack);
        assert_eq!(list.len(), 4);
    }

    /// Тест проверяет, что Auto демотирует по полному порогу, без
    /// половинной скидки.
    #[test]
    fn test_auto_demotes_at_full_limit() {
        let settings = settings_with_fill(8);
        let mut list = ListObject::new();
        fill_list(&mut list, 9, &settings);
        assert_eq!(list.encoding(), ListEncoding::QuickList);

        list.pop(End::Tail);
        list.try_convert(ConvTrigger::Auto, &settings, None);
        assert_eq!(list.encoding(), ListEncoding::ListPack);
    }

    #[test]
    fn test_before_convert_hook_runs_once() {
        let settings = settings_with_fill(4);
        let mut list = ListObject::new();
        fill_list(&mut list, 4, &settings);

        let mut calls = 0;
        let added = [EntryValue::Str(b"x")];
        list.try_convert_append(&added, &settings, Some(&mut || calls += 1));
        assert_eq!(list.encoding(), ListEncoding::QuickList);
        assert_eq!(calls, 1);

        // повторная проверка без роста ничего не конвертирует
        list.try_convert_append(&added, &settings, Some(&mut || calls += 1));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_iter_forward_and_backward() {
        let settings = settings_with_fill(128);
        let mut list = ListObject::new();
        fill_list(&mut list, 5, &settings);

        let mut seen = Vec::new();
        let mut it = list.iter_mut(Direction::Forward, 0);
        while it.step() {
            seen.push(it.value().unwrap().to_sds());
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[0].as_slice(), b"item-0");
        assert_eq!(seen[4].as_slice(), b"item-4");

        let mut it = list.iter_mut(Direction::Backward, -1);
        assert!(it.step());
        assert_eq!(it.value().unwrap().to_sds().as_slice(), b"item-4");
        assert!(it.step());
        assert_eq!(it.value().unwrap().to_sds().as_slice(), b"item-3");
    }

    #[test]
    fn test_iter_negative_start_out_of_range() {
        let settings = settings_with_fill(128);
        let mut list = ListObject::new();
        fill_list(&mut list, 3, &settings);

        let mut it = list.iter_mut(Direction::Forward, -10);
        assert!(!it.step());
        let mut it = list.iter_mut(Direction::Forward, 3);
        assert!(!it.step());
    }

    /// Тест проверяет перестановку курсора после удаления: вперёд —
    /// следующим идёт элемент за удалённым, назад — перед ним.
    #[test]
    fn test_iter_delete_repositioning() {
        let settings = settings_with_fill(128);
        let mut list = ListObject::new();
        fill_list(&mut list, 4, &settings);

        let mut it = list.iter_mut(Direction::Forward, 0);
        it.step(); // item-0
        it.step(); // item-1
        it.delete();
        assert!(it.step());
        assert_eq!(it.value().unwrap().to_sds().as_slice(), b"item-2");

        let mut it = list.iter_mut(Direction::Backward, -1);
        it.step(); // item-3
        it.delete();
        assert!(it.step());
        assert_eq!(it.value().unwrap().to_sds().as_slice(), b"item-2");
    }

    #[test]
    fn test_iter_insert_not_revisited() {
        let settings = settings_with_fill(128);
        let mut list = ListObject::new();
        fill_list(&mut list, 3, &settings);

        let mut it = list.iter_mut(Direction::Forward, 0);
        it.step(); // item-0
        it.insert_before(b"pre");
        it.insert_after(b"post");
        assert_eq!(it.value().unwrap().to_sds().as_slice(), b"item-0");
        assert!(it.step());
        // вставленный "post" не посещается
        assert_eq!(it.value().unwrap().to_sds().as_slice(), b"item-1");
        drop(it);

        let all: Vec<Sds> = {
            let mut out = Vec::new();
            let mut it = list.iter_mut(Direction::Forward, 0);
            while it.step() {
                out.push(it.value().unwrap().to_sds());
            }
            out
        };
        let expected: Vec<&[u8]> = vec![b"pre", b"item-0", b"post", b"item-1", b"item-2"];
        assert_eq!(all.iter().map(|s| s.as_slice()).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_iter_replace_and_set_direction() {
        let settings = settings_with_fill(128);
        let mut list = ListObject::new();
        fill_list(&mut list, 3, &settings);

        let mut it = list.iter_mut(Direction::Forward, 0);
        it.step(); // item-0
        it.step(); // item-1
        it.replace(b"mid");
        assert_eq!(it.value().unwrap().to_sds().as_slice(), b"mid");

        it.set_direction(Direction::Backward);
        assert!(it.step());
        assert_eq!(it.value().unwrap().to_sds().as_slice(), b"item-0");
        assert!(!it.step());
    }

    #[test]
    fn test_iter_works_across_quicklist() {
        let settings = settings_with_fill(2);
        let mut list = ListObject::new();
        fill_list(&mut list, 7, &settings);
        assert_eq!(list.encoding(), ListEncoding::QuickList);

        let mut out = Vec::new();
        let mut it = list.iter_mut(Direction::Forward, 0);
        while it.step() {
            out.push(it.value().unwrap().to_sds());
        }
        assert_eq!(out.len(), 7);
        assert_eq!(out[3].as_slice(), b"item-3");
    }

    #[test]
    fn test_integer_entries_come_back_as_int() {
        let settings = settings_with_fill(128);
        let mut list = ListObject::new();
        list.push(b"42", End::Tail, &settings);
        list.push(b"hello", End::Tail, &settings);

        let mut it = list.iter_mut(Direction::Forward, 0);
        it.step();
        assert_eq!(it.value().unwrap().as_int(), Some(42));
        it.step();
        assert_eq!(it.value().unwrap().as_int(), None);
    }
}
