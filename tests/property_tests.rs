//! Property-based тесты фасадов коллекций.
//!
//! Случайные последовательности операций сравниваются с эталонными
//! структурами стандартной библиотеки: содержимое обязано совпадать
//! независимо от того, в каком представлении коллекция оказалась.

use std::collections::{HashSet, VecDeque};

use kivo::{ConvTrigger, Direction, End, ListObject, SetEncoding, SetObject, Settings};
use proptest::prelude::*;

const PROPTEST_CASES: u32 = 256;

#[derive(Debug, Clone)]
enum ListOp {
    PushHead(String),
    PushTail(String),
    PopHead,
    PopTail,
}

fn list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        "[a-z0-9]{0,12}".prop_map(ListOp::PushHead),
        "[a-z0-9]{0,12}".prop_map(ListOp::PushTail),
        Just(ListOp::PopHead),
        Just(ListOp::PopTail),
    ]
}

#[derive(Debug, Clone)]
enum SetOp {
    Add(String),
    Remove(String),
}

/// Узкий алфавит, чтобы операции сталкивались на одних и тех же
/// элементах; числа в каноничной записи попадают в IntSet.
fn set_op() -> impl Strategy<Value = SetOp> {
    let member = prop_oneof![
        (0i64..30).prop_map(|v| v.to_string()),
        "[ab]{1,3}",
        "[a-z]{70}", // длиннее порога значения
    ];
    prop_oneof![
        member.clone().prop_map(SetOp::Add),
        member.prop_map(SetOp::Remove),
    ]
}

fn encoding_rank(e: SetEncoding) -> u8 {
    match e {
        SetEncoding::IntSet => 0,
        SetEncoding::ListPack => 1,
        SetEncoding::HashTable => 2,
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: PROPTEST_CASES,
        ..ProptestConfig::default()
    })]

    /// Список ведёт себя как VecDeque при любой последовательности
    /// push/pop, с периодическими проверками усадки.
    #[test]
    fn prop_list_matches_vecdeque(ops in prop::collection::vec(list_op(), 1..200)) {
        let settings = Settings {
            list_max_listpack_size: 16,
            ..Settings::default()
        };
        let mut list = ListObject::new();
        let mut model: VecDeque<Vec<u8>> = VecDeque::new();

        for (i, op) in ops.iter().enumerate() {
            match op {
                ListOp::PushHead(v) => {
                    list.push(v.as_bytes(), End::Head, &settings);
                    model.push_front(v.as_bytes().to_vec());
                }
                ListOp::PushTail(v) => {
                    list.push(v.as_bytes(), End::Tail, &settings);
                    model.push_back(v.as_bytes().to_vec());
                }
                ListOp::PopHead => {
                    let got = list.pop(End::Head).map(|s| s.as_slice().to_vec());
                    prop_assert_eq!(got, model.pop_front());
                }
                ListOp::PopTail => {
                    let got = list.pop(End::Tail).map(|s| s.as_slice().to_vec());
                    prop_assert_eq!(got, model.pop_back());
                }
            }
            prop_assert_eq!(list.len(), model.len());

            if i % 7 == 0 {
                list.try_convert(ConvTrigger::Shrinking, &settings, None);
                prop_assert_eq!(list.len(), model.len());
            }
        }

        let mut got = Vec::new();
        let mut it = list.iter_mut(Direction::Forward, 0);
        while it.step() {
            got.push(it.value().unwrap().to_sds().as_slice().to_vec());
        }
        let expected: Vec<Vec<u8>> = model.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    /// Обратный обход — это развёрнутый прямой, в любом представлении.
    #[test]
    fn prop_list_backward_is_reversed_forward(
        values in prop::collection::vec("[a-z]{1,8}", 1..100),
        fill in prop_oneof![Just(4i64), Just(16), Just(128)],
    ) {
        let settings = Settings {
            list_max_listpack_size: fill,
            ..Settings::default()
        };
        let mut list = ListObject::new();
        for v in &values {
            list.push(v.as_bytes(), End::Tail, &settings);
        }

        let mut forward = Vec::new();
        let mut it = list.iter_mut(Direction::Forward, 0);
        while it.step() {
            forward.push(it.value().unwrap().to_sds());
        }

        let mut backward = Vec::new();
        let mut it = list.iter_mut(Direction::Backward, -1);
        while it.step() {
            backward.push(it.value().unwrap().to_sds());
        }

        backward.reverse();
        prop_assert_eq!(forward, backward);
    }

    /// Множество ведёт себя как HashSet, а его представление не
    /// опускается по лестнице IntSet -> ListPack -> HashTable.
    #[test]
    fn prop_set_matches_hashset_and_is_monotonic(
        ops in prop::collection::vec(set_op(), 1..150),
    ) {
        let settings = Settings {
            set_max_intset_entries: 8,
            set_max_listpack_entries: 16,
            ..Settings::default()
        };
        let first = match &ops[0] {
            SetOp::Add(v) | SetOp::Remove(v) => v.clone(),
        };
        let mut set = SetObject::create(first.as_bytes(), 0, &settings);
        let mut model: HashSet<Vec<u8>> = HashSet::new();
        let mut rank = encoding_rank(set.encoding());

        for op in &ops {
            match op {
                SetOp::Add(v) => {
                    let added = set.add(v.as_bytes(), &settings);
                    prop_assert_eq!(added, model.insert(v.as_bytes().to_vec()));
                }
                SetOp::Remove(v) => {
                    let removed = set.remove(v.as_bytes());
                    prop_assert_eq!(removed, model.remove(v.as_bytes()));
                }
            }
            prop_assert_eq!(set.len(), model.len());

            let new_rank = encoding_rank(set.encoding());
            prop_assert!(new_rank >= rank, "encoding regressed: {} -> {}", rank, new_rank);
            rank = new_rank;
        }

        // членство совпадает поэлементно
        for m in &model {
            prop_assert!(set.is_member(m));
        }
        let collected: HashSet<Vec<u8>> = set
            .iter()
            .map(|e| e.to_sds().as_slice().to_vec())
            .collect();
        prop_assert_eq!(collected, model);
    }

    /// Копия множества равна оригиналу по содержимому.
    #[test]
    fn prop_set_duplicate_equals_original(
        members in prop::collection::hash_set("[a-z0-9]{1,6}", 0..40),
    ) {
        let settings = Settings::default();
        let mut set = SetObject::create(b"seed", members.len(), &settings);
        for m in &members {
            set.add(m.as_bytes(), &settings);
        }

        let copy = set.duplicate();
        prop_assert_eq!(copy.len(), set.len());
        prop_assert_eq!(copy.encoding(), set.encoding());
        for m in &members {
            prop_assert!(copy.is_member(m.as_bytes()));
        }
    }
}
