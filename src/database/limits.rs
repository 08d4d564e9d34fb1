//! Общие пороговые утилиты для выбора кодировок.
//!
//! Лимит упакованного узла задаётся одним числом со знаковой
//! конвенцией: положительное значение ограничивает число элементов,
//! отрицательное выбирает предел размера в байтах из фиксированной
//! шкалы. Оба предела никогда не активны одновременно.

/// Верхняя граница размера узла, когда активен только предел по числу
/// элементов.
pub const SIZE_SAFETY_LIMIT: usize = 8192;

/// Шкала пределов размера для отрицательного лимита: -1 = 4 KiB,
/// -2 = 8 KiB, ... -5 = 64 KiB.
const OPTIMIZATION_LEVEL: [usize; 5] = [4096, 8192, 16384, 32768, 65536];

/// Разворачивает сырой лимит в пару (предел размера, предел числа
/// элементов); ровно один из них ненулевой.
pub fn node_limit(fill: i64) -> (usize, usize) {
    if fill > 0 {
        (0, fill as usize)
    } else if fill < 0 {
        let idx = ((-fill) as usize - 1).min(OPTIMIZATION_LEVEL.len() - 1);
        (OPTIMIZATION_LEVEL[idx], 0)
    } else {
        panic!("node fill factor must not be zero");
    }
}

/// Проверяет, выходит ли узел с прогнозируемыми размером и числом
/// элементов за сконфигурированный лимит.
pub fn node_exceeds_limit(fill: i64, new_sz: usize, new_count: usize) -> bool {
    let (sz_limit, count_limit) = node_limit(fill);

    if sz_limit != 0 {
        return new_sz > sz_limit;
    }

    // При лимите по количеству размер всё равно ограничен сверху.
    if new_sz > SIZE_SAFETY_LIMIT {
        return true;
    }
    new_count > count_limit
}

/// Число байт десятичной записи числа, включая знак минус.
pub fn digits10(v: i64) -> usize {
    if v == 0 {
        return 1;
    }
    let mut n = v.unsigned_abs();
    let mut digits = if v < 0 { 1 } else { 0 };
    while n > 0 {
        digits += 1;
        n /= 10;
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет знаковую конвенцию лимита.
    #[test]
    fn test_node_limit_sign_convention() {
        assert_eq!(node_limit(128), (0, 128));
        assert_eq!(node_limit(-1), (4096, 0));
        assert_eq!(node_limit(-5), (65536, 0));
        // глубже шкалы — прижимаемся к последней ступени
        assert_eq!(node_limit(-100), (65536, 0));
    }

    #[test]
    #[should_panic]
    fn test_node_limit_zero_panics() {
        node_limit(0);
    }

    /// Тест проверяет обе ветки превышения лимита.
    #[test]
    fn test_node_exceeds_limit() {
        // предел по количеству
        assert!(!node_exceeds_limit(128, 100, 128));
        assert!(node_exceeds_limit(128, 100, 129));
        // страховочный предел размера при счётном лимите
        assert!(node_exceeds_limit(128, SIZE_SAFETY_LIMIT + 1, 1));
        // предел по размеру
        assert!(!node_exceeds_limit(-1, 4096, 1_000_000));
        assert!(node_exceeds_limit(-1, 4097, 1));
    }

    #[test]
    fn test_digits10() {
        assert_eq!(digits10(0), 1);
        assert_eq!(digits10(9), 1);
        assert_eq!(digits10(10), 2);
        assert_eq!(digits10(-10), 3);
        assert_eq!(digits10(i64::MAX), 19);
        assert_eq!(digits10(i64::MIN), 20);
    }
}
