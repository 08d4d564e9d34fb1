//! Бинарно-безопасная строка (Sds).
//!
//! Короткие строки хранятся прямо в стеке, длинные — в куче. Поверх
//! этого модуль даёт канонический десятичный кодек: строка считается
//! целым числом только если она является единственной записью этого
//! числа (без ведущих нулей, без знака «+», в диапазоне i64). Именно по
//! этому правилу множества решают, может ли элемент жить в intset.

use std::{
    cmp::Ordering,
    fmt::{self, Display},
    hash::{Hash, Hasher},
    ops::Deref,
    str::{from_utf8, Utf8Error},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Представление строки: в стеке (короткая) или в куче (длинная).
#[derive(Debug, Clone)]
enum Repr {
    Inline { len: u8, buf: [u8; Sds::INLINE_CAP] },
    Heap { buf: Vec<u8>, len: usize },
}

/// Основная структура бинарно-безопасной строки.
#[derive(Debug, Clone)]
pub struct Sds(Repr);

impl Sds {
    /// Максимальный размер строки, при котором используется стековое
    /// представление.
    pub const INLINE_CAP: usize = 22;

    /// Создаёт Sds из вектора байт, выбирая стек или кучу в зависимости
    /// от размера.
    #[inline(always)]
    pub fn from_vec(vec: Vec<u8>) -> Self {
        let len = vec.len();
        if len <= Self::INLINE_CAP {
            let mut buf = [0u8; Self::INLINE_CAP];
            buf[..len].copy_from_slice(&vec);
            Sds(Repr::Inline {
                len: len as u8,
                buf,
            })
        } else {
            Sds(Repr::Heap { buf: vec, len })
        }
    }

    /// Создаёт Sds из байтов, копируя их.
    pub fn from_bytes<B: AsRef<[u8]>>(bytes: B) -> Self {
        let slice = bytes.as_ref();
        if slice.len() <= Self::INLINE_CAP {
            let mut buf = [0u8; Self::INLINE_CAP];
            buf[..slice.len()].copy_from_slice(slice);
            Sds(Repr::Inline {
                len: slice.len() as u8,
                buf,
            })
        } else {
            Sds(Repr::Heap {
                len: slice.len(),
                buf: slice.to_vec(),
            })
        }
    }

    /// Создаёт строку из &str.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }

    /// Каноническая десятичная запись целого числа.
    pub fn from_int(v: i64) -> Self {
        let mut buf = [0u8; 20];
        let digits = itoa_format(v, &mut buf);
        Self::from_bytes(digits)
    }

    /// Возвращает содержимое строки как срез байт.
    pub fn as_slice(&self) -> &[u8] {
        match &self.0 {
            Repr::Inline { len, buf } => &buf[..*len as usize],
            Repr::Heap { buf, len } => &buf[..*len],
        }
    }

    /// Байтовое представление строки (аналог `as_slice`).
    pub fn as_bytes(&self) -> &[u8] {
        self.as_slice()
    }

    /// Возвращает текущую длину строки.
    #[inline(always)]
    pub fn len(&self) -> usize {
        match &self.0 {
            Repr::Inline { len, .. } => *len as usize,
            Repr::Heap { len, .. } => *len,
        }
    }

    /// Проверяет, пуста ли строка.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Преобразует строку в `&str`, если она валидна как UTF-8.
    pub fn as_str(&self) -> Result<&str, Utf8Error> {
        from_utf8(self.as_slice())
    }

    /// Строгий разбор канонической десятичной записи.
    ///
    /// Возвращает `Some` только для единственной записи числа: "0",
    /// либо ненулевое без ведущих нулей, опционально с минусом. "+1",
    /// "007", "-0", пустая строка и любой нецифровой байт — не числа.
    pub fn parse_int(&self) -> Option<i64> {
        parse_decimal(self.as_slice())
    }
}

/// Строгий десятичный разбор по правилам канонической записи.
pub fn parse_decimal(s: &[u8]) -> Option<i64> {
    if s.is_empty() {
        return None;
    }

    let (neg, digits) = match s[0] {
        b'-' => (true, &s[1..]),
        _ => (false, s),
    };
    if digits.is_empty() {
        return None;
    }

    // "0" — единственная запись нуля; "-0" и "01" не канонические
    if digits[0] == b'0' {
        return if digits.len() == 1 && !neg {
            Some(0)
        } else {
            None
        };
    }

    // Аккумулируем в отрицательной зоне: |i64::MIN| > |i64::MAX|
    let mut acc: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return None;
        }
        acc = acc.checked_mul(10)?.checked_sub((b - b'0') as i64)?;
    }

    if neg {
        Some(acc)
    } else {
        acc.checked_neg()
    }
}

/// Форматирует i64 в конец буфера, возвращает записанный хвост.
fn itoa_format(v: i64, buf: &mut [u8; 20]) -> &[u8] {
    if v == 0 {
        buf[19] = b'0';
        return &buf[19..];
    }
    let neg = v < 0;
    // работаем с модулем в u64, чтобы пережить i64::MIN
    let mut rest = v.unsigned_abs();
    let mut pos = buf.len();
    while rest > 0 {
        pos -= 1;
        buf[pos] = b'0' + (rest % 10) as u8;
        rest /= 10;
    }
    if neg {
        pos -= 1;
        buf[pos] = b'-';
    }
    &buf[pos..]
}

impl Default for Sds {
    fn default() -> Self {
        Sds(Repr::Inline {
            len: 0,
            buf: [0u8; Sds::INLINE_CAP],
        })
    }
}

impl Deref for Sds {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl AsRef<[u8]> for Sds {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Display for Sds {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.as_str() {
            Ok(s) => write!(f, "{s}"),
            Err(_) => write!(f, "{:?}", self.as_slice()),
        }
    }
}

impl Hash for Sds {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.as_slice().hash(state);
    }
}

impl PartialEq for Sds {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Sds {}

impl PartialOrd for Sds {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sds {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl From<&[u8]> for Sds {
    fn from(slice: &[u8]) -> Self {
        Self::from_bytes(slice)
    }
}

impl From<&str> for Sds {
    fn from(s: &str) -> Self {
        Self::from_str(s)
    }
}

impl From<Vec<u8>> for Sds {
    fn from(vec: Vec<u8>) -> Self {
        Self::from_vec(vec)
    }
}

impl Serialize for Sds {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(self.as_slice())
    }
}

impl<'de> Deserialize<'de> for Sds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = <Vec<u8>>::deserialize(deserializer)?;
        Ok(Sds::from_vec(bytes))
    }
}
