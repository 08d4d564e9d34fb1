use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Ошибки уровня хранилища.
///
/// Ядро кодировок почти не возвращает ошибок: нарушения инвариантов —
/// это паника (ошибка программирования), а сигналы переполнения решаются
/// внутренней сменой кодировки. Восстановимы только явно запрошенный
/// отказ пре-аллокации при конверсии и (де)сериализация.
#[derive(Error, Debug)]
pub enum StoreError {
    // ==== System / External ====
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // ==== Encoding conversions ====
    /// Пре-аллокация нового представления не удалась, исходное значение
    /// не тронуто. Возвращается только когда вызывающая сторона явно
    /// разрешила отказ (`allow_failure`).
    #[error("Conversion presize failed: requested capacity {0}")]
    ConvertPresize(usize),
}
