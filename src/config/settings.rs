use serde::{Deserialize, Serialize};

use config::{Config, ConfigError, Environment};

/// Пороги выбора кодировок для коллекций.
///
/// Значения намеренно передаются в операции фасадов явно, а не читаются
/// из глобального состояния: ядро кодировок остаётся независимо
/// тестируемым.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Лимит упакованного узла списка. Положительное значение — предел
    /// числа элементов, отрицательное — выбор предела размера в байтах
    /// из фиксированной шкалы (-1 = 4 KiB ... -5 = 64 KiB).
    pub list_max_listpack_size: i64,
    /// Глубина несжимаемых узлов с обоих концов списка (0 — сжатие
    /// выключено). Хранится как опция узлового хранилища.
    pub list_compress_depth: u32,
    /// Максимальное число элементов intset до перехода в хеш-таблицу.
    pub set_max_intset_entries: usize,
    /// Максимальное число элементов компактного множества.
    pub set_max_listpack_entries: usize,
    /// Максимальная длина одного элемента компактного множества в байтах.
    pub set_max_listpack_value: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            list_max_listpack_size: 128,
            list_compress_depth: 0,
            set_max_intset_entries: 512,
            set_max_listpack_entries: 128,
            set_max_listpack_value: 64,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            // Adding default values
            .set_default("list_max_listpack_size", 128)?
            .set_default("list_compress_depth", 0)?
            .set_default("set_max_intset_entries", 512)?
            .set_default("set_max_listpack_entries", 128)?
            .set_default("set_max_listpack_value", 64)?
            // Add enviroment variables with the KIVO_
            .add_source(Environment::with_prefix("KIVO"))
            .build()?;

        cfg.try_deserialize()
    }
}
