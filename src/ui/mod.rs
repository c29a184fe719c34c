pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    banner, error, human_bytes, info, record_deleted, record_path, record_saved, section, status, success,
    summary_row, warn,
};
pub use table::{TableBuilder, records_table, stores_table};
pub use theme::{theme, ColorChoice, Theme};
