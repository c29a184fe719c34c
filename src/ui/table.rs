use tabled::{settings::Style, Table, Tabled};
use crate::record::Document;
use crate::storage::DbStats;

/// Longest field summary shown in a records table
const FIELDS_WIDTH: usize = 60;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Tabled)]
struct StoreRow {
    #[tabled(rename = "Store")]
    name: String,
    #[tabled(rename = "Records")]
    records: usize,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Fields")]
    fields: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stores_table(stats: &DbStats) -> String {
    let rows = stats.stores.iter().map(|store| StoreRow {
        name: store.name.clone(),
        records: store.records,
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn records_table(records: &[Document]) -> String {
    let rows = records.iter().map(|doc| RecordRow {
        id: doc.id.clone(),
        fields: summarize(&serde_json::Value::Object(doc.fields.clone()).to_string()),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

fn summarize(text: &str) -> String {
    if text.chars().count() <= FIELDS_WIDTH {
        return text.to_string();
    }
    let cut: String = text.chars().take(FIELDS_WIDTH - 1).collect();
    format!("{}…", cut)
}
