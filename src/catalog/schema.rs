use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataType {
    /// Auto-incrementing primary key backed by a `<table>_id_seq` sequence.
    Serial,
    Integer,
    BigInt,
    Text,
    Boolean,
    Timestamp,
    Json,
}

impl DataType {
    pub fn to_sql_type(&self) -> &'static str {
        match self {
            DataType::Serial | DataType::BigInt => "BIGINT",
            DataType::Integer => "INTEGER",
            DataType::Text => "VARCHAR",
            DataType::Boolean => "BOOLEAN",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Json => "JSON",
        }
    }

    /// Lower-case name shown to the language model.
    pub fn label(&self) -> &'static str {
        match self {
            DataType::Serial | DataType::Integer | DataType::BigInt => "integer",
            DataType::Text => "text",
            DataType::Boolean => "boolean",
            DataType::Timestamp => "timestamp",
            DataType::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSchema {
    pub name: &'static str,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnSchema {
    pub const fn required(name: &'static str, data_type: DataType) -> Self {
        Self {
            name,
            data_type,
            nullable: false,
        }
    }

    pub const fn optional(name: &'static str, data_type: DataType) -> Self {
        Self {
            name,
            data_type,
            nullable: true,
        }
    }

    pub fn to_sql_definition(&self, table: &str) -> String {
        match self.data_type {
            DataType::Serial => format!(
                "{} BIGINT PRIMARY KEY DEFAULT nextval('{}')",
                self.name,
                sequence_name(table)
            ),
            data_type => {
                let nullable_str = if self.nullable { "" } else { " NOT NULL" };
                format!("{} {}{}", self.name, data_type.to_sql_type(), nullable_str)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub columns: &'static [ColumnSchema],
}

impl TableSchema {
    pub fn has_serial_id(&self) -> bool {
        self.columns.iter().any(|c| c.data_type == DataType::Serial)
    }

    pub fn to_create_table_sql(&self) -> String {
        let columns_sql: Vec<String> = self
            .columns
            .iter()
            .map(|col| col.to_sql_definition(self.name))
            .collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            self.name,
            columns_sql.join(",\n    ")
        )
    }

    /// Plain-text block used to ground SQL generation.
    pub fn describe(&self) -> String {
        let mut out = format!("Table: {}\nPurpose: {}\nColumns:\n", self.name, self.description);
        for col in self.columns {
            out.push_str(&format!(
                "  - {} ({}){}\n",
                col.name,
                col.data_type.label(),
                if col.nullable { " NULL" } else { " NOT NULL" }
            ));
        }
        out
    }
}

pub fn sequence_name(table: &str) -> String {
    format!("{}_id_seq", table)
}
