use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;

/// A batch of input records.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(transparent)]
pub struct RecordSet {
    pub records: Vec<Value>,
}

impl RecordSet {
    /// Load records from a JSON file holding an array of objects, or one object per line.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, Box<dyn std::error::Error>> {
        match serde_json::from_str::<Value>(content) {
            Ok(Value::Array(records)) => Ok(Self { records }),
            Ok(single @ Value::Object(_)) => Ok(Self {
                records: vec![single],
            }),
            Ok(other) => Err(format!("expected an array of records, found {}", other).into()),
            // Newline-delimited JSON.
            Err(_) => {
                let records = content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(serde_json::from_str)
                    .collect::<Result<Vec<Value>, _>>()?;
                Ok(Self { records })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }
}
