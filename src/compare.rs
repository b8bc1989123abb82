//! Record-by-record comparison against an external engine.
use crate::ast::format_number;
use crate::error::OracleError;
use crate::plan::ExecutionPlan;
use ahash::AHashMap;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::time::{Duration, Instant};
use tracing::debug;

/// The engine whose results this interpreter is checked against.
pub trait Oracle {
    fn evaluate(&self, record: &Value) -> Result<Value, OracleError>;

    /// Evaluates the record at `index` of the batch under comparison. Oracles that replay
    /// stored outputs can use the position instead of the record.
    fn evaluate_at(&self, _index: usize, record: &Value) -> Result<Value, OracleError> {
        self.evaluate(record)
    }
}

impl<F> Oracle for F
where
    F: Fn(&Value) -> Result<Value, OracleError>,
{
    fn evaluate(&self, record: &Value) -> Result<Value, OracleError> {
        self(record)
    }
}

/// Replays outputs captured from an earlier oracle run.
///
/// Captured entries are either `{"result": ..}`, `{"error": ..}`, or the bare result.
#[derive(Debug, Clone)]
pub struct RecordedOracle {
    outputs: Vec<Result<Value, OracleError>>,
    by_record: AHashMap<String, usize>,
}

impl RecordedOracle {
    /// Pairs captured outputs with the records they were produced for, by position.
    pub fn new(records: &[Value], outputs: Vec<Value>) -> Self {
        let outputs: Vec<_> = outputs.into_iter().map(Self::unwrap_entry).collect();
        let mut by_record = AHashMap::with_capacity(records.len());
        for (index, record) in records.iter().enumerate().take(outputs.len()) {
            by_record.entry(canonical_json(record)).or_insert(index);
        }
        Self { outputs, by_record }
    }

    pub fn from_file(records: &[Value], path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let outputs: Vec<Value> = serde_json::from_str(&content)?;
        Ok(Self::new(records, outputs))
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    fn unwrap_entry(entry: Value) -> Result<Value, OracleError> {
        match entry {
            Value::Object(mut fields) if fields.len() == 1 && fields.contains_key("error") => {
                let error = fields.remove("error").unwrap_or_default();
                Err(OracleError(match error {
                    Value::String(message) => message,
                    other => other.to_string(),
                }))
            }
            Value::Object(mut fields) if fields.contains_key("result") => {
                Ok(fields.remove("result").unwrap_or_default())
            }
            other => Ok(other),
        }
    }

    fn output(&self, index: usize) -> Result<Value, OracleError> {
        self.outputs
            .get(index)
            .cloned()
            .unwrap_or_else(|| Err(OracleError(format!("no recorded output for record {}", index))))
    }
}

impl Oracle for RecordedOracle {
    fn evaluate(&self, record: &Value) -> Result<Value, OracleError> {
        match self.by_record.get(&canonical_json(record)) {
            Some(&index) => self.output(index),
            None => Err(OracleError("record was not part of the recorded run".to_string())),
        }
    }

    fn evaluate_at(&self, index: usize, _record: &Value) -> Result<Value, OracleError> {
        self.output(index)
    }
}

/// Key-order-insensitive JSON text: object keys sorted, numbers rendered the way a
/// JavaScript engine would, arrays and values otherwise preserved.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() => out.push_str(&format_number(f)),
            _ => out.push_str("null"),
        },
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
    }
}

fn write_string(text: &str, out: &mut String) {
    // Serializing a str cannot fail.
    out.push_str(&serde_json::to_string(text).unwrap_or_default());
}

/// One side's outcome for a record, as compared.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Output(Value),
    Failed(String),
}

impl Outcome {
    fn canonical(&self) -> Option<String> {
        match self {
            Outcome::Output(value) => Some(canonical_json(value)),
            Outcome::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub index: usize,
    pub interpreter: Outcome,
    pub oracle: Outcome,
}

/// The first record of the batch with both sides' results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub input: Value,
    pub interpreter: Outcome,
    pub oracle: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub records: usize,
    pub interpreter_time: Duration,
    pub oracle_time: Duration,
    pub sample: Option<Sample>,
    pub first_mismatch: Option<Mismatch>,
    pub mismatches: usize,
}

impl ComparisonReport {
    pub fn is_match(&self) -> bool {
        self.first_mismatch.is_none()
    }
}

/// Runs every record through the plan and the oracle, timing each side as a whole, and
/// reports the first index whose canonical outputs differ. A failure on either side counts
/// as a mismatch.
pub fn compare(plan: &ExecutionPlan, oracle: &dyn Oracle, records: &[Value]) -> ComparisonReport {
    let start = Instant::now();
    let interpreted: Vec<Outcome> = records
        .iter()
        .map(|record| match plan.evaluate(record) {
            Ok(value) => Outcome::Output(value),
            Err(failure) => Outcome::Failed(failure.to_string()),
        })
        .collect();
    let interpreter_time = start.elapsed();

    let start = Instant::now();
    let expected: Vec<Outcome> = records
        .iter()
        .enumerate()
        .map(|(index, record)| match oracle.evaluate_at(index, record) {
            Ok(value) => Outcome::Output(value),
            Err(error) => Outcome::Failed(error.to_string()),
        })
        .collect();
    let oracle_time = start.elapsed();

    let mut first_mismatch = None;
    let mut mismatches = 0;
    for (index, (ours, theirs)) in interpreted.iter().zip(&expected).enumerate() {
        let agree = match (ours.canonical(), theirs.canonical()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        if !agree {
            mismatches += 1;
            if first_mismatch.is_none() {
                first_mismatch = Some(Mismatch {
                    index,
                    interpreter: ours.clone(),
                    oracle: theirs.clone(),
                });
            }
        }
    }
    debug!(records = records.len(), mismatches, "comparison finished");

    let sample = records.first().map(|input| Sample {
        input: input.clone(),
        interpreter: interpreted[0].clone(),
        oracle: expected[0].clone(),
    });

    ComparisonReport {
        records: records.len(),
        interpreter_time,
        oracle_time,
        sample,
        first_mismatch,
        mismatches,
    }
}
