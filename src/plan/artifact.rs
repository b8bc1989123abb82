use super::ExecutionPlan;
use crate::error::ArtifactError;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use std::fs;
use std::io::{Read, Write};

impl ExecutionPlan {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        encode_to_vec(self, standard()).map_err(|e| ArtifactError::Encode(e.to_string()))
    }

    /// Saves the compiled plan to a file using the bincode format.
    pub fn save(&self, path: &str) -> Result<(), ArtifactError> {
        let bytes = self.to_bytes()?;
        let io_error = |source| ArtifactError::Io {
            path: path.to_string(),
            source,
        };
        let mut file = fs::File::create(path).map_err(io_error)?;
        file.write_all(&bytes).map_err(io_error)?;
        Ok(())
    }

    /// Loads a compiled plan from a file.
    pub fn from_file(path: &str) -> Result<Self, ArtifactError> {
        let io_error = |source| ArtifactError::Io {
            path: path.to_string(),
            source,
        };
        let mut file = fs::File::open(path).map_err(io_error)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(io_error)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let plan: Self = decode_from_slice(bytes, standard())
            .map(|(plan, _)| plan) // bincode 2 returns (value, bytes_read)
            .map_err(|e| ArtifactError::Decode(e.to_string()))?;
        plan.check_indices()?;
        Ok(plan)
    }

    /// Every node index in the plan must point into `node_ids`.
    fn check_indices(&self) -> Result<(), ArtifactError> {
        let count = self.node_ids.len();
        if self.input >= count {
            return Err(ArtifactError::Decode(format!(
                "input node index {} is outside the plan's {} nodes",
                self.input, count
            )));
        }
        for entry in &self.entries {
            let out_of_range = entry.node >= count
                || entry
                    .guard
                    .conditions()
                    .iter()
                    .any(|&(switch, _)| switch >= count);
            if out_of_range {
                return Err(ArtifactError::Decode(format!(
                    "entry '{}' references a node outside the plan's {} nodes",
                    entry.node_id, count
                )));
            }
        }
        Ok(())
    }
}
