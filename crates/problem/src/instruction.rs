//! Matrix instruction templates and the candidates derived from them.

use crate::config::{DatatypeDescriptor, ElementType, XdlMathOp};
use serde::{Serialize, Serializer};
use std::fmt;

/// Base hardware matrix instruction: (instrM, instrN, instrK, maxBatchMultiplier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstructionTemplate {
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub max_batch_multiplier: usize,
}

impl InstructionTemplate {
    pub const FP16: Self = Self::new(16, 16, 16, 1);
    pub const BF16: Self = Self::new(16, 16, 8, 1);
    pub const TF32: Self = Self::new(16, 16, 8, 1);
    pub const FP32: Self = Self::new(16, 16, 4, 1);

    pub const fn new(m: usize, n: usize, k: usize, max_batch_multiplier: usize) -> Self {
        Self {
            m,
            n,
            k,
            max_batch_multiplier,
        }
    }

    /// Looks up the base instruction for a descriptor.
    ///
    /// Descriptors carrying an unknown field never get a template.
    pub fn for_descriptor(descriptor: &DatatypeDescriptor) -> Option<Self> {
        if !descriptor.is_known() {
            return None;
        }
        match (descriptor.data_type, descriptor.xdl_math_op) {
            (ElementType::Half, _) => Some(Self::FP16),
            (ElementType::BFloat16, _) => Some(Self::BF16),
            (ElementType::Single, XdlMathOp::XFloat32) => Some(Self::TF32),
            (ElementType::Single, XdlMathOp::Default) => Some(Self::FP32),
            _ => None,
        }
    }
}

/// A concrete tile/instruction decomposition written into `MatrixInstruction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstructionCandidate {
    pub instr_m: usize,
    pub instr_n: usize,
    pub instr_k: usize,
    pub batch_multiplier: usize,
    pub wave_tile_m: usize,
    pub wave_tile_n: usize,
    pub wave_split_m: usize,
    pub wave_split_n: usize,
}

impl InstructionCandidate {
    pub fn as_array(&self) -> [usize; 8] {
        [
            self.instr_m,
            self.instr_n,
            self.instr_k,
            self.batch_multiplier,
            self.wave_tile_m,
            self.wave_tile_n,
            self.wave_split_m,
            self.wave_split_n,
        ]
    }

    /// Output tile covered by one workgroup along M.
    pub fn macro_tile_m(&self) -> usize {
        self.instr_m * self.wave_tile_m * self.wave_split_m
    }

    pub fn macro_tile_n(&self) -> usize {
        self.instr_n * self.wave_tile_n * self.wave_split_n
    }
}

impl Serialize for InstructionCandidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_array().serialize(serializer)
    }
}

impl fmt::Display for InstructionCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_array())
    }
}
