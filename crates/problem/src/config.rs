//! Problem shape and datatype descriptor structures.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// GEMM operand dimensions in (M, N, Batch, K) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ProblemShape {
    pub m: usize,
    pub n: usize,
    pub batch: usize,
    pub k: usize,
}

impl ProblemShape {
    pub fn new(m: usize, n: usize, batch: usize, k: usize) -> Self {
        Self { m, n, batch, k }
    }

    /// The `[M, N, Batch, K]` tuple written into `ProblemSizes` entries.
    pub fn exact(&self) -> [usize; 4] {
        [self.m, self.n, self.batch, self.k]
    }
}

impl fmt::Display for ProblemShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}x{}", self.m, self.n, self.batch, self.k)
    }
}

/// Element type code as understood by the tuning library.
///
/// `Unknown` is the sentinel for tokens outside the lookup table; it serializes
/// as `null` and disables instruction search for its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Half,
    Single,
    XFloat32,
    BFloat16,
    Unknown,
}

impl ElementType {
    /// Maps a benchmark type token (`f16_r`, `f32_r`, ...) to its element type.
    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "f16_r" => ElementType::Half,
            "f32_r" => ElementType::Single,
            "xf32_r" => ElementType::XFloat32,
            "bf16_r" => ElementType::BFloat16,
            _ => ElementType::Unknown,
        }
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            ElementType::Half => Some("H"),
            ElementType::Single => Some("S"),
            ElementType::XFloat32 => Some("XS"),
            ElementType::BFloat16 => Some("B"),
            ElementType::Unknown => None,
        }
    }

    pub fn is_sixteen_bit(&self) -> bool {
        matches!(self, ElementType::Half | ElementType::BFloat16)
    }
}

impl Serialize for ElementType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.code() {
            Some(code) => serializer.serialize_str(code),
            None => serializer.serialize_none(),
        }
    }
}

/// Operand transpose flag; `Unknown` serializes as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transpose {
    No,
    Yes,
    Unknown,
}

impl Transpose {
    pub fn from_token(token: &str) -> Self {
        match token {
            "T" => Transpose::Yes,
            "N" => Transpose::No,
            _ => Transpose::Unknown,
        }
    }
}

impl Serialize for Transpose {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Transpose::Yes => serializer.serialize_bool(true),
            Transpose::No => serializer.serialize_bool(false),
            Transpose::Unknown => serializer.serialize_none(),
        }
    }
}

/// Reduced-precision math mode for single-precision compute.
///
/// Written as `0` for the default path and `"x"` for xf32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum XdlMathOp {
    #[default]
    Default,
    XFloat32,
}

impl Serialize for XdlMathOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            XdlMathOp::Default => serializer.serialize_u8(0),
            XdlMathOp::XFloat32 => serializer.serialize_str("x"),
        }
    }
}

/// Datatype and operation description of one GEMM problem.
///
/// Serializes to the problem-type record the tuning library expects, so the
/// same value serves as grouping key and as the `BenchmarkProblems[i][0]` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DatatypeDescriptor {
    pub data_type: ElementType,
    pub dest_data_type: ElementType,
    pub compute_data_type: ElementType,
    pub transpose_a: Transpose,
    pub transpose_b: Transpose,
    pub high_precision_accumulate: bool,
    pub xdl_math_op: XdlMathOp,
    pub use_beta: bool,
}

impl DatatypeDescriptor {
    pub const OPERATION_TYPE: &'static str = "GEMM";

    /// Builds a descriptor from raw type and transpose tokens.
    ///
    /// 16-bit inputs force high-precision accumulation; an `xf32` compute type is
    /// normalized to single precision with the xf32 math op recorded.
    pub fn from_tokens(
        data_type: &str,
        dest_data_type: &str,
        compute_data_type: &str,
        transpose_a: &str,
        transpose_b: &str,
    ) -> Self {
        let data_type = ElementType::from_token(data_type);
        let mut compute_data_type = ElementType::from_token(compute_data_type);
        let mut xdl_math_op = XdlMathOp::Default;
        if compute_data_type == ElementType::XFloat32 {
            compute_data_type = ElementType::Single;
            xdl_math_op = XdlMathOp::XFloat32;
        }

        Self {
            data_type,
            dest_data_type: ElementType::from_token(dest_data_type),
            compute_data_type,
            transpose_a: Transpose::from_token(transpose_a),
            transpose_b: Transpose::from_token(transpose_b),
            high_precision_accumulate: data_type.is_sixteen_bit(),
            xdl_math_op,
            use_beta: true,
        }
    }

    /// True when no field carries the unknown sentinel.
    pub fn is_known(&self) -> bool {
        self.data_type != ElementType::Unknown
            && self.dest_data_type != ElementType::Unknown
            && self.compute_data_type != ElementType::Unknown
            && self.transpose_a != Transpose::Unknown
            && self.transpose_b != Transpose::Unknown
    }
}

impl Serialize for DatatypeDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DatatypeDescriptor", 10)?;
        state.serialize_field("Batched", &true)?;
        state.serialize_field("DataType", &self.data_type)?;
        state.serialize_field("DestDataType", &self.dest_data_type)?;
        state.serialize_field("ComputeDataType", &self.compute_data_type)?;
        state.serialize_field("TransposeA", &self.transpose_a)?;
        state.serialize_field("TransposeB", &self.transpose_b)?;
        state.serialize_field("HighPrecisionAccumulate", &self.high_precision_accumulate)?;
        state.serialize_field("F32XdlMathOp", &self.xdl_math_op)?;
        state.serialize_field("OperationType", Self::OPERATION_TYPE)?;
        state.serialize_field("UseBeta", &self.use_beta)?;
        state.end()
    }
}

/// One extracted or enumerated problem: a shape tagged with its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProblemRecord {
    pub shape: ProblemShape,
    pub descriptor: DatatypeDescriptor,
}

impl ProblemRecord {
    pub fn new(shape: ProblemShape, descriptor: DatatypeDescriptor) -> Self {
        Self { shape, descriptor }
    }
}
