//! Benchmark invocation parsing.
//!
//! A log line is a problem only if it contains a full `--api_method c`
//! invocation with every flag in the fixed order below; anything else in a
//! heterogeneous log is noise and is ignored.

use crate::config::{DatatypeDescriptor, ProblemRecord, ProblemShape};
use regex::{Captures, Regex};
use std::sync::LazyLock;

const INVOCATION_PATTERN: &str = concat!(
    r"(?P<CMD>\w+) --api_method c ",
    r"-m (?P<M>[\d ]+)",
    r"-n (?P<N>[\d ]+)",
    r"-k (?P<K>[\d ]+)",
    r"--lda (?P<LDA>[\d ]+)",
    r"--ldb (?P<LDB>[\d ]+)",
    r"--ldc (?P<LDC>[\d ]+)",
    r"--ldd (?P<LDD>[\d ]+)",
    r"--stride_a (?P<STRIDE_A>[\d ]+)",
    r"--stride_b (?P<STRIDE_B>[\d ]+)",
    r"--stride_c (?P<STRIDE_C>[\d ]+)",
    r"--stride_d (?P<STRIDE_D>[\d ]+)",
    r"--alpha (?P<ALPHA>[\d\. ]+)",
    r"--beta (?P<BETA>[\d\. ]+)",
    r"--transA (?P<TRANS_A>[\w ]+)",
    r"--transB (?P<TRANS_B>[\w ]+)",
    r"--batch_count (?P<BATCH_COUNT>[\d ]+)",
    r"--a_type (?P<A_TYPE>[\w ]+)",
    r"--b_type (?P<B_TYPE>[\w ]+)",
    r"--c_type (?P<C_TYPE>[\w ]+)",
    r"--d_type (?P<D_TYPE>[\w ]+)",
    r"--scale_type (?P<SCALE_TYPE>[\w ]+)",
    r"--bias_type (?P<BIAS_TYPE>[\w ]+)",
    r"--compute_type (?P<COMPUTE_TYPE>[\w ]+)",
);

static INVOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(INVOCATION_PATTERN).expect("invocation pattern is valid"));

/// Leading dimensions and batch strides of the A/B/C/D operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandLayout {
    pub lda: usize,
    pub ldb: usize,
    pub ldc: usize,
    pub ldd: usize,
    pub stride_a: usize,
    pub stride_b: usize,
    pub stride_c: usize,
    pub stride_d: usize,
}

/// A fully matched benchmark invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub command: String,
    pub record: ProblemRecord,
    pub layout: OperandLayout,
    pub alpha: f64,
    pub beta: f64,
}

impl Invocation {
    /// Parses one log line, returning `None` when it is not an invocation.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = INVOCATION_RE.captures(line)?;
        let number = |name: &str| -> Option<usize> { field(&caps, name).parse().ok() };
        let scalar = |name: &str| -> Option<f64> { field(&caps, name).parse().ok() };

        let shape = ProblemShape::new(
            number("M")?,
            number("N")?,
            number("BATCH_COUNT")?,
            number("K")?,
        );
        let descriptor = DatatypeDescriptor::from_tokens(
            field(&caps, "A_TYPE"),
            field(&caps, "C_TYPE"),
            field(&caps, "COMPUTE_TYPE"),
            field(&caps, "TRANS_A"),
            field(&caps, "TRANS_B"),
        );
        let layout = OperandLayout {
            lda: number("LDA")?,
            ldb: number("LDB")?,
            ldc: number("LDC")?,
            ldd: number("LDD")?,
            stride_a: number("STRIDE_A")?,
            stride_b: number("STRIDE_B")?,
            stride_c: number("STRIDE_C")?,
            stride_d: number("STRIDE_D")?,
        };

        Some(Self {
            command: field(&caps, "CMD").to_string(),
            record: ProblemRecord::new(shape, descriptor),
            layout,
            alpha: scalar("ALPHA")?,
            beta: scalar("BETA")?,
        })
    }
}

/// Shape and descriptor of a log line, if it is an invocation.
pub fn extract_problem(line: &str) -> Option<ProblemRecord> {
    Invocation::parse(line).map(|invocation| invocation.record)
}

fn field<'a>(caps: &Captures<'a>, name: &str) -> &'a str {
    caps.name(name).map(|m| m.as_str().trim()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ElementType, Transpose, XdlMathOp};

    fn bench_line(m: usize, n: usize, k: usize, batch: usize, a_type: &str) -> String {
        format!(
            "hipblaslt-bench --api_method c -m {m} -n {n} -k {k} --lda {m} --ldb {k} --ldc {m} --ldd {m} \
             --stride_a 0 --stride_b 0 --stride_c 0 --stride_d 0 --alpha 1.000000 --beta 0.000000 \
             --transA N --transB T --batch_count {batch} --a_type {a_type} --b_type {a_type} \
             --c_type {a_type} --d_type {a_type} --scale_type f32_r --bias_type f32_r --compute_type f32_r"
        )
    }

    #[test]
    fn parses_full_invocation() {
        let line = bench_line(1024, 512, 256, 4, "f16_r");
        let invocation = Invocation::parse(&line).expect("line should match");
        assert_eq!(invocation.command, "bench");
        assert_eq!(invocation.record.shape, ProblemShape::new(1024, 512, 4, 256));
        assert_eq!(invocation.layout.lda, 1024);
        assert_eq!(invocation.layout.ldb, 256);
        assert_eq!(invocation.alpha, 1.0);
        assert_eq!(invocation.beta, 0.0);

        let desc = invocation.record.descriptor;
        assert_eq!(desc.data_type, ElementType::Half);
        assert_eq!(desc.compute_data_type, ElementType::Single);
        assert_eq!(desc.transpose_a, Transpose::No);
        assert_eq!(desc.transpose_b, Transpose::Yes);
        assert_eq!(desc.xdl_math_op, XdlMathOp::Default);
        assert!(desc.high_precision_accumulate);
    }

    #[test]
    fn matches_inside_prefixed_log_lines() {
        let line = format!("[rank 0] 12:00:01 {}", bench_line(64, 64, 64, 1, "f32_r"));
        let record = extract_problem(&line).expect("embedded invocation should match");
        assert_eq!(record.shape, ProblemShape::new(64, 64, 1, 64));
    }

    #[test]
    fn ignores_noise() {
        assert!(extract_problem("").is_none());
        assert!(extract_problem("hipblaslt-bench --api_method c -m 64 -n 64").is_none());
        assert!(Invocation::parse("Running kernel Cijk_Ailk_Bljk_HHS_BH").is_none());
    }

    #[test]
    fn unknown_type_token_is_kept_as_sentinel() {
        let line = bench_line(64, 64, 64, 1, "i8_r");
        let record = extract_problem(&line).expect("grammar still matches");
        assert_eq!(record.descriptor.data_type, ElementType::Unknown);
        assert!(!record.descriptor.is_known());
    }
}
