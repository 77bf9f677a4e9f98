use anyhow::Result;
use clap::Parser;
use gemmtune_device::ArchProfile;
use gemmtune_synth::cli::{execute, Cli};
use gemmtune_synth::{InputSource, PipelineConfig, TuningPipeline};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};

const TEMPLATE: &str = r#"
GlobalParameters:
  MinimumRequiredVersion: 4.33.0
  NumWarmups: 0
  EnqueuesPerSync: 1
BenchmarkProblems:
  - - OperationType: GEMM
      DataType: h
    - InitialSolutionParameters: null
      BenchmarkCommonParameters:
        - KernelLanguage: ["Assembly"]
      ForkParameters:
        - MatrixInstruction: []
        - WorkGroupMappingXCCGroup: [1]
        - WorkGroupMappingXCC: [1]
        - GlobalSplitU: [1]
      BenchmarkFinalParameters:
        - ProblemSizes: []
LibraryLogic:
  ScheduleName: ""
  DeviceNames: []
  ArchitectureName: ""
"#;

fn bench_line(m: usize, n: usize, k: usize, a_type: &str) -> String {
    format!(
        "hipblaslt-bench --api_method c -m {m} -n {n} -k {k} --lda {m} --ldb {k} --ldc {m} --ldd {m} \
         --stride_a 0 --stride_b 0 --stride_c 0 --stride_d 0 --alpha 1.000000 --beta 0.000000 \
         --transA N --transB N --batch_count 1 --a_type {a_type} --b_type {a_type} --c_type {a_type} \
         --d_type {a_type} --scale_type f32_r --bias_type f32_r --compute_type f32_r"
    )
}

/// Five distinct problems logged 5, 4, 3, 2 and 1 times, interleaved with noise.
fn write_log(dir: &Path) -> Result<PathBuf> {
    let mut lines = vec!["hipBLASLt version 0.10".to_string()];
    for (rank, count) in [5usize, 4, 3, 2, 1].into_iter().enumerate() {
        for _ in 0..count {
            lines.push(bench_line(256 * (rank + 1), 512, 128, "f16_r"));
            lines.push("Is supported 1 / Total solutions: 12".to_string());
        }
    }
    let path = dir.join("gemms.log");
    fs::write(&path, lines.join("\n"))?;
    Ok(path)
}

fn write_template(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("tuning.yaml");
    fs::write(&path, TEMPLATE)?;
    Ok(path)
}

fn pipeline(template: PathBuf, output_dir: &Path, gpus: usize) -> Result<TuningPipeline> {
    let config = PipelineConfig {
        template,
        output_dir: output_dir.to_path_buf(),
        gpus,
        ..PipelineConfig::default()
    };
    Ok(TuningPipeline::new(config, ArchProfile::resolve("gfx942", None)?)?)
}

fn read_yaml(path: &Path) -> Result<Value> {
    Ok(serde_yaml::from_str(&fs::read_to_string(path)?)?)
}

fn problem_sizes(doc: &Value, slot: usize) -> Vec<Vec<u64>> {
    doc["BenchmarkProblems"][slot][1]["BenchmarkFinalParameters"][0]["ProblemSizes"]
        .as_sequence()
        .into_iter()
        .flatten()
        .map(|entry| {
            entry["Exact"]
                .as_sequence()
                .into_iter()
                .flatten()
                .filter_map(Value::as_u64)
                .collect()
        })
        .collect()
}

#[test]
fn log_mode_splits_ranked_problems_round_robin() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log = write_log(dir.path())?;
    let template = write_template(dir.path())?;
    let out = dir.path().join("out");

    let summary = pipeline(template, &out, 2)?.run(&InputSource::Log(log))?;
    assert_eq!(summary.problems, 5);
    assert_eq!(
        summary.written,
        vec![out.join("tuning.0.yaml"), out.join("tuning.1.yaml")]
    );

    let first = read_yaml(&summary.written[0])?;
    let second = read_yaml(&summary.written[1])?;
    let ms = |doc: &Value| -> Vec<u64> { problem_sizes(doc, 0).iter().map(|s| s[0]).collect() };
    // Ranks 1, 3, 5 and ranks 2, 4.
    assert_eq!(ms(&first), vec![256, 768, 1280]);
    assert_eq!(ms(&second), vec![512, 1024]);

    assert_eq!(first["LibraryLogic"]["ArchitectureName"], Value::from("gfx942"));
    assert_eq!(first["GlobalParameters"]["NumWarmups"], Value::from(20));
    assert_eq!(
        first["GlobalParameters"]["MinimumRequiredVersion"],
        Value::from("4.33.0")
    );
    let instructions = first["BenchmarkProblems"][0][1]["ForkParameters"][0]["MatrixInstruction"]
        .as_sequence()
        .map(Vec::len)
        .unwrap_or(0);
    assert!(instructions > 0);
    Ok(())
}

#[test]
fn top_k_limits_logged_problems() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log = write_log(dir.path())?;
    let template = write_template(dir.path())?;
    let config = PipelineConfig {
        template,
        output_dir: dir.path().to_path_buf(),
        gpus: 4,
        top_k: Some(2),
        ..PipelineConfig::default()
    };
    let pipeline = TuningPipeline::new(config, ArchProfile::resolve("gfx90a", None)?)?;

    let summary = pipeline.run(&InputSource::Log(log))?;
    assert_eq!(summary.problems, 2);
    // Two problems over four devices leave buckets 2 and 3 without output.
    assert_eq!(summary.written.len(), 2);
    assert!(!dir.path().join("tuning.2.yaml").exists());
    Ok(())
}

#[test]
fn grid_mode_groups_by_datatype() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let template = write_template(dir.path())?;
    let grid = dir.path().join("grid.yaml");
    fs::write(
        &grid,
        r#"
- M: {Range: "128:512", Points: 2}
  N: {Exact: "256"}
  Batch: {Exact: "1"}
  K: {Exact: "64"}
  DataType: f16_r
  DestDataType: f16_r
  ComputeDataType: f32_r
  TransposeA: N
  TransposeB: T
- M: {Exact: "1024"}
  N: {Exact: "1024"}
  Batch: {Exact: "2"}
  K: {Exact: "1024"}
  DataType: f32_r
  DestDataType: f32_r
  ComputeDataType: xf32_r
  TransposeA: T
  TransposeB: N
"#,
    )?;

    let summary = pipeline(template, dir.path(), 1)?.run(&InputSource::Grid(grid))?;
    assert_eq!(summary.problems, 3);
    let doc = read_yaml(&summary.written[0])?;

    assert_eq!(doc["BenchmarkProblems"].as_sequence().map(Vec::len), Some(2));
    assert_eq!(
        problem_sizes(&doc, 0),
        vec![vec![128, 256, 1, 64], vec![512, 256, 1, 64]]
    );
    assert_eq!(problem_sizes(&doc, 1), vec![vec![1024, 1024, 2, 1024]]);

    let xf32 = &doc["BenchmarkProblems"][1][0];
    assert_eq!(xf32["DataType"], Value::from("S"));
    assert_eq!(xf32["ComputeDataType"], Value::from("S"));
    assert_eq!(xf32["F32XdlMathOp"], Value::from("x"));
    let tf32_instr = &doc["BenchmarkProblems"][1][1]["ForkParameters"][0]["MatrixInstruction"][0];
    assert_eq!(tf32_instr[2], Value::from(8));
    Ok(())
}

#[test]
fn repeated_runs_are_byte_identical() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log = write_log(dir.path())?;
    let template = write_template(dir.path())?;

    let first_out = dir.path().join("a");
    let second_out = dir.path().join("b");
    let first = pipeline(template.clone(), &first_out, 3)?.run(&InputSource::Log(log.clone()))?;
    let second = pipeline(template, &second_out, 3)?.run(&InputSource::Log(log))?;

    assert_eq!(first.written.len(), 3);
    for (a, b) in first.written.iter().zip(&second.written) {
        assert_eq!(fs::read(a)?, fs::read(b)?);
    }
    Ok(())
}

#[test]
fn unknown_architecture_writes_nothing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log = write_log(dir.path())?;
    let template = write_template(dir.path())?;
    let out = dir.path().join("out");

    let (log, template, out_dir) = (
        log.display().to_string(),
        template.display().to_string(),
        out.display().to_string(),
    );
    let cli = Cli::try_parse_from([
        "gemmtune",
        "--log",
        log.as_str(),
        "--template",
        template.as_str(),
        "--output-dir",
        out_dir.as_str(),
        "--arch",
        "gfx1030",
    ])?;
    let err = execute(&cli).unwrap_err();
    assert!(err.to_string().contains("gfx1030"));
    assert!(!out.exists());
    Ok(())
}

#[test]
fn malformed_template_aborts_before_writing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log = write_log(dir.path())?;
    let template = dir.path().join("broken.yaml");
    fs::write(&template, "GlobalParameters: {}\nLibraryLogic: {}\n")?;
    let out = dir.path().join("out");

    let result = pipeline(template, &out, 2)?.run(&InputSource::Log(log));
    let err = result.unwrap_err();
    assert!(err.to_string().contains("BenchmarkProblems"));
    assert!(!out.exists());
    Ok(())
}
