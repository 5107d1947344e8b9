use denoiser::audio::io::WavIo;
use std::process::Command;

fn denoiser() -> Command {
    Command::new(env!("CARGO_BIN_EXE_denoiser"))
}

fn tiny_config(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("tiny.yaml");
    std::fs::write(
        &path,
        "model:\n  hidden_dim: 4\n  depth: 2\n  resample: 2\n  sample_rate: 8000\n",
    )
    .expect("write config");
    path
}

#[test]
fn valid_length_uses_reference_architecture() {
    let output = denoiser()
        .args(["valid-length", "--length", "16000"])
        .output()
        .expect("run denoiser");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "16213");
}

#[test]
fn info_reports_channel_plan() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = tiny_config(dir.path());
    let output = denoiser()
        .args(["info", "--config", config.to_str().unwrap()])
        .output()
        .expect("run denoiser");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("level 0: 1 -> 4 channels"));
    assert!(stdout.contains("bottleneck: 8 channels"));
    assert!(stdout.contains("parameters:"));
}

#[test]
fn denoise_writes_mono_file_at_input_rate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = tiny_config(dir.path());
    let input = dir.path().join("noisy.wav");
    let output = dir.path().join("clean.wav");
    let samples: Vec<f32> = (0..1600).map(|i| (i as f32 * 0.07).sin() * 0.25).collect();
    WavIo::write_wav(&input, &[samples.clone(), samples], 16_000).expect("write input");

    let status = denoiser()
        .args([
            "denoise",
            "--input",
            input.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--seed",
            "0",
            "--backend",
            "ndarray",
        ])
        .status()
        .expect("run denoiser");
    assert!(status.success());

    let (decoded, sample_rate) = WavIo::read_wav(&output).expect("read output");
    assert_eq!(sample_rate, 16_000);
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].len(), 1600);
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.yaml");
    std::fs::write(&path, "model:\n  resample: 3\n").expect("write config");
    let output = denoiser()
        .args(["valid-length", "--length", "10", "--config", path.to_str().unwrap()])
        .output()
        .expect("run denoiser");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("1, 2 or 4"));
}
