use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn print_config(config_dir: &std::path::Path, extra_args: &[&str]) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_camtile"))
        .env("CAMTILE_CONFIG_DIR", config_dir)
        .arg("--print-config")
        .args(extra_args)
        .output()
        .expect("failed to run camtile --print-config");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn print_config_reports_defaults_without_a_file() {
    let root = TempDir::new().unwrap();

    let rendered = print_config(root.path(), &[]);

    assert!(rendered.contains("width = 1280"));
    assert!(rendered.contains("height = 720"));
    assert!(rendered.contains("camera_index = 0"));
}

#[test]
fn config_file_values_are_picked_up() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("camtile.toml"),
        "[window]\nwidth = 800\nheight = 600\n\n[params]\ntile_size = 12\n",
    )
    .unwrap();

    let rendered = print_config(root.path(), &[]);

    assert!(rendered.contains("width = 800"));
    assert!(rendered.contains("tile_size = 12"));
}

#[test]
fn cli_flags_override_the_config_file() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("camtile.toml"),
        "[params]\ntile_size = 12\n",
    )
    .unwrap();

    let rendered = print_config(root.path(), &["--tile-size", "24", "--rotation", "5"]);

    assert!(rendered.contains("tile_size = 24"));
    assert!(rendered.contains("rotation = 5"));
}
