//! A single compiled stand-in for both `ffmpeg` and `ffprobe`, driven by
//! environment variables, so the transcoder/probe integration tests never
//! need a real FFmpeg install: argv is captured to a file and the output
//! is controlled entirely through env vars.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let argv: Vec<String> = env::args().skip(1).collect();

    if let Ok(capture_path) = env::var("MOCK_FFMPEG_CAPTURE_ARGV_PATH") {
        let path = PathBuf::from(capture_path);
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = fs::write(&path, argv.join("\0"));
    }

    let is_probe = argv.iter().any(|a| a == "-show_streams" || a == "-show_format");

    if is_probe {
        if let Ok(json) = env::var("MOCK_FFMPEG_PROBE_JSON") {
            print!("{json}");
        } else {
            print!(r#"{{"streams":[],"format":{{}}}}"#);
        }
    } else if let Some(output_path) = argv.last() {
        // ffmpeg invocation: the output path is always the last positional
        // argument (`ffmpeg_args::build_transcode_args`).
        let bytes: u64 = env::var("MOCK_FFMPEG_OUTPUT_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2048);
        let content = vec![0u8; bytes as usize];
        let _ = fs::write(output_path, content);
    }

    if let Ok(stderr) = env::var("MOCK_FFMPEG_STDERR") {
        eprintln!("{stderr}");
    }

    let exit_code: i32 = env::var("MOCK_FFMPEG_EXIT_CODE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    std::process::exit(exit_code);
}
