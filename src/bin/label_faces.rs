use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::{env, fs, io};

use framemog::detect::{dedupe_faces, parse_detector_output, sort_by_position_and_assign_labels, LabelCandidate};
use framemog::scoring::parse_model_output;
use framemog::PipelineConfig;

const USAGE: &str = "usage: label_faces [FILE] [--threshold T]";

struct Args {
    input: Option<PathBuf>,
    threshold: f64,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args {
        input: None,
        threshold: PipelineConfig::default().dedupe_threshold,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--threshold" | "-t" => {
                let raw = args.next().ok_or("--threshold needs a value")?;
                parsed.threshold = match raw.parse::<f64>() {
                    Ok(t) if (0.0..=1.0).contains(&t) => t,
                    _ => return Err(format!("threshold must be a number in [0, 1], got {raw:?}")),
                };
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            _ if parsed.input.is_none() => parsed.input = Some(PathBuf::from(arg)),
            _ => return Err(format!("unexpected argument {arg:?}\n{USAGE}")),
        }
    }
    Ok(parsed)
}

fn read_input(path: Option<&PathBuf>) -> io::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn main() -> ExitCode {
    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::from(2);
        }
    };

    let text = match read_input(args.input.as_ref()) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("read input: {err}");
            return ExitCode::FAILURE;
        }
    };
    let Some(value) = parse_model_output(&text) else {
        eprintln!("input is not detector JSON");
        return ExitCode::FAILURE;
    };

    let faces = dedupe_faces(&parse_detector_output(&value), args.threshold);
    let candidates: Vec<LabelCandidate> = faces
        .iter()
        .enumerate()
        .map(|(i, face)| LabelCandidate {
            id: format!("face-{i}"),
            bbox: face.bbox,
            confidence: None,
        })
        .collect();
    let people = sort_by_position_and_assign_labels(&candidates);

    match serde_json::to_string_pretty(&people) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("encode output: {err}");
            ExitCode::FAILURE
        }
    }
}
