use std::{env, fs, process};

use subleq::assembler;
use subleq::logging::error;

struct Args {
    input: String,
    output: String,
    width: Option<u8>,
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut input = None;
    let mut output = None;
    let mut width = None;

    let mut i = 1;
    while i < raw.len() {
        match raw[i].as_str() {
            "--out" | "-o" => {
                i += 1;
                output = Some(raw.get(i).ok_or("--out requires a path")?.clone());
            }
            "--size" | "-s" => {
                i += 1;
                let value = raw.get(i).ok_or("--size requires a value")?;
                width = Some(value.parse::<u8>().map_err(|_| format!("invalid --size value \"{}\"", value))?);
            }
            positional if !positional.starts_with('-') => {
                if input.is_some() {
                    return Err(format!("unexpected extra argument \"{}\"", positional));
                }
                input = Some(positional.to_string());
            }
            other => return Err(format!("unrecognized flag \"{}\"", other)),
        }
        i += 1;
    }

    let input = input.ok_or("missing input file")?;
    let output = output.unwrap_or_else(|| default_output_path(&input));
    Ok(Args { input, output, width })
}

fn default_output_path(input: &str) -> String {
    match input.rsplit_once('.') {
        Some((stem, _ext)) => format!("{}.bin", stem),
        None => format!("{}.bin", input),
    }
}

fn main() {
    let raw: Vec<String> = env::args().collect();
    let args = parse_args(&raw).unwrap_or_else(|message| {
        error(message);
        eprintln!("usage: {} <input.asm> [--out <path>] [--size 1|2|4|8]", raw.get(0).map(String::as_str).unwrap_or("subleq-asm"));
        process::exit(1);
    });

    let bytes = assembler::assemble_from_file(&args.input, args.width).unwrap_or_else(|e| {
        error(e.to_string());
        process::exit(e.exit_code());
    });

    fs::write(&args.output, bytes).unwrap_or_else(|e| {
        error(format!("failed to write \"{}\": {}", args.output, e));
        process::exit(2);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_path_replaces_extension() {
        assert_eq!(default_output_path("prog.asm"), "prog.bin");
        assert_eq!(default_output_path("prog"), "prog.bin");
    }

    #[test]
    fn parse_args_reads_size_and_out() {
        let raw = vec![
            "subleq-asm".to_string(),
            "prog.asm".to_string(),
            "--out".to_string(),
            "out.bin".to_string(),
            "-s".to_string(),
            "1".to_string(),
        ];
        let args = parse_args(&raw).unwrap();
        assert_eq!(args.input, "prog.asm");
        assert_eq!(args.output, "out.bin");
        assert_eq!(args.width, Some(1));
    }

    #[test]
    fn parse_args_rejects_missing_input() {
        let raw = vec!["subleq-asm".to_string()];
        assert!(parse_args(&raw).is_err());
    }
}
