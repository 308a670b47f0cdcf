use std::{env, fs, process};

use subleq::logging::error;
use subleq::machine::{Machine, ReaderInput, RenderMode, WriterOutput};

struct Args {
    input: String,
    width: u8,
    null_terminate: bool,
    ascii: bool,
    debugger: bool,
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut input = None;
    let mut width = subleq::assembler::DEFAULT_WIDTH;
    let mut null_terminate = false;
    let mut ascii = false;
    let mut debugger = false;

    let mut i = 1;
    while i < raw.len() {
        match raw[i].as_str() {
            "--null-terminate-input" | "-n" => null_terminate = true,
            "--ascii" | "-a" => ascii = true,
            "--debugger" | "-d" => debugger = true,
            "--size" | "-s" => {
                i += 1;
                let value = raw.get(i).ok_or("--size requires a value")?;
                width = value.parse::<u8>().map_err(|_| format!("invalid --size value \"{}\"", value))?;
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

    if !matches!(width, 1 | 2 | 4 | 8) {
        return Err(format!("cell width must be 1, 2, 4, or 8, got {}", width));
    }

    Ok(Args {
        input: input.ok_or("missing input file")?,
        width,
        null_terminate,
        ascii,
        debugger,
    })
}

fn main() {
    let raw: Vec<String> = env::args().collect();
    let args = parse_args(&raw).unwrap_or_else(|message| {
        error(message);
        eprintln!(
            "usage: {} <binary> [--null-terminate-input] [--ascii] [--size 1|2|4|8]",
            raw.get(0).map(String::as_str).unwrap_or("subleq-emu")
        );
        process::exit(1);
    });

    if args.debugger {
        error("--debugger is not supported in this build".to_string());
        process::exit(1);
    }

    let binary = fs::read(&args.input).unwrap_or_else(|e| {
        error(format!("failed to read \"{}\": {}", args.input, e));
        process::exit(2);
    });

    let mut machine = Machine::from_binary(&binary, args.width);

    let mode = if args.ascii { RenderMode::Ascii } else { RenderMode::Decimal };
    let mut input = ReaderInput::new(std::io::stdin(), args.null_terminate);
    let mut output = WriterOutput::new(std::io::stdout(), mode);

    match machine.run(&mut input, &mut output) {
        Ok(status) => process::exit(status as i32),
        Err(fault) => {
            error(fault.to_string());
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_args_reads_flags() {
        let raw = vec![
            "subleq-emu".to_string(),
            "prog.bin".to_string(),
            "-n".to_string(),
            "--ascii".to_string(),
            "--size".to_string(),
            "1".to_string(),
        ];
        let args = parse_args(&raw).unwrap();
        assert_eq!(args.input, "prog.bin");
        assert!(args.null_terminate);
        assert!(args.ascii);
        assert_eq!(args.width, 1);
        assert!(!args.debugger);
    }

    #[test]
    fn parse_args_rejects_bad_width() {
        let raw = vec!["subleq-emu".to_string(), "prog.bin".to_string(), "-s".to_string(), "3".to_string()];
        assert!(parse_args(&raw).is_err());
    }

    #[test]
    fn parse_args_rejects_missing_input() {
        let raw = vec!["subleq-emu".to_string()];
        assert!(parse_args(&raw).is_err());
    }
}
