//! Load a PDF, apply page edits and write it back out.
//!
//! ```text
//! pdf_assemble <in.pdf> <out> [--delete i,j] [--rotate deg:i,j]
//!              [--no-compress] [--indent N] [--group-size N] [--version V]
//! ```
//!
//! Page indices are zero-based. Set `RUST_LOG=debug` for details.

use pdf_assembler::{AssemblerConfig, Indent, PdfAssembler};
use std::path::PathBuf;
use std::process::ExitCode;

struct CliArgs {
    input: PathBuf,
    output: PathBuf,
    delete: Vec<usize>,
    rotations: Vec<(i64, Vec<usize>)>,
    config: AssemblerConfig,
}

fn usage() -> String {
    "usage: pdf_assemble <in.pdf> <out> [--delete i,j] [--rotate deg:i,j] \
     [--no-compress] [--indent N] [--group-size N] [--version V]"
        .to_string()
}

fn parse_indices(list: &str) -> Result<Vec<usize>, String> {
    list.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.trim().parse().map_err(|_| format!("bad page index '{}'", s)))
        .collect()
}

impl CliArgs {
    fn from_args(args: &[String]) -> Result<Self, String> {
        let mut positional = Vec::new();
        let mut delete = Vec::new();
        let mut rotations = Vec::new();
        let mut config = AssemblerConfig::default();

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            let mut value = || {
                i += 1;
                args.get(i).cloned().ok_or_else(|| format!("{} needs a value", flag))
            };
            match flag {
                "--delete" => delete.extend(parse_indices(&value()?)?),
                "--rotate" => {
                    let arg = value()?;
                    let (degrees, pages) = arg
                        .split_once(':')
                        .ok_or_else(|| format!("--rotate expects deg:i,j, got '{}'", arg))?;
                    let degrees = degrees.parse().map_err(|_| format!("bad rotation '{}'", degrees))?;
                    rotations.push((degrees, parse_indices(pages)?));
                },
                "--no-compress" => config = config.with_compress(false),
                "--indent" => {
                    let width = value()?;
                    let width = width.parse().map_err(|_| format!("bad indent '{}'", width))?;
                    config = config.with_indent(Indent::Spaces(width));
                },
                "--group-size" => {
                    let size = value()?;
                    let size = size.parse().map_err(|_| format!("bad group size '{}'", size))?;
                    config = config.with_page_group_size(size);
                },
                "--version" => config = config.with_pdf_version(value()?),
                "-h" | "--help" => return Err(usage()),
                other if other.starts_with("--") => return Err(format!("unknown option {}\n{}", other, usage())),
                other => positional.push(PathBuf::from(other)),
            }
            i += 1;
        }

        let [input, output]: [PathBuf; 2] = positional.try_into().map_err(|_| usage())?;
        Ok(Self {
            input,
            output,
            delete,
            rotations,
            config,
        })
    }
}

fn run(args: CliArgs) -> pdf_assembler::Result<PathBuf> {
    let mut session = PdfAssembler::open(&args.input, args.config)?;
    if session.recovery_mode() {
        eprintln!("warning: {} has a damaged cross-reference table", args.input.display());
    }

    // rotate first so indices refer to the input's pages
    for (degrees, pages) in &args.rotations {
        session.rotate_pages(pages, *degrees)?;
    }
    if !args.delete.is_empty() {
        session.delete_pages(&args.delete)?;
    }

    let pages = session.count_pages()?;
    let path = session.assemble_to_file(&args.output)?;
    println!("{} -> {} ({} pages)", args.input.display(), path.display(), pages);
    Ok(path)
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = match CliArgs::from_args(&args) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        },
    };

    match run(args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        },
    }
}
