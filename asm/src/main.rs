use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use color_print::cprintln;
use tracing::Level;
use tvmasm::error::Error;
use tvmasm::lexer::Lexer;
use tvmasm::util::{print_dump, print_tokens};
use tvmasm::{Abort, Assembler};

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Input file
    #[clap(default_value = "source.txt")]
    input: PathBuf,

    /// Output file
    #[clap(short, long, default_value = "output.bc")]
    output: PathBuf,

    /// Write the label table to this file
    #[clap(long)]
    labels: Option<PathBuf>,

    /// Print the tokens of the input file
    #[clap(long)]
    tokens: bool,

    /// Dump assembly listing
    #[clap(short, long)]
    dump: bool,

    /// One of `TRACE`, `DEBUG`, `INFO`, `WARN`, or `ERROR`
    #[arg(short, long, default_value_t = Level::WARN)]
    log_level: Level,
}

fn main() -> ExitCode {
    use clap::Parser;

    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(io::stderr)
        .init();

    if args.tokens {
        match fs::read_to_string(&args.input) {
            Ok(code) => {
                let name = args.input.display().to_string();
                let (tokens, _) = Lexer::new(name.as_str().into(), &code).parse();
                print_tokens(&tokens);
            }
            Err(e) => tracing::warn!("cannot read {} for --tokens: {e}", args.input.display()),
        }
    }

    let asm = match Assembler::assemble_file(&args.input) {
        Ok(asm) => asm,
        Err(Abort { error, report }) => {
            report.print();
            cprintln!("<red,bold>error</>: {}", error);
            return ExitCode::FAILURE;
        }
    };
    asm.report.print();

    if args.dump {
        print_dump(&asm.listing, &asm.image);
    }

    let output = args.output.display().to_string();
    tracing::info!("writing {} bytes to {}", asm.image.len(), output);
    if let Err(e) = fs::write(&args.output, &asm.image) {
        cprintln!("<red,bold>error</>: {}", Error::FileWrite(output, e));
        return ExitCode::FAILURE;
    }

    if let Some(path) = &args.labels {
        let written = File::create(path).and_then(|file| asm.labels.write_to(BufWriter::new(file)));
        if let Err(e) = written {
            cprintln!(
                "<red,bold>error</>: {}",
                Error::FileWrite(path.display().to_string(), e)
            );
            return ExitCode::FAILURE;
        }
    }

    let errors = asm.error_count();
    if errors == 0 {
        cprintln!("<green,bold>ok</>: no errors");
        ExitCode::SUCCESS
    } else {
        cprintln!("<red,bold>{}</> error(s)", errors);
        ExitCode::FAILURE
    }
}
