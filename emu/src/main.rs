use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use arch::image;
use clap::Parser;
use color_print::cprintln;
use tracing::Level;
use tvmemu::hooks::{dump::Dump, trace::Trace, Hook};
use tvmemu::loader::{load, map_info};
use tvmemu::model::DEFAULT_STACK;
use tvmemu::{Console, Vm};

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Parser, Debug)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Stop with a failure after this many instructions
    #[arg(short = 't', long)]
    tmax: Option<u64>,

    /// Operand stack capacity in cells
    #[arg(long, default_value_t = DEFAULT_STACK)]
    stack: usize,

    /// Print every instruction before it runs
    #[arg(long)]
    trace: bool,

    /// YAML file selecting where to dump the machine state
    #[arg(short, long)]
    dump_cfg: Option<PathBuf>,

    /// One of `TRACE`, `DEBUG`, `INFO`, `WARN`, or `ERROR`
    #[arg(short, long, default_value_t = Level::WARN)]
    log_level: Level,

    #[arg(default_value = "output.bc")]
    input_file: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(io::stderr)
        .init();

    // ------------------------------------------------------------------------
    // Load image
    let image = match load(&args.input_file) {
        Ok(image) => image,
        Err(e) => {
            cprintln!("<red,bold>error</>: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match map_info(&image) {
        Ok(Some(map)) => {
            println!("Map Size: {}x{} ({} bytes)", map.width, map.height, map.len());
            println!("Map Data: 0x{:08X}", map.data());
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("{e}"),
    }

    let start = match image::find_export(&image, "start") {
        Ok(Some(start)) => start,
        Ok(None) => {
            cprintln!("<red,bold>error</>: no `start` export in {}", args.input_file.display());
            return ExitCode::FAILURE;
        }
        Err(e) => {
            cprintln!("<red,bold>error</>: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // ------------------------------------------------------------------------
    // Initialize hooks
    let mut hooks: Vec<Box<dyn Hook>> = Vec::new();
    match Dump::arg(args.dump_cfg.as_deref()) {
        Ok(dump) => hooks.push(Box::new(dump)),
        Err(e) => {
            cprintln!("<red,bold>error</>: {}", e);
            return ExitCode::FAILURE;
        }
    }
    if args.trace {
        hooks.push(Box::new(Trace));
    }

    // ------------------------------------------------------------------------
    // Main loop
    let mut vm = Vm::with_stack(image, Console::stdio(), args.stack);
    match vm.run_with(start, &mut hooks, args.tmax) {
        Ok(steps) => {
            tracing::info!("{} instructions", steps);
            ExitCode::SUCCESS
        }
        Err(fault) => {
            println!();
            cprintln!("<red,bold>error</>: {}", fault);
            cprintln!("     <blue>--></> pc <underline>0x{:08X}</>", vm.inst_pc());
            ExitCode::FAILURE
        }
    }
}
