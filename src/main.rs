use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hotwatch::notify::Event;
use hotwatch::{
    blocking::{Flow, Hotwatch},
    EventKind,
};
use miette::{bail, IntoDiagnostic, Result};

use octet::error::{asm_report, fault_report};
use octet::{disassemble, Assembly, Cpu, MEMORY_SIZE};

/// Octet is an assembler and interpreter toolchain for a tiny 8-bit instruction set.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asm` file to run
    path: Option<PathBuf>,

    /// Log machine state before every instruction
    #[arg(long, global = true)]
    trace: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run text `.asm` or binary `.bin` file directly and output final machine state
    Run {
        /// `.asm` or `.bin` file to run
        name: PathBuf,
        /// Maximum number of instructions to execute [env: OCTET_MAX_CYCLES, default: 1000]
        #[arg(short, long)]
        max_cycles: Option<usize>,
        /// Address to load a `.bin` file at and start executing from [env: OCTET_ORIGIN]
        #[arg(short, long, value_parser = parse_addr)]
        origin: Option<u16>,
    },
    /// Create binary `.bin` file to run later
    Compile {
        /// `.asm` file to compile
        name: PathBuf,
        /// Destination to output `.bin` file
        dest: Option<PathBuf>,
    },
    /// Check a `.asm` file without running or outputting binary
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Print instructions stored in a `.asm` or `.bin` file
    Disasm {
        /// `.asm` or `.bin` file to disassemble
        name: PathBuf,
        /// Address to start disassembling from
        #[arg(short, long, value_parser = parse_addr)]
        start: Option<u16>,
        /// Number of statements to show
        #[arg(short = 'n', long, default_value_t = 16)]
        count: usize,
    },
    /// List labels defined in a `.asm` file and their addresses
    Symbols {
        /// `.asm` file to read labels from
        name: PathBuf,
    },
    /// Place a watch on a `.asm` file to receive constant assembler updates
    Watch {
        /// `.asm` file to watch
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();

    let level = if args.trace { "trace" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    octet::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(octet::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    let Some(command) = args.command else {
        if let Some(path) = args.path {
            return run(&path, None, None);
        }
        println!("\n~ octet v{VERSION} ~");
        println!("{}", SHORT_INFO.truecolor(255, 183, 197));
        std::process::exit(0);
    };

    match command {
        Command::Run {
            name,
            max_cycles,
            origin,
        } => run(&name, max_cycles, origin),
        Command::Compile { name, dest } => {
            file_message(Green, "Assembling", &name);
            let asm = assemble(&name)?;

            let out_file_name = match dest {
                Some(dest) => dest,
                None => name.with_extension("bin"),
            };
            fs::write(&out_file_name, asm.image.used()).into_diagnostic()?;

            let size = asm.image.used().len();
            message(Green, "Finished", &format!("emit binary ({size} bytes)"));
            file_message(Green, "Saved", &out_file_name);
            Ok(())
        }
        Command::Check { name } => {
            file_message(Green, "Checking", &name);
            let _ = assemble(&name)?;
            message(Green, "Success", "no errors found!");
            Ok(())
        }
        Command::Disasm { name, start, count } => {
            let start = start.unwrap_or_else(octet::env::origin);
            let cpu = boot(&name, start)?;
            for line in disassemble(cpu.memory(), start, count) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Symbols { name } => {
            let asm = assemble(&name)?;
            if asm.labels.is_empty() {
                message(Cyan, "Empty", "no labels defined");
            }
            for label in &asm.labels {
                println!("{:04X}  {}", label.addr, label.name);
            }
            Ok(())
        }
        Command::Watch { name } => watch(name),
    }
}

enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

/// Accept the same integer literals as the assembler for address arguments.
fn parse_addr(s: &str) -> std::result::Result<u16, String> {
    let val = octet::parse_int(s).ok_or_else(|| format!("`{s}` is not an integer literal"))?;
    u16::try_from(val).map_err(|_| format!("{val:#x} is outside of 0x0000..=0xFFFF"))
}

/// Return assembled image and labels of a source file, rendering errors against the source.
fn assemble(name: &Path) -> Result<Assembly> {
    let contents = fs::read_to_string(name).into_diagnostic()?;
    octet::assemble_with_labels(&contents).map_err(|err| asm_report(&err, &contents))
}

/// Machine with the program at `name` loaded. Binaries are placed at `origin`.
fn boot(name: &Path, origin: u16) -> Result<Cpu> {
    let mut cpu = Cpu::new();
    match name.extension().and_then(|ext| ext.to_str()) {
        Some("bin") => {
            let buffer = fs::read(name).into_diagnostic()?;
            if buffer.len() > MEMORY_SIZE {
                bail!("File is larger than the 64KB address space")
            }
            cpu.load(&buffer, origin);
        }
        Some("asm") => {
            let asm = assemble(name)?;
            cpu.load(asm.image.as_bytes(), 0);
        }
        Some(_) => bail!("File has unknown extension. Exiting..."),
        None => bail!("File has no extension. Exiting..."),
    }
    Ok(cpu)
}

fn run(name: &Path, max_cycles: Option<usize>, origin: Option<u16>) -> Result<()> {
    let max_cycles = max_cycles.unwrap_or_else(octet::env::max_cycles);
    let origin = origin.unwrap_or_else(octet::env::origin);

    file_message(MsgColor::Green, "Assembling", name);
    let mut cpu = boot(name, origin)?;
    cpu.set_pc(origin);

    message(
        MsgColor::Green,
        "Running",
        &format!("from {origin:#06x}, at most {max_cycles} cycles"),
    );
    let cycles = match cpu.run(max_cycles) {
        Ok(cycles) => cycles,
        Err(fault) => {
            print_registers(&cpu);
            return Err(fault_report(&fault));
        }
    };

    if cpu.halted() {
        message(MsgColor::Cyan, "Halted", &format!("after {cycles} cycles"));
    } else {
        message(
            MsgColor::Red,
            "Stopped",
            &format!("cycle budget exhausted after {cycles} cycles"),
        );
    }
    print_registers(&cpu);
    file_message(MsgColor::Green, "Completed", name);
    Ok(())
}

fn print_registers(cpu: &Cpu) {
    println!("\n------ Registers ------");
    for (i, val) in cpu.regs().iter().enumerate() {
        println!("r{i}: {val:#04x} {val:>10}");
    }
    println!("pc: {:#06x}", cpu.pc());
    println!("z: {}  c: {}", cpu.z() as u8, cpu.c() as u8);
    println!("-----------------------");
}

fn watch(name: PathBuf) -> Result<()> {
    if !name.exists() {
        bail!("File does not exist. Exiting...")
    }
    // Vim breaks if watching a single file
    let folder_path = match name.parent() {
        Some(pth) if pth.is_dir() => pth.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };

    // Clear screen and move cursor to top left
    print!("\x1B[2J\x1B[2;1H");
    file_message(MsgColor::Green, "Watching", &name);
    message(MsgColor::Cyan, "Help", "press CTRL+C to exit");

    let mut watcher =
        Hotwatch::new_with_custom_delay(Duration::from_millis(500)).into_diagnostic()?;

    watcher
        .watch(folder_path, move |event: Event| match event.kind {
            // Watch remove for vim changes
            EventKind::Modify(_) | EventKind::Remove(_) => {
                print!("\x1B[2J\x1B[2;1H");
                file_message(MsgColor::Green, "Watching", &name);
                message(MsgColor::Green, "Re-checking", "file change detected");
                message(MsgColor::Cyan, "Help", "press CTRL+C to exit");

                // Makes reruns more obvious
                sleep(Duration::from_millis(50));

                match assemble(&name) {
                    Ok(_) => message(MsgColor::Green, "Success", "no errors found!"),
                    Err(e) => println!("\n{:?}", e),
                }
                Flow::Continue
            }
            _ => Flow::Continue,
        })
        .into_diagnostic()?;
    watcher.run();
    Ok(())
}

const SHORT_INFO: &str = r"
Welcome to octet, a two-pass assembler and stepping interpreter
for a minimal 8-bit instruction set with four registers.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
