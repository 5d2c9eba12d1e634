extern crate ansi_term;
extern crate ctrlc;
extern crate linefeed;
use ansi_term::Style;
use basic4::error;
use basic4::lang::{Error, LineNumber};
use basic4::mach::{register, Compiler, Config, Console, Event, Syntax, Vm, MAX_DISPLAY};
use clap::{Parser, ValueEnum};
use linefeed::{DefaultTerminal, Interface, ReadResult};
use log::{debug, warn};
use std::cell::RefCell;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "basic4", version)]
#[command(about = "Compile and run a Basic4GL program")]
struct Args {
    /// Program source, or a snapshot with --load
    file: PathBuf,

    /// Instructions run between checks for Ctrl-C
    #[arg(long, default_value_t = 5000)]
    steps: usize,

    /// Dialect the program starts in
    #[arg(long, value_enum, default_value_t = Dialect::Basic4gl)]
    syntax: Dialect,

    /// Size of the variable data arena in cells
    #[arg(long = "max-data", default_value_t = 100_000_000)]
    max_data: usize,

    #[arg(long = "case-sensitive")]
    case_sensitive: bool,

    /// Stop at this source line, show the variables and carry on
    #[arg(long = "break", value_name = "LINE")]
    breakpoints: Vec<LineNumber>,

    /// Print the compiled instructions instead of running
    #[arg(long)]
    dump: bool,

    /// Write a snapshot of the compiled program
    #[arg(long, value_name = "PATH")]
    save: Option<PathBuf>,

    /// FILE is a snapshot written by --save
    #[arg(long)]
    load: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Dialect {
    Traditional,
    Basic4gl,
    TraditionalPrint,
}

impl From<Dialect> for Syntax {
    fn from(dialect: Dialect) -> Syntax {
        match dialect {
            Dialect::Traditional => Syntax::Traditional,
            Dialect::Basic4gl => Syntax::Basic4gl,
            Dialect::TraditionalPrint => Syntax::TraditionalPrint,
        }
    }
}

pub fn main() {
    env_logger::init();
    let args = Args::parse();
    let interrupted = Arc::new(AtomicBool::new(false));
    let int_moved = interrupted.clone();
    if let Err(error) = ctrlc::set_handler(move || {
        int_moved.store(true, Ordering::SeqCst);
    }) {
        warn!("Ctrl-C handler not installed: {}", error);
    }
    let interface = match Interface::new("basic4") {
        Ok(interface) => Arc::new(interface),
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(1);
        }
    };
    let console = Rc::new(RefCell::new(TermConsole::new(interface.clone())));
    let result = main_loop(&args, &interrupted, console.clone());
    console.borrow_mut().flush();
    if let Err(error) = result {
        eprintln!("{}", Style::new().bold().paint(error.to_string()));
        std::process::exit(1);
    }
}

fn main_loop(
    args: &Args,
    interrupted: &AtomicBool,
    console: Rc<RefCell<TermConsole>>,
) -> Result<(), Error> {
    let config = Config {
        max_data: args.max_data,
        steps: args.steps.max(1),
        case_sensitive: args.case_sensitive,
        syntax: args.syntax.into(),
        ..Config::default()
    };
    let mut comp = Compiler::new(Vm::new(&config), &config);
    register(&mut comp, console.clone());

    if args.load {
        let bytes = read_file(&args.file)?;
        comp.vm_mut().read_snapshot(&bytes)?;
    } else {
        let bytes = read_file(&args.file)?;
        comp.compile(&String::from_utf8_lossy(&bytes))?;
    }
    if let Some(path) = &args.save {
        std::fs::write(path, comp.vm().write_snapshot())
            .map_err(|e| error!(StreamError; e.to_string()))?;
        debug!("snapshot written to {}", path.display());
    }
    if args.dump {
        console.borrow_mut().print(&comp.vm().listing());
        return Ok(());
    }
    run(&mut comp, args, interrupted, &console)
}

fn read_file(path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|error| {
        let msg = format!("{}: {}", path.display(), error);
        match error.kind() {
            ErrorKind::NotFound => error!(FileNotFound; msg),
            _ => error!(InternalError; msg),
        }
    })
}

fn run(
    comp: &mut Compiler,
    args: &Args,
    interrupted: &AtomicBool,
    console: &Rc<RefCell<TermConsole>>,
) -> Result<(), Error> {
    let vm = comp.vm_mut();
    vm.reset();
    for line in &args.breakpoints {
        vm.set_user_breakpoint(*line);
    }
    let mut step_over = false;
    loop {
        let vm = comp.vm_mut();
        if interrupted.swap(false, Ordering::SeqCst) {
            vm.patch_out();
            let mut message = String::from("BREAK");
            if let Some((line, col)) = vm.ip_position() {
                message.push_str(&format!(" IN {}:{}", line, col));
            }
            console.borrow_mut().emphasize(&message);
            return Ok(());
        }
        let event = if step_over {
            // Run the instruction under the breakpoint before patching it back in.
            step_over = false;
            vm.patch_out();
            vm.execute(1)
        } else {
            vm.patch_in();
            vm.execute(args.steps.max(1))
        };
        match event {
            Event::Running | Event::Yield => {}
            Event::End => {
                vm.patch_out();
                return Ok(());
            }
            Event::Error(error) => {
                vm.patch_out();
                return Err(error);
            }
            Event::Breakpoint => {
                report_breakpoint(comp, console);
                step_over = true;
            }
        }
    }
}

fn report_breakpoint(comp: &Compiler, console: &Rc<RefCell<TermConsole>>) {
    let vm = comp.vm();
    let mut console = console.borrow_mut();
    if let Some((line, col)) = vm.ip_position() {
        console.emphasize(&format!("BREAKPOINT IN {}:{}", line, col));
    }
    for address in vm.return_addresses().iter().rev() {
        console.print(&format!("  in gosub {}\n", comp.describe_call(*address)));
    }
    for var in vm.variables().iter() {
        if let Some(value) = vm.var_to_string(&var.name, MAX_DISPLAY) {
            console.print(&format!("  {} = {}\n", var.name, value));
        }
    }
}

/// Console on the terminal. Output is written a line at a time so a
/// partial line can become the prompt for `input`.
struct TermConsole {
    interface: Arc<Interface<DefaultTerminal>>,
    pending: String,
}

impl TermConsole {
    fn new(interface: Arc<Interface<DefaultTerminal>>) -> TermConsole {
        TermConsole {
            interface,
            pending: String::new(),
        }
    }

    fn write(&self, text: &str) {
        if let Err(error) = self.interface.write_fmt(format_args!("{}", text)) {
            warn!("console write failed: {}", error);
        }
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            let pending = std::mem::take(&mut self.pending);
            self.write(&pending);
            self.write("\n");
        }
    }

    fn emphasize(&mut self, text: &str) {
        self.flush();
        self.write(&format!("{}\n", Style::new().bold().paint(text)));
    }
}

impl Console for TermConsole {
    fn print(&mut self, text: &str) {
        self.pending.push_str(text);
        if let Some(end) = self.pending.rfind('\n') {
            let rest = self.pending.split_off(end + 1);
            let lines = std::mem::replace(&mut self.pending, rest);
            self.write(&lines);
        }
    }

    fn input(&mut self) -> Option<String> {
        let prompt = std::mem::take(&mut self.pending);
        if let Err(error) = self.interface.set_prompt(&prompt) {
            warn!("console prompt failed: {}", error);
        }
        match self.interface.read_line() {
            Ok(ReadResult::Input(line)) => {
                self.interface.add_history_unique(line.clone());
                Some(line)
            }
            Ok(ReadResult::Signal(_)) | Ok(ReadResult::Eof) => None,
            Err(error) => {
                warn!("console read failed: {}", error);
                None
            }
        }
    }
}
