// ABOUTME: REPL and script-runner binary for the symlisp engine

mod highlighter;

use clap::Parser;
use highlighter::ReplHelper;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use symlisp::config::{Limits, ReaderConfig, VERSION, WELCOME_MESSAGE, WELCOME_SUBTITLE};
use symlisp::engine::Engine;
use symlisp::error::EvalError;
use symlisp::object::Object;
use symlisp::reader::Reader;

/// S-expression Lisp engine with a parse/improve/compute pipeline
#[derive(Parser, Debug)]
#[command(name = "symlisp")]
#[command(version = VERSION)]
#[command(about = "An S-expression Lisp engine")]
struct CliArgs {
    /// Script file to execute (starts the REPL when absent)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Abort evaluation after this many compute steps
    #[arg(long = "max-steps", value_name = "N")]
    max_steps: Option<u64>,

    /// Abort evaluation beyond this non-tail nesting depth
    #[arg(long = "max-nesting", value_name = "N", default_value = "10000")]
    max_nesting: usize,

    /// Abort evaluation after this many milliseconds
    #[arg(long = "time-limit-ms", value_name = "MS")]
    time_limit_ms: Option<u64>,

    /// Maximum reader nesting depth
    #[arg(long = "reader-depth", value_name = "N", default_value = "200")]
    reader_depth: usize,

    /// Skip loading the prelude
    #[arg(long = "no-prelude")]
    no_prelude: bool,

    /// Run forms through the bytecode compiler when possible
    #[arg(long)]
    compile: bool,

    /// Trace parse/improve/compile/compute events to stderr
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let reader_cfg = ReaderConfig {
        max_depth: args.reader_depth,
        ..ReaderConfig::default()
    };
    let mut engine = Engine::new();
    engine.set_limits(Limits {
        max_nesting: Some(args.max_nesting),
        max_steps: args.max_steps,
        time_limit: args.time_limit_ms.map(Duration::from_millis),
    });
    engine.set_reader_config(reader_cfg.clone());
    if args.trace {
        install_trace(&engine);
    }
    if !args.no_prelude {
        engine.load_prelude()?;
    }

    match &args.script {
        Some(path) => {
            let src = std::fs::read_to_string(path)?;
            eval_source(&engine, &src, &reader_cfg, args.compile)?;
            Ok(())
        }
        None => repl(&engine, &reader_cfg, args.compile),
    }
}

/// Evaluates every form in `src`, optionally through the compiler with
/// fall-back to tree-walking for uncompilable forms.
fn eval_source(
    engine: &Engine,
    src: &str,
    reader_cfg: &ReaderConfig,
    compile: bool,
) -> Result<Object, EvalError> {
    let reader = Reader::new(reader_cfg.clone());
    let mut result = Object::Nil;
    for datum in reader.read_all(src)? {
        let top = engine.top_level();
        let expr = engine.parse(&datum, &top)?;
        let mut expr = engine.improve(&expr, &top)?;
        if compile {
            expr = match engine.compile(&expr) {
                Ok(program) => program,
                Err(EvalError::MissingCompile) => expr,
                Err(err) => return Err(err),
            };
        }
        result = engine.run(&expr, &top)?;
    }
    Ok(result)
}

fn install_trace(engine: &Engine) {
    engine.set_parse_observer(Some(Rc::new(|datum, expr| {
        eprintln!("parse   {} => {}", datum, expr);
    })));
    engine.set_improve_observer(Some(Rc::new(|before, after| {
        eprintln!("improve {} => {}", before, after);
    })));
    engine.set_compile_observer(Some(Rc::new(|expr| {
        eprintln!("compile {}", expr);
    })));
    engine.set_compute_observer(Some(Rc::new(|expr| {
        eprintln!("compute {}", expr);
    })));
}

fn repl(
    engine: &Engine,
    reader_cfg: &ReaderConfig,
    compile: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{} - {}", WELCOME_MESSAGE, WELCOME_SUBTITLE);

    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<ReplHelper, DefaultHistory> = Editor::with_config(config)?;
    rl.set_helper(Some(ReplHelper::new()));

    loop {
        match rl.readline("symlisp> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                match eval_source(engine, &line, reader_cfg, compile) {
                    Ok(value) => println!("{}", value),
                    Err(err) => eprintln!("error: {}", err),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("readline error: {}", err);
                break;
            }
        }
    }
    Ok(())
}
