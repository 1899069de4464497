use std::env;
use std::fs;
use std::process;

use tracing_subscriber::EnvFilter;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args: Vec<String> = env::args().collect();
  if args.len() != 2 {
    let program = args.first().map(String::as_str).unwrap_or("patternscript");
    eprintln!("usage: {program} <file.ps>");
    process::exit(1);
  }

  let source = match fs::read_to_string(&args[1]) {
    Ok(source) => source,
    Err(err) => {
      eprintln!("cannot read {}: {err}", args[1]);
      process::exit(1);
    }
  };

  match patternscript::compile_and_run(&source) {
    Ok(execution) => {
      for line in &execution.output {
        println!("{line}");
      }
    }
    Err(failure) => {
      // output produced before a runtime error still belongs on stdout
      for line in &failure.output {
        println!("{line}");
      }
      eprintln!("{}", failure.diagnostic);
      process::exit(1);
    }
  }
}
