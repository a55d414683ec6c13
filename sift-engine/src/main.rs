//! Binary entrypoint: drive the filter chain over log files or stdin.
//!
//! Usage:
//!   sift-engine --config <file.json> --profile <id> [--from <stamp>] [--to <stamp>] [file...]
//!
//! Each file is one chunk; with no files, stdin is the single chunk.
//! Surviving entries are written to stdout as they complete. An entry past
//! the upper date bound stops the current chunk and moves on to the next.

use sift_engine::window::parse_stamp;
use sift_engine::{ConfigBundle, Event, FilterChain, Filterable, Verdict};
use std::env;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::process;

struct Args {
  config: String,
  profile: String,
  from: Option<String>,
  to: Option<String>,
  files: Vec<String>,
}

fn usage() {
  eprintln!(
    "Usage: sift-engine --config <file.json> --profile <id> [--from <stamp>] [--to <stamp>] [file...]"
  );
  eprintln!("  Stamps use the profile's dateFormat value. With no files, stdin is read.");
}

fn parse_args() -> Args {
  let mut args = env::args().skip(1);
  let mut config = None;
  let mut profile = None;
  let mut from = None;
  let mut to = None;
  let mut files = Vec::new();
  while let Some(arg) = args.next() {
    match arg.as_str() {
      "--config" => config = args.next(),
      "--profile" => profile = args.next(),
      "--from" => from = args.next(),
      "--to" => to = args.next(),
      "-h" | "--help" => {
        usage();
        process::exit(0);
      }
      _ => files.push(arg),
    }
  }
  let (Some(config), Some(profile)) = (config, profile) else {
    usage();
    process::exit(2);
  };
  Args {
    config,
    profile,
    from,
    to,
    files,
  }
}

fn parse_bound(raw: &str, format: &str, flag: &str) -> chrono::NaiveDateTime {
  parse_stamp(raw, format).unwrap_or_else(|| {
    eprintln!(
      "sift-engine: {} value {:?} does not parse with format {:?}",
      flag, raw, format
    );
    process::exit(2);
  })
}

fn run_chunk<R: BufRead, W: Write>(chain: &mut FilterChain, reader: R, out: &mut W, label: &str) {
  for line in reader.lines() {
    let line = match line {
      Ok(l) => l,
      Err(e) => {
        eprintln!("sift-engine: read error in {}: {}", label, e);
        process::exit(1);
      }
    };
    match chain.filter(line) {
      Ok(Verdict::Pass(entry)) => {
        let _ = writeln!(out, "{}", entry);
      }
      Ok(Verdict::Drop) => {}
      Ok(Verdict::Stop(bound)) => {
        log::info!("{}: past upper bound {}, skipping the rest", label, bound);
        break;
      }
      Err(e) => {
        eprintln!("sift-engine: {}", e);
        process::exit(1);
      }
    }
  }
  match chain.process_event(Event::ChunkEnded) {
    Ok(Some(flushed)) => {
      let _ = writeln!(out, "{}", flushed);
    }
    Ok(None) => {}
    Err(e) => {
      eprintln!("sift-engine: {}", e);
      process::exit(1);
    }
  }
}

fn main() {
  env_logger::init();
  let args = parse_args();

  let text = fs::read_to_string(&args.config).unwrap_or_else(|e| {
    eprintln!("sift-engine: cannot read {}: {}", args.config, e);
    process::exit(2);
  });
  let bundle = ConfigBundle::from_json(&text).unwrap_or_else(|e| {
    eprintln!("sift-engine: invalid JSON in {}: {}", args.config, e);
    process::exit(2);
  });

  let mut chain = FilterChain::new();
  match chain.add_by_config_id(&bundle, &args.profile) {
    Ok(true) => {}
    Ok(false) => {
      eprintln!(
        "sift-engine: no configuration found for profile {}",
        args.profile
      );
      process::exit(2);
    }
    Err(e) => {
      eprintln!("sift-engine: {}", e);
      process::exit(2);
    }
  }

  if args.from.is_some() || args.to.is_some() {
    let format = bundle
      .saved_configs
      .get(&args.profile)
      .and_then(|section| section.date_format.as_ref())
      .map(|d| d.value.clone());
    let Some(format) = format else {
      eprintln!(
        "sift-engine: --from/--to need savedConfigs.{}.dateFormat",
        args.profile
      );
      process::exit(2);
    };
    let from = args.from.as_deref().map(|r| parse_bound(r, &format, "--from"));
    let to = args.to.as_deref().map(|r| parse_bound(r, &format, "--to"));
    chain.set_date_bounds(from, to);
  }

  chain.lock();

  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());

  if args.files.is_empty() {
    let stdin = io::stdin();
    run_chunk(&mut chain, stdin.lock(), &mut out, "stdin");
  } else {
    for path in &args.files {
      let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
          eprintln!("sift-engine: cannot open {}: {}", path, e);
          process::exit(2);
        }
      };
      run_chunk(&mut chain, BufReader::new(file), &mut out, path);
    }
  }

  match chain.process_event(Event::AllChunksProcessed) {
    Ok(Some(flushed)) => {
      let _ = writeln!(out, "{}", flushed);
    }
    Ok(None) => {}
    Err(e) => {
      eprintln!("sift-engine: {}", e);
      process::exit(1);
    }
  }
  let _ = out.flush();
}
