use anyhow::Context;
use std::io::Read;

// Offline runner for the extractor: feed it a page snapshot as JSON (file or
// stdin) and it prints the signal the page context would emit. `--paste`
// treats the input as raw pasted text instead.

fn main() -> anyhow::Result<()> {
  let args: Vec<String> = std::env::args().collect();

  if args.iter().any(|a| a == "--version") {
    println!("{}", env!("CARGO_PKG_VERSION"));
    return Ok(());
  }

  tracing_subscriber::fmt()
    .with_ansi(false)
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();

  let opts = Options::from_args(&args)?;
  let input = read_input(opts.input_path.as_deref())?;

  if opts.paste_mode {
    match scout::extract_paste_signal(&input) {
      Some(signal) => println!("{}", serde_json::to_string_pretty(&signal)?),
      None => {
        tracing::info!("paste below minimum length; no signal emitted");
        println!("null");
      }
    }
    return Ok(());
  }

  let snapshot: scout::PageSnapshot =
    serde_json::from_str(&input).context("parse page snapshot JSON")?;
  let signal = scout::extract_signal(&snapshot, &opts.url);
  println!("{}", serde_json::to_string_pretty(&signal)?);
  Ok(())
}

struct Options {
  url: String,
  paste_mode: bool,
  input_path: Option<String>,
}

impl Options {
  fn from_args(args: &[String]) -> anyhow::Result<Self> {
    let mut url = String::new();
    let mut paste_mode = false;
    let mut input_path = None;

    let mut i = 1;
    while i < args.len() {
      match args[i].as_str() {
        "--url" => {
          if let Some(v) = args.get(i + 1) {
            url = v.clone();
            i += 2;
            continue;
          }
          anyhow::bail!("--url requires a value");
        }
        "--paste" => {
          paste_mode = true;
        }
        other if !other.starts_with("--") => {
          input_path = Some(other.to_string());
        }
        _ => {}
      }
      i += 1;
    }

    if url.is_empty() && !paste_mode {
      anyhow::bail!("expected `--url <page-url>` (or `--paste`)");
    }

    Ok(Self {
      url,
      paste_mode,
      input_path,
    })
  }
}

fn read_input(path: Option<&str>) -> anyhow::Result<String> {
  match path {
    Some(p) => std::fs::read_to_string(p).with_context(|| format!("read {p}")),
    None => {
      let mut buf = String::new();
      std::io::stdin()
        .read_to_string(&mut buf)
        .context("read stdin")?;
      Ok(buf)
    }
  }
}
