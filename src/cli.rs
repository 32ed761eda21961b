use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use atty::Stream;
use clap::{Parser, Subcommand};
use pengalih_rs::{
    Effect, Error as PengalihError, Navigator, PageLoadOutcome, QrSvgEncoder, Record,
    RecordStore, RecordingEffects,
};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing::Level;

use crate::logging::{self, Verbosity};

#[derive(Parser, Debug)]
#[command(name = "pengalih-rs", about = "Resolve short names to links", version)]
pub struct Cli {
    /// Link table (JSON Lines) to use instead of the compiled-in one.
    #[arg(long, global = true, env = "PENGALIH_DATA")]
    data: Option<PathBuf>,

    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// Debug-level logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a request path (e.g. `/marthin`) the way a page load would.
    Resolve {
        /// Path or bare name; matching ignores case.
        path: String,
    },
    /// Find links whose name or description contains the query.
    Search {
        /// Text to look for, case-insensitively.
        query: String,
        /// Print only the link of the Nth result (1-based).
        #[arg(long)]
        pick: Option<usize>,
    },
    /// List the whole link table.
    List,
    /// Write a QR code for a name's link.
    Qr {
        /// Name whose link is encoded.
        key: String,
        /// Directory that receives `qrcode-<name>.svg`.
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Run the HTTP redirector.
    #[cfg(feature = "web")]
    Serve(ServeArgs),
}

#[cfg(feature = "web")]
#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "PENGALIH_ADDR", default_value = "127.0.0.1:8080")]
    addr: std::net::SocketAddr,
    /// Public base URL used in the usage example on the home page.
    #[arg(long, env = "PENGALIH_BASE_URL")]
    base_url: Option<String>,
    /// Stylesheet family for the rendered pages.
    #[arg(long, default_value = "tailwind")]
    theme: pengalih_rs::web::WebTheme,
    /// Link shown in the "add your link" footer.
    #[arg(long, requires = "contact_name")]
    contact_url: Option<String>,
    /// Label for the footer link.
    #[arg(long, requires = "contact_url")]
    contact_name: Option<String>,
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.verbose, cli.quiet);
    let normal = match cli.command {
        #[cfg(feature = "web")]
        Command::Serve(_) => Level::INFO,
        _ => Level::WARN,
    };
    logging::init(verbosity, normal);

    let store = load_store(cli.data.as_deref())?;
    match cli.command {
        Command::Resolve { path } => handle_resolve(store, &path, cli.json),
        Command::Search { query, pick } => handle_search(store, &query, pick, cli.json),
        Command::List => handle_list(store, cli.json),
        Command::Qr { key, output_dir } => handle_qr(store, &key, &output_dir, cli.json),
        #[cfg(feature = "web")]
        Command::Serve(args) => handle_serve(store, args),
    }
}

fn load_store(data: Option<&Path>) -> Result<&'static RecordStore, Box<dyn Error>> {
    match data {
        Some(path) => {
            let store = RecordStore::load_jsonl(path)?;
            tracing::info!(path = %path.display(), records = store.len(), "loaded link table");
            Ok(Box::leak(Box::new(store)))
        }
        None => Ok(RecordStore::embedded()),
    }
}

/// A navigator that has settled on the home screen.
fn home_navigator(store: &RecordStore) -> Result<Navigator<'_>, PengalihError> {
    let mut navigator = Navigator::new(store);
    navigator.page_load("/", &mut RecordingEffects::new())?;
    Ok(navigator)
}

fn handle_resolve(store: &RecordStore, path: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    let mut navigator = Navigator::new(store);
    let mut effects = RecordingEffects::new();
    match navigator.page_load(&path, &mut effects)? {
        PageLoadOutcome::Redirected(record) => {
            let target = navigation_target(effects.into_effects())
                .unwrap_or_else(|| record.link().to_string());
            if as_json {
                let payload = json!({
                    "path": path,
                    "state": navigator.state(),
                    "key": record.key(),
                    "link": target,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{target}");
            }
            Ok(())
        }
        PageLoadOutcome::NotFound => Err(PengalihError::KeyNotFound {
            key: navigator.attempted_key().unwrap_or_default().to_string(),
        }
        .into()),
        PageLoadOutcome::Home => {
            if as_json {
                let payload = json!({ "path": path, "state": navigator.state() });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Empty path: nothing to resolve. Try `search` or `list`.");
            }
            Ok(())
        }
        PageLoadOutcome::Ignored => {
            Err(format!("{path} is a static asset path and is never resolved").into())
        }
    }
}

fn navigation_target(effects: Vec<Effect>) -> Option<String> {
    effects.into_iter().find_map(|effect| match effect {
        Effect::Navigate(url) => Some(url),
        _ => None,
    })
}

fn handle_search(
    store: &RecordStore,
    query: &str,
    pick: Option<usize>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let mut navigator = home_navigator(store)?;
    navigator.search_input(query)?;

    if let Some(position) = pick {
        let index = position
            .checked_sub(1)
            .ok_or("--pick counts from 1")?;
        let mut effects = RecordingEffects::new();
        let record = navigator.select_result(index, &mut effects)?;
        for effect in effects.into_effects() {
            if let Effect::OpenInNewContext(url) = effect {
                if as_json {
                    let payload = json!({ "key": record.key(), "link": url });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                } else {
                    println!("{url}");
                }
            }
        }
        return Ok(());
    }

    let results = navigator.search_results();
    if as_json {
        let payload = json!({
            "query": query,
            "searched": navigator.has_searched(),
            "results": results,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !navigator.has_searched() {
        println!("Query is blank; nothing searched.");
    } else if results.is_empty() {
        println!("No links match \"{query}\".");
    } else {
        println!("Matches for \"{query}\" ({}):", results.len());
        print_record_table(results.iter().copied());
    }
    Ok(())
}

fn handle_list(store: &RecordStore, as_json: bool) -> Result<(), Box<dyn Error>> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(store.records())?);
        return Ok(());
    }
    if store.is_empty() {
        println!("The link table is empty.");
        return Ok(());
    }
    print_record_table(store.records().iter());
    Ok(())
}

fn handle_qr(
    store: &RecordStore,
    key: &str,
    output_dir: &Path,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let record = store.find_exact(key).ok_or_else(|| PengalihError::KeyNotFound {
        key: key.to_string(),
    })?;
    let mut navigator = home_navigator(store)?;
    if let Err(err) = navigator.request_preview(record, &QrSvgEncoder::default()) {
        if let Some(notice) = navigator.notice() {
            eprintln!("{notice}");
        }
        return Err(err.into());
    }

    let mut effects = RecordingEffects::new();
    navigator.download_preview(&mut effects)?;
    fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();
    for effect in effects.into_effects() {
        if let Effect::SaveFile { file_name, image } = effect {
            let target = output_dir.join(&file_name);
            fs::write(&target, &image.bytes)?;
            written.push(target);
        }
    }

    if as_json {
        let payload = json!({
            "key": record.key(),
            "link": record.link(),
            "files": written.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for path in &written {
            println!("Wrote {} ({})", path.display(), record.link());
        }
    }
    Ok(())
}

#[cfg(feature = "web")]
fn handle_serve(store: &'static RecordStore, args: ServeArgs) -> Result<(), Box<dyn Error>> {
    use pengalih_rs::web::{self, Contact, WebConfig};

    let base_url = args
        .base_url
        .unwrap_or_else(|| format!("http://{}", args.addr));
    let contact = match (args.contact_url, args.contact_name) {
        (Some(url), Some(name)) => Some(Contact { url, name }),
        _ => None,
    };
    let config = WebConfig {
        addr: args.addr,
        theme: args.theme,
        base_url,
        contact,
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(web::serve(config, store))?;
    Ok(())
}

fn print_record_table<'a>(rows: impl Iterator<Item = &'a Record> + Clone) {
    let key_width = rows
        .clone()
        .map(|record| record.key().len())
        .max()
        .unwrap_or(3)
        .max("KEY".len());
    let link_width = rows
        .clone()
        .map(|record| record.link().len())
        .max()
        .unwrap_or(4)
        .max("LINK".len());
    println!("{:<key_width$}  {:<link_width$}  DESCRIPTION", "KEY", "LINK");
    println!("{:-<key_width$}  {:-<link_width$}  -----------", "", "");
    for record in rows {
        println!(
            "{:<key_width$}  {:<link_width$}  {}",
            record.key(),
            record.link(),
            render_description(record.description()),
        );
    }
}

/// Descriptions are free text; on a terminal they get termimad's inline
/// styling, elsewhere they pass through untouched.
fn render_description(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() || !stdout_is_tty() {
        return trimmed.to_string();
    }
    let skin = MadSkin::default();
    FmtText::from(&skin, trimmed, Some(markdown_width()))
        .to_string()
        .trim_end()
        .to_string()
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}
