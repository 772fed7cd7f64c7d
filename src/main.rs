use clap::{Parser, Subcommand};
use oatc::item::{self, ItemFeatures, VideoKind};
use oatc::maintenance::trim::Mode as TrimMode;
use oatc::maintenance::{count, import, sort, trim};
use oatc::render::{markdown, normal};
use oatc::store::{self, LogStore};
use oatc::{home, query, Config, OatError};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "oat", version = "1.0.0", about = "A stack-structured personal notes database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a fresh, empty database
    Wipe {
        /// Overwrite an existing, non-empty database
        #[arg(long)]
        everything: bool,
    },
    /// Append a text note
    Push {
        text: String,
        #[arg(long)]
        mobile: bool,
    },
    /// Append one or more images
    Img {
        paths: Vec<PathBuf>,
        #[arg(long)]
        mobile: bool,
    },
    /// Append one or more files
    File {
        paths: Vec<PathBuf>,
        #[arg(long)]
        mobile: bool,
    },
    /// Append one or more videos (sniffed from content; reads stdin if no paths given)
    Vid {
        paths: Vec<PathBuf>,
        #[arg(long)]
        mobile: bool,
    },
    /// Remove and print the last n items (default 1)
    Pop { n: Option<usize> },
    /// Print the last n items without removing them (default 10)
    Tail { n: Option<usize> },
    /// Print the first n items (default 10)
    Head { n: Option<usize> },
    /// Count items matching (or, with --not, not matching) a predicate
    Count {
        #[arg(long)]
        not: bool,
        attrs: Vec<String>,
    },
    /// Sort the database ascending by id, dropping shadowed void stubs
    Sort,
    /// Export the database as Markdown
    Markdown {
        tz_minutes: i32,
        media_dir: Option<PathBuf>,
    },
    /// Dump every item's raw encoded bytes as hex
    Raw,
    /// Merge another database's items into this one (current wins on id collision)
    Import { path: PathBuf },
    /// Write a copy with matching items replaced by void stubs
    Trim { attrs: Vec<String>, out: PathBuf },
    /// Write a copy with non-matching items replaced by void stubs
    Filter { attrs: Vec<String>, out: PathBuf },
    /// Print or set the session id used by subsequent pushes
    Session { id: Option<i64> },
    /// Debug: overwrite an item's id in place
    Dbgsetid { item_id: u64, new_id: u64 },
    /// Debug: overwrite an item's timestamp in place (item must already carry one)
    Dbgsettime { item_id: u64, ms: i64 },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load()?;

    match Cli::parse().command {
        Commands::Wipe { everything } => {
            let path = resolved_path()?;
            if path.exists() && std::fs::metadata(&path)?.len() > 0 && !everything {
                return Err(format!(
                    "{} already exists and is non-empty — pass --everything to overwrite",
                    path.display()
                )
                .into());
            }
            store::initialize(&path)?;
            println!("Created: {}", path.display());
        }

        Commands::Push { text, mobile } => {
            let path = resolved_path()?;
            let features = base_features(mobile);
            push_item(&path, features, text.as_bytes())?;
        }

        Commands::Img { paths, mobile } => {
            let path = resolved_path()?;
            for p in &paths {
                let data = std::fs::read(p)?;
                let name = filename_of(p);
                let features = ItemFeatures { image_filename: Some(name), ..base_features(mobile) };
                push_item(&path, features, &data)?;
                println!("  pushed image {} ({} B)", p.display(), data.len());
            }
        }

        Commands::File { paths, mobile } => {
            let path = resolved_path()?;
            for p in &paths {
                let data = std::fs::read(p)?;
                let name = filename_of(p);
                let features = ItemFeatures { filename: Some(name), ..base_features(mobile) };
                push_item(&path, features, &data)?;
                println!("  pushed file {} ({} B)", p.display(), data.len());
            }
        }

        Commands::Vid { paths, mobile } => {
            let path = resolved_path()?;
            if paths.is_empty() {
                let mut data = Vec::new();
                io::stdin().read_to_end(&mut data)?;
                push_video(&path, &data, None, mobile)?;
            } else {
                for p in &paths {
                    let data = std::fs::read(p)?;
                    push_video(&path, &data, Some(filename_of(p)), mobile)?;
                    println!("  pushed video {} ({} B)", p.display(), data.len());
                }
            }
        }

        Commands::Pop { n } => {
            let path = resolved_path()?;
            let mut s = LogStore::open(&path)?;
            let n = n.unwrap_or(1);
            let items = query::tail(&mut s, n)?;
            for _ in &items {
                s.pop_item()?;
            }
            s.write_stack_ptr()?;
            print_items(&items)?;
        }

        Commands::Tail { n } => {
            let path = resolved_path()?;
            let mut s = LogStore::open(&path)?;
            let items = query::tail(&mut s, n.unwrap_or(cfg.default_count))?;
            print_items(&items)?;
        }

        Commands::Head { n } => {
            let path = resolved_path()?;
            let mut s = LogStore::open(&path)?;
            let n = n.unwrap_or(cfg.default_count);
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for meta in query::scan_all_metadata(&mut s).take(n) {
                let meta = meta?;
                let payload = s.read_at(meta.start_offset + meta.contents_offset, meta.payload_len())?;
                normal::render_item(&mut out, &meta, &payload)?;
            }
        }

        Commands::Count { not, attrs } => {
            let path = resolved_path()?;
            let n = count::run(&path, &attrs, not)?;
            println!("{n}");
        }

        Commands::Sort => {
            let path = resolved_path()?;
            sort::run(&path)?;
            println!("Sorted: {}", path.display());
        }

        Commands::Markdown { tz_minutes, media_dir } => {
            let path = resolved_path()?;
            let mut s = LogStore::open(&path)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            markdown::export(&mut s, tz_minutes, cfg.markdown_gap_minutes, media_dir.as_deref(), &mut out)?;
        }

        Commands::Raw => {
            let path = resolved_path()?;
            let mut s = LogStore::open(&path)?;
            for meta in query::scan_all_metadata(&mut s) {
                let meta = meta?;
                let raw = s.read_at(meta.start_offset, meta.size)?;
                println!("id={:<20} {}", meta.id, hex::encode(&raw));
            }
        }

        Commands::Import { path: external } => {
            let path = resolved_path()?;
            let report = import::run(&path, &external)?;
            println!(
                "Imported {} item(s), skipped {} already-present id(s)",
                report.imported, report.skipped
            );
            for id in &report.stub_vs_live_conflicts {
                eprintln!("  conflict: id {id} is a void stub here but live in {}", external.display());
            }
        }

        Commands::Trim { attrs, out } => {
            let path = resolved_path()?;
            trim::run(&path, &attrs, TrimMode::Trim, &out)?;
            println!("Trimmed copy written to {}", out.display());
        }

        Commands::Filter { attrs, out } => {
            let path = resolved_path()?;
            trim::run(&path, &attrs, TrimMode::Filter, &out)?;
            println!("Filtered copy written to {}", out.display());
        }

        Commands::Session { id } => match id {
            Some(id) => println!("export OATS_SESSION={id}"),
            None => match std::env::var("OATS_SESSION") {
                Ok(v) => println!("{v}"),
                Err(_) => println!("no session set (export OATS_SESSION=<id> to start one)"),
            },
        },

        Commands::Dbgsetid { item_id, new_id } => {
            let path = resolved_path()?;
            dbgsetid(&path, item_id, new_id)?;
            println!("id {item_id} -> {new_id}");
        }

        Commands::Dbgsettime { item_id, ms } => {
            let path = resolved_path()?;
            dbgsettime(&path, item_id, ms)?;
            println!("id {item_id} timestamp -> {ms}");
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn resolved_path() -> Result<PathBuf, OatError> {
    home::store_path().ok_or(OatError::NotFound)
}

fn filename_of(p: &std::path::Path) -> Vec<u8> {
    p.file_name().map(|n| n.to_string_lossy().into_owned().into_bytes()).unwrap_or_default()
}

fn session_from_env() -> Option<i64> {
    std::env::var("OATS_SESSION").ok().and_then(|s| s.parse().ok())
}

fn base_features(mobile: bool) -> ItemFeatures {
    ItemFeatures {
        timestamp: Some(chrono::Utc::now().timestamp_millis()),
        session_id: session_from_env(),
        is_mobile: mobile,
        ..Default::default()
    }
}

fn next_id(store: &mut LogStore<File>) -> Result<u64, OatError> {
    let mut max = 0u64;
    for meta in query::scan_all_metadata(store) {
        max = max.max(meta?.id);
    }
    Ok(max + 1)
}

fn push_item(path: &std::path::Path, features: ItemFeatures, payload: &[u8]) -> Result<(), OatError> {
    let mut s = LogStore::open(path)?;
    let id = next_id(&mut s)?;
    let bytes = item::encode(id, &features, payload);
    s.push_item(&bytes)?;
    s.write_stack_ptr()?;
    println!("id: {id}");
    Ok(())
}

fn push_video(
    path: &std::path::Path,
    data: &[u8],
    filename: Option<Vec<u8>>,
    mobile: bool,
) -> Result<(), OatError> {
    let kind = VideoKind::sniff(data).ok_or(OatError::UnknownVideoKind)?;
    let features = ItemFeatures { filename, video_kind: Some(kind), ..base_features(mobile) };
    push_item(path, features, data)
}

fn print_items(items: &[(item::ItemMetadata, Vec<u8>)]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (meta, bytes) in items {
        let payload = &bytes[meta.contents_offset as usize..];
        normal::render_item(&mut out, meta, payload)?;
    }
    Ok(())
}

/// Overwrite an item's id in place. Safe because the id field is a fixed
/// 8 bytes at a fixed offset — no frame length changes, no rewrite needed.
fn dbgsetid(path: &std::path::Path, item_id: u64, new_id: u64) -> Result<(), OatError> {
    let mut s = LogStore::open(path)?;
    let target = query::scan_all_metadata(&mut s)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .find(|m| m.id == item_id)
        .ok_or_else(|| OatError::InvalidArgument(format!("no item with id {item_id}")))?;
    let mut f = s.into_inner();
    write_u64_at(&mut f, target.start_offset, new_id)?;
    Ok(())
}

/// Overwrite an item's timestamp in place. Only valid when the item
/// already carries a timestamp field (bit 1 set) — setting one on an
/// item that lacks it would change the record's length, which this
/// debug tool does not support.
fn dbgsettime(path: &std::path::Path, item_id: u64, ms: i64) -> Result<(), OatError> {
    let mut s = LogStore::open(path)?;
    let target = query::scan_all_metadata(&mut s)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .find(|m| m.id == item_id)
        .ok_or_else(|| OatError::InvalidArgument(format!("no item with id {item_id}")))?;
    if target.features.timestamp.is_none() {
        return Err(OatError::InvalidArgument(format!(
            "item {item_id} has no timestamp field to overwrite"
        )));
    }
    let timestamp_offset = target.start_offset + 9; // 8-byte id + 1-byte bitfield
    let mut f = s.into_inner();
    write_i64_at(&mut f, timestamp_offset, ms)?;
    Ok(())
}

fn write_u64_at(f: &mut File, offset: u64, value: u64) -> io::Result<()> {
    use byteorder::{BigEndian, WriteBytesExt};
    use std::io::{Seek, SeekFrom};
    f.seek(SeekFrom::Start(offset))?;
    f.write_u64::<BigEndian>(value)
}

fn write_i64_at(f: &mut File, offset: u64, value: i64) -> io::Result<()> {
    use byteorder::{BigEndian, WriteBytesExt};
    use std::io::{Seek, SeekFrom};
    f.seek(SeekFrom::Start(offset))?;
    f.write_i64::<BigEndian>(value)
}
