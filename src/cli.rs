// ============================================================================
// colorbook CLI — headless session replay against artwork descriptors
// ============================================================================
//
// Usage examples:
//   colorbook -a pear.toml -s session.txt -o pear.png
//   colorbook -a "art/*.toml" -s scribble.txt --output-dir out/ --store saves/
//   colorbook -a pear.toml -s session.txt --mobile --seed 42
//
// Session files hold one command per line; `#` starts a comment.
//   brush <kind> [#rrggbb[aa]] [radius]
//   down <nx> <ny> | move <nx> <ny> | up | exit
//   tap <nx> <ny>
//   tick [count]
//   clear
//   suspend

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;

use crate::artwork::{ArtworkDescriptor, ArtworkHandle};
use crate::brush::{BrushConfig, BrushKind, parse_hex_color};
use crate::config::{EngineConfig, PlatformProfile};
use crate::engine::{NoEvents, PaintEngine};
use crate::persist::{FileStore, KeyValueStore, MemoryStore, encode_png};

const DEFAULT_RADIUS: u32 = 10;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// colorbook headless painter.
///
/// Replays a recorded pointer session against one or more artworks and
/// writes the painted canvas as PNG.
#[derive(Parser, Debug)]
#[command(name = "colorbook", about = "colorbook headless session replay")]
pub struct CliArgs {
    /// Artwork descriptor file(s) (.toml).  Glob patterns accepted.
    #[arg(short, long, required = true, num_args = 1..)]
    pub artwork: Vec<String>,

    /// Session script to replay on each artwork.
    #[arg(short, long, value_name = "SESSION.txt")]
    pub session: PathBuf,

    /// Output PNG path.  Only valid for a single artwork.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory; files are named after the artwork's save key.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory for saved progress.  Without it saves stay in memory.
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Settings file (key=value).  Defaults apply when omitted.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use the mobile profile (half-size texture and brushes).
    #[arg(long)]
    pub mobile: bool,

    /// Brush texture seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print per-artwork timing.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Session script
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum SessionCommand {
    Brush(BrushConfig),
    Down(f32, f32),
    Move(f32, f32),
    Up,
    Exit,
    Tap(f32, f32),
    Tick(u32),
    Clear,
    Suspend,
}

/// Parse a session script.  Errors carry the 1-based line number.
pub fn parse_session(text: &str) -> Result<Vec<SessionCommand>, String> {
    let mut commands = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let tokens = strip_comment(line);
        if tokens.is_empty() {
            continue;
        }
        let cmd = parse_command(&tokens).map_err(|e| format!("line {}: {}", n + 1, e))?;
        commands.push(cmd);
    }
    Ok(commands)
}

/// Tokens before the comment.  A `#` token is a colour only as an argument
/// of `brush`; anywhere else it starts a comment.
fn strip_comment(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for tok in line.split_whitespace() {
        let is_colour = tokens.first() == Some(&"brush") && parse_hex_color(tok).is_some();
        if tok.starts_with('#') && !is_colour {
            break;
        }
        tokens.push(tok);
    }
    tokens
}

fn parse_command(tokens: &[&str]) -> Result<SessionCommand, String> {
    let word = tokens[0];
    let args = &tokens[1..];

    let point = |args: &[&str]| -> Result<(f32, f32), String> {
        match args {
            [x, y] => {
                let x = x.parse().map_err(|_| format!("bad x '{x}'"))?;
                let y = y.parse().map_err(|_| format!("bad y '{y}'"))?;
                Ok((x, y))
            }
            _ => Err(format!("'{word}' takes <nx> <ny>")),
        }
    };

    match word {
        "brush" => {
            let kind_name = args.first().ok_or("brush needs a kind")?;
            let kind = BrushKind::from_name(kind_name).ok_or_else(|| format!("unknown brush '{kind_name}'"))?;
            let mut config = BrushConfig::preset(kind, DEFAULT_RADIUS);
            for arg in &args[1..] {
                if arg.starts_with('#') {
                    config.color = parse_hex_color(arg).ok_or_else(|| format!("bad colour '{arg}'"))?;
                } else {
                    config.radius = arg.parse().map_err(|_| format!("bad radius '{arg}'"))?;
                }
            }
            Ok(SessionCommand::Brush(config))
        }
        "down" => point(args).map(|(x, y)| SessionCommand::Down(x, y)),
        "move" => point(args).map(|(x, y)| SessionCommand::Move(x, y)),
        "tap" => point(args).map(|(x, y)| SessionCommand::Tap(x, y)),
        "up" => Ok(SessionCommand::Up),
        "exit" => Ok(SessionCommand::Exit),
        "tick" => match args.first() {
            Some(n) => n.parse().map(SessionCommand::Tick).map_err(|_| format!("bad tick count '{n}'")),
            None => Ok(SessionCommand::Tick(1)),
        },
        "clear" => Ok(SessionCommand::Clear),
        "suspend" => Ok(SessionCommand::Suspend),
        other => Err(format!("unknown command '{other}'")),
    }
}

/// Drive `engine` through `commands`.  Input between `tick` commands shares
/// one tick; the trailing tick is closed and the engine shut down at the end.
pub fn replay(engine: &mut PaintEngine, commands: &[SessionCommand]) {
    engine.begin_tick();
    for cmd in commands {
        match *cmd {
            SessionCommand::Brush(config) => engine.set_brush_config(config),
            SessionCommand::Down(x, y) => engine.pointer_down(x, y),
            SessionCommand::Move(x, y) => engine.pointer_move(x, y),
            SessionCommand::Up => engine.pointer_up(),
            SessionCommand::Exit => engine.pointer_exit(),
            SessionCommand::Tap(x, y) => engine.tap(x, y),
            SessionCommand::Tick(n) => {
                for _ in 0..n {
                    engine.end_tick();
                    engine.begin_tick();
                }
            }
            SessionCommand::Clear => engine.clear_canvas(),
            SessionCommand::Suspend => engine.suspend(),
        }
    }
    engine.end_tick();
    engine.shutdown();
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the replay for every artwork and return an OS exit code.
/// `0` = all artworks succeeded, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.artwork);
    if inputs.is_empty() {
        eprintln!("error: no artwork descriptors matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} artworks given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let commands = match std::fs::read_to_string(&args.session) {
        Ok(text) => match parse_session(&text) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: {}: {}", args.session.display(), e);
                return ExitCode::FAILURE;
            }
        },
        Err(e) => {
            eprintln!("error: could not read session '{}': {}", args.session.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut config = args
        .config
        .as_deref()
        .map(EngineConfig::load_from)
        .unwrap_or_default();
    if args.mobile {
        config.set_platform(PlatformProfile::Mobile);
    }
    if let Some(seed) = args.seed {
        config.set_seed(seed);
    }

    let store: Arc<dyn KeyValueStore> = match &args.store {
        Some(dir) => Arc::new(FileStore::new(dir)),
        None => Arc::new(MemoryStore::new()),
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, path.display());
        }
        let start = Instant::now();

        let handle = match ArtworkDescriptor::load(path) {
            Ok(h) => h,
            Err(e) => {
                eprintln!("  error: {}", e);
                log_err!("CLI: {}: {}", path.display(), e);
                any_failure = true;
                continue;
            }
        };

        match run_one(&handle, &commands, config.clone(), store.clone()) {
            Ok(image) => {
                let Some(out) = output_path(&handle, args.output.as_deref(), args.output_dir.as_deref()) else {
                    continue;
                };
                match encode_png(&image).map_err(|e| e.to_string()).and_then(|bytes| {
                    std::fs::write(&out, bytes).map_err(|e| e.to_string())
                }) {
                    Ok(()) => {
                        if args.verbose || multi {
                            println!(
                                "  → {} ({:.0}ms)",
                                out.display(),
                                start.elapsed().as_secs_f64() * 1000.0
                            );
                        }
                    }
                    Err(e) => {
                        eprintln!("  error: could not write '{}': {}", out.display(), e);
                        any_failure = true;
                    }
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn run_one(
    handle: &ArtworkHandle,
    commands: &[SessionCommand],
    config: EngineConfig,
    store: Arc<dyn KeyValueStore>,
) -> Result<image::RgbaImage, String> {
    let mut engine = PaintEngine::new(config, store, Box::new(NoEvents));
    engine.activate(handle).map_err(|e| e.to_string())?;
    replay(&mut engine, commands);
    engine
        .canvas()
        .map(|c| c.snapshot())
        .ok_or_else(|| "engine lost its canvas".to_string())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);
        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// `--output` wins; otherwise `<output-dir>/<save key>.png`; otherwise no file.
fn output_path(handle: &ArtworkHandle, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }
    output_dir.map(|dir| dir.join(format!("{}.png", handle.save_key())))
}
