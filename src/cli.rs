// ============================================================================
// PixelForge CLI: headless layer inspector
// ============================================================================
//
// Usage examples:
//   pixelforge -i sprite.png
//   pixelforge -i sheets/*.png --tile-size 16
//   pixelforge -i a.png b.png --verify --threshold 64 --verbose
//
// Each input is loaded as a single layer.  The report lists the tile grid and
// how many tiles are uniform.  `--verify` runs a synthetic edit through the
// full diff -> patch -> undo/redo path and checks the bytes come back.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::Rgba;
use uuid::Uuid;

use crate::config::{DEFAULT_TILE_SIZE, DEFAULT_WHOLE_BUFFER_THRESHOLD, EngineConfig};
use crate::error::RasterError;
use crate::geometry::{Point, TileIndex};
use crate::history::Command;
use crate::raster::{LayerId, PixelBuffer};
use crate::registry::LayerAgentRegistry;
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PixelForge headless layer inspector.
#[derive(Parser, Debug)]
#[command(
    name = "pixelforge",
    about = "Inspect images as PixelForge layers and exercise the undo engine",
    long_about = "Load image files as single layers and report their tile grid.\n\
                  With --verify, a synthetic stroke and tile fill are recorded,\n\
                  undone and redone, and the resulting bytes are compared.\n\n\
                  Example:\n  \
                  pixelforge -i sprites/*.png --tile-size 16 --verify"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "sheets/*.bmp").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Tile edge length in pixels (1-256).
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, value_name = "PX")]
    pub tile_size: u32,

    /// Distinct pixels per operation before the diff captures the whole buffer.
    #[arg(long, default_value_t = DEFAULT_WHOLE_BUFFER_THRESHOLD, value_name = "PIXELS")]
    pub threshold: usize,

    /// Record a synthetic edit and check undo/redo restore the exact bytes.
    #[arg(long)]
    pub verify: bool,

    /// Print per-file timing and patch details.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_tile_size(self.tile_size)
            .with_whole_buffer_threshold(self.threshold)
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the inspector and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let config = args.engine_config();
    if let Err(e) = config.validate() {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        println!("[{}/{}] {}", idx + 1, total, input_path.display());
        let file_start = Instant::now();

        match inspect_one(input_path, config, args.verify, args.verbose) {
            Ok(()) => {
                if args.verbose {
                    println!("  done ({:.0}ms)", file_start.elapsed().as_secs_f64() * 1000.0);
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                log_err!("{}: {}", input_path.display(), e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file pipeline
// ============================================================================

fn inspect_one(input: &Path, config: EngineConfig, verify: bool, verbose: bool) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let image = image::open(input)
        .map_err(|e| format!("load failed: {}", RasterError::from(e)))?
        .into_rgba8();
    let buffer = PixelBuffer::from_rgba_image(&image);

    let mut layers = LayerAgentRegistry::new(config);
    let layer_id = Uuid::new_v4();
    let agent = layers.register_agent(layer_id, buffer).map_err(|e| e.to_string())?;

    // -- Step 2: Report --------------------------------------------------
    let tm = agent.tile_manager();
    let uniform = tm.tiles().filter(|t| t.is_uniform).count();
    let total_tiles = tm.tiles().count();
    println!(
        "  {}x{} px, {}x{} tiles of {} px, {} uniform / {} non-uniform",
        agent.width(),
        agent.height(),
        tm.column_count(),
        tm.row_count(),
        tm.tile_size(),
        uniform,
        total_tiles - uniform
    );
    log_info!(
        "{}: {}x{} loaded, {} of {} tiles uniform",
        input.display(),
        agent.width(),
        agent.height(),
        uniform,
        total_tiles
    );

    // -- Step 3: Verify (optional) ---------------------------------------
    if verify {
        let report = verify_round_trip(&mut layers, layer_id)?;
        println!("  verify ok: {} patch, {} bytes encoded", report.kind, report.encoded_len);
        if verbose {
            println!(
                "  patch: {} px entries, {} tile fills, ~{} bytes in memory",
                report.pixel_count, report.tile_count, report.memory_size
            );
        }
    }
    Ok(())
}

struct VerifyReport {
    kind: &'static str,
    pixel_count: usize,
    tile_count: usize,
    memory_size: usize,
    encoded_len: usize,
}

/// Diagonal stroke plus a fill of tile (0, 0), recorded as one operation,
/// then undone and redone through the history action.
fn verify_round_trip(layers: &mut LayerAgentRegistry, layer_id: LayerId) -> Result<VerifyReport, String> {
    let mut stack: Vec<Box<dyn Command>> = Vec::new();

    let agent = layers.get_mut(layer_id).ok_or("layer vanished from the registry")?;
    if agent.width() == 0 || agent.height() == 0 {
        return Err("image has no pixels to edit".to_string());
    }
    let original = agent.buffer().to_vec();

    let stroke = Rgba([255, 0, 255, 255]);
    let fill = Rgba([0, 255, 255, 128]);
    for i in 0..agent.width().min(agent.height()) {
        agent.set_pixel(Point::new(i as i32, i as i32), stroke, false);
    }
    agent.fill_tile(TileIndex::new(0, 0), fill);

    if !agent.register_to_history(&mut stack, "verify") {
        return Err("synthetic edit produced no patch".to_string());
    }
    let edited = agent.buffer().to_vec();

    let action = stack.first().ok_or("history stack is empty")?;
    action.undo(layers);
    if current_bytes(layers, layer_id)? != original.as_slice() {
        return Err("undo did not restore the original bytes".to_string());
    }
    action.redo(layers);
    if current_bytes(layers, layer_id)? != edited.as_slice() {
        return Err("redo did not restore the edited bytes".to_string());
    }

    let patch = action.patch().ok_or("history action carries no patch")?;
    let encoded = patch.to_bytes().map_err(|e| e.to_string())?;
    Ok(VerifyReport {
        kind: patch.kind().name(),
        pixel_count: patch.pixel_count(),
        tile_count: patch.tile_count(),
        memory_size: patch.memory_size(),
        encoded_len: encoded.len(),
    })
}

fn current_bytes(layers: &LayerAgentRegistry, layer_id: LayerId) -> Result<&[u8], String> {
    layers
        .get(layer_id)
        .map(|agent| agent.buffer())
        .ok_or_else(|| "layer vanished from the registry".to_string())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns / literal paths into a deduplicated list of files.
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
