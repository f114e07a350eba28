//! # wxm-encoding CLI
//!
//! Inspect the encoding catalog, convert files between encodings and look at
//! how a buffer decodes unit by unit.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use wxm_encoding::detection::EncodingDetector;
use wxm_encoding::{
    Catalog, CatalogConfig, Classification, Codepoint, EncodingHandle, Translator,
};

/// Legacy and Unicode codepoint conversion for text editors
#[derive(Parser)]
#[command(name = "wxm-encoding")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Catalog configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all catalog encodings
    List(ListArgs),

    /// Display detailed information about an encoding
    Info(InfoArgs),

    /// Convert data between encodings
    Convert(ConvertArgs),

    /// Show how input decodes, one unit per line
    Decode(DecodeArgs),

    /// Guess the encoding of input data
    Detect(DetectArgs),
}

#[derive(Args)]
struct ListArgs {
    /// Only show encodings of this classification
    #[arg(short, long)]
    classification: Option<ClassArg>,
}

#[derive(Args)]
struct InfoArgs {
    /// Encoding name, alias or catalog index
    encoding: String,

    /// Show a few byte -> code point samples
    #[arg(long)]
    samples: bool,
}

#[derive(Args)]
struct ConvertArgs {
    /// Source encoding
    #[arg(short = 'f', long = "from")]
    from: String,

    /// Target encoding
    #[arg(short = 't', long = "to")]
    to: String,

    /// Input file (stdin if not specified)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Convert in-place (overwrite input file)
    #[arg(long, conflicts_with = "output")]
    in_place: bool,

    /// Substitute unconvertible units instead of failing
    #[arg(long)]
    lossy: bool,

    /// Replacement character for lossy conversion
    #[arg(long, default_value = "?")]
    replacement: char,

    /// Strip the source BOM from input
    #[arg(long)]
    strip_bom: bool,

    /// Add the target BOM to output
    #[arg(long)]
    add_bom: bool,
}

#[derive(Args)]
struct DecodeArgs {
    /// Encoding to decode with
    #[arg(short, long)]
    encoding: String,

    /// Input file (stdin if not specified)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Maximum number of units to show
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct DetectArgs {
    /// Input file (stdin if not specified)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Maximum bytes to read for detection
    #[arg(long, default_value = "8192")]
    sample_size: usize,
}

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ClassArg {
    SingleByte,
    DoubleByte,
    Unicode,
}

impl ClassArg {
    fn matches(self, classification: Classification) -> bool {
        match self {
            ClassArg::SingleByte => classification == Classification::SingleByte,
            ClassArg::DoubleByte => classification.is_double_byte(),
            ClassArg::Unicode => classification.is_unicode(),
        }
    }
}

#[derive(Serialize)]
struct ConversionReport<'a> {
    from: &'a str,
    to: &'a str,
    bytes_read: usize,
    bytes_written: usize,
    lossy: bool,
}

#[derive(Serialize)]
struct Unit {
    offset: usize,
    bytes: Vec<u8>,
    codepoint: Codepoint,
    malformed: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => CatalogConfig::from_path(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?,
        None => CatalogConfig::default(),
    };
    let catalog = Catalog::new(config);

    match cli.command {
        Commands::List(ref args) => list_command(args, &catalog, &cli)?,
        Commands::Info(ref args) => info_command(args, &catalog, &cli)?,
        Commands::Convert(ref args) => convert_command(args, &catalog, &cli)?,
        Commands::Decode(ref args) => decode_command(args, &catalog, &cli)?,
        Commands::Detect(ref args) => detect_command(args, &catalog, &cli)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Resolve a name, alias or numeric index
fn lookup(catalog: &Catalog, id: &str) -> Result<Arc<EncodingHandle>> {
    let handle = match id.parse::<usize>() {
        Ok(index) => catalog.lookup(index),
        Err(_) => catalog.lookup(id),
    };
    handle.with_context(|| format!("Unknown encoding: {}", id))
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => {
            fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))
        }
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context("Failed to read from stdin")?;
            Ok(buffer)
        }
    }
}

fn list_command(args: &ListArgs, catalog: &Catalog, cli: &Cli) -> Result<()> {
    let entries: Vec<_> = catalog
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, entry)| {
            args.classification
                .is_none_or(|class| class.matches(entry.classification))
        })
        .collect();

    match cli.format {
        OutputFormat::Json => {
            let json: Vec<_> = entries
                .iter()
                .map(|(index, entry)| {
                    serde_json::json!({
                        "index": index,
                        "name": entry.name,
                        "aliases": entry.aliases,
                        "description": entry.description,
                        "font_name": entry.font_name,
                        "classification": entry.classification,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Supported Encodings ({} total):", entries.len());
            println!();
            for (index, entry) in entries {
                println!(
                    "{:3} {:14} {:24} {}",
                    index,
                    entry.name,
                    format!("[{}]", entry.classification),
                    entry.description
                );
            }
        }
    }

    Ok(())
}

fn info_command(args: &InfoArgs, catalog: &Catalog, cli: &Cli) -> Result<()> {
    let handle = lookup(catalog, &args.encoding)?;
    let info = handle.info();
    let classification = handle.classification();
    let lead_bytes = classification
        .is_double_byte()
        .then(|| (0..=255u8).filter(|&b| handle.is_lead_byte(b)).count());

    match cli.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "info": info,
                "bom": classification.bom().map(|b| format!("{:02X?}", b)),
                "lead_bytes": lead_bytes,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Encoding Information: {}", info.name);
            println!("Description: {}", info.description);
            println!("Classification: {}", classification);
            println!("Font: {}", info.font_name);
            match classification.bom() {
                Some(bom) => println!("BOM: {:02X?}", bom),
                None => println!("BOM: None"),
            }
            if let Some(count) = lead_bytes {
                println!("Lead bytes: {}", count);
            }

            if args.samples {
                println!("\nCharacter Samples:");
                print_character_samples(&handle);
            }
        }
    }

    Ok(())
}

fn print_character_samples(handle: &EncodingHandle) {
    let samples: Vec<Vec<u8>> = if handle.classification().is_unicode() {
        vec![b"A".to_vec(), "\u{20AC}".as_bytes().to_vec()]
    } else {
        [0x41u8, 0x80, 0xA4, 0xC9, 0xFF].iter().map(|&b| vec![b]).collect()
    };
    for bytes in &samples {
        if let Ok(decoded) = handle.decode_one(bytes, 0) {
            println!(
                "  {:02X?} -> {}",
                &bytes[..decoded.len.min(bytes.len())],
                format_codepoint(decoded.codepoint, decoded.malformed)
            );
        }
    }
}

fn format_codepoint(codepoint: Codepoint, malformed: bool) -> String {
    if malformed {
        return "malformed".to_string();
    }
    match char::from_u32(codepoint).filter(|c| !c.is_control()) {
        Some(c) => format!("U+{:04X} '{}'", codepoint, c),
        None => format!("U+{:04X}", codepoint),
    }
}

fn convert_command(args: &ConvertArgs, catalog: &Catalog, cli: &Cli) -> Result<()> {
    let from = lookup(catalog, &args.from)?;
    let to = lookup(catalog, &args.to)?;
    tracing::info!(from = from.name(), to = to.name(), "converting");

    let input_data = read_input(args.input.as_deref())?;
    let mut source = input_data.as_slice();

    if args.strip_bom {
        if let Some(bom) = from.classification().bom() {
            if let Some(rest) = source.strip_prefix(bom) {
                tracing::debug!(len = bom.len(), "stripped BOM");
                source = rest;
            }
        }
    }

    let translator = Translator::new(Arc::clone(&from), Arc::clone(&to));
    let (output_data, lossy) = if args.lossy {
        let conversion = translator
            .convert_lossy(source, args.replacement as Codepoint)
            .with_context(|| {
                format!("Replacement {:?} is not encodable in {}", args.replacement, to.name())
            })?;
        (conversion.bytes, conversion.lossy)
    } else {
        let bytes = translator.convert(source).context("Conversion failed")?;
        (bytes, false)
    };

    let mut final_data = Vec::with_capacity(output_data.len() + 4);
    if args.add_bom {
        if let Some(bom) = to.classification().bom() {
            final_data.extend_from_slice(bom);
        }
    }
    final_data.extend(output_data);

    if args.in_place {
        let Some(ref input_path) = args.input else {
            anyhow::bail!("Cannot use --in-place without input file");
        };
        fs::write(input_path, &final_data).with_context(|| {
            format!("Failed to write to input file: {}", input_path.display())
        })?;
    } else if let Some(ref output_path) = args.output {
        fs::write(output_path, &final_data)
            .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;
    } else {
        io::stdout()
            .write_all(&final_data)
            .context("Failed to write to stdout")?;
    }

    tracing::info!(
        read = input_data.len(),
        written = final_data.len(),
        lossy,
        "conversion finished"
    );

    if let OutputFormat::Json = cli.format {
        let report = ConversionReport {
            from: from.name(),
            to: to.name(),
            bytes_read: input_data.len(),
            bytes_written: final_data.len(),
            lossy,
        };
        eprintln!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn decode_command(args: &DecodeArgs, catalog: &Catalog, cli: &Cli) -> Result<()> {
    let handle = lookup(catalog, &args.encoding)?;
    let data = read_input(args.input.as_deref())?;

    let units: Vec<Unit> = handle
        .decoded_units(&data)
        .take(args.limit.unwrap_or(usize::MAX))
        .map(|(offset, decoded)| Unit {
            offset,
            bytes: data[offset..(offset + decoded.len).min(data.len())].to_vec(),
            codepoint: decoded.codepoint,
            malformed: decoded.malformed,
        })
        .collect();

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&units)?),
        OutputFormat::Text => {
            for unit in &units {
                let bytes: Vec<_> = unit.bytes.iter().map(|b| format!("{:02X}", b)).collect();
                println!(
                    "{:08X}  {:11}  {}",
                    unit.offset,
                    bytes.join(" "),
                    format_codepoint(unit.codepoint, unit.malformed)
                );
            }
            let malformed = units.iter().filter(|u| u.malformed).count();
            if malformed > 0 {
                println!("{} malformed unit(s)", malformed);
            }
        }
    }

    Ok(())
}

fn detect_command(args: &DetectArgs, catalog: &Catalog, cli: &Cli) -> Result<()> {
    let data = read_input(args.input.as_deref())?;
    let fallback = catalog
        .system_encoding()
        .context("No usable system encoding")?;

    let detector = EncodingDetector::new()
        .with_sample_size(args.sample_size)
        .with_fallback(fallback.name());
    let result = detector.detect(&data);

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            println!("Detected encoding: {}", result.name);
            println!("Confidence: {:.1}%", result.confidence * 100.0);
            if result.bom_len > 0 {
                println!("BOM detected: {} bytes", result.bom_len);
            }
            println!("Sample size: {} bytes", data.len().min(args.sample_size));
        }
    }

    Ok(())
}
