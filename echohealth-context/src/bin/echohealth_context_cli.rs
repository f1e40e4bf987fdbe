use clap::Parser;
use echohealth_context::text::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, WindowChunker};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// A CLI tool to cut a text file into overlapping windows, printed as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Source file name recorded on each chunk. Defaults to the input's basename.
    #[arg(short, long)]
    source_file: Option<String>,

    /// Window size in characters.
    #[arg(short = 'c', long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared between consecutive windows.
    #[arg(short, long, default_value_t = DEFAULT_OVERLAP)]
    overlap: usize,
}

#[derive(Serialize)]
struct SerializableChunk<'a> {
    source_file: &'a str,
    sequence: usize,
    char_start: usize,
    char_len: usize,
    chunk_text: &'a str,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let file_content = if let Some(input_path) = &args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let source_file = args.source_file.clone().unwrap_or_else(|| {
        args.input
            .as_deref()
            .and_then(|p| Path::new(p).file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "stdin".to_string())
    });

    let chunker = WindowChunker::new(args.chunk_size, args.overlap)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let chunks = chunker.get_chunks(&source_file, &file_content);

    let serializable_chunks: Vec<SerializableChunk> = chunks
        .iter()
        .map(|c| SerializableChunk {
            source_file: &c.source_file,
            sequence: c.sequence,
            char_start: c.char_start,
            char_len: c.chunk_text.chars().count(),
            chunk_text: &c.chunk_text,
        })
        .collect();

    let json_output = serde_json::to_string_pretty(&serializable_chunks)?;
    println!("{}", json_output);

    Ok(())
}
