//! TenBin CLI
//!
//! Subcommands:
//! - inspect:  list record di file `.ten` (via mmap)
//! - generate: tulis file contoh
//! - bench:    encode/decode throughput
//! - send:     stream file ke peer lewat TCP
//! - recv:     terima stream dari peer, simpan ke file
//!
//! Log level lewat `RUST_LOG` (default `tenbin=info`).

use std::hint::black_box;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tenbin::core::{TensorFile, TensorFileWriter};
use tenbin::network::TensorStream;
use tenbin::protocol::{
    DType, Decoder, Encoder, SliceDecoder, TensorData, TensorRecord, MAX_INFO_LEN,
};

const DEFAULT_BENCH_SIZES: [usize; 4] = [100, 500, 1000, 10000];

/// TenBin - binary container format untuk numeric tensor
#[derive(Parser)]
#[command(name = "tenbin", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every record in a tensor file: offset, dtype, shape, info, payload size.
    Inspect {
        /// Path to the `.ten` file.
        path: PathBuf,
    },

    /// Write a sample tensor file.
    Generate {
        /// Output path.
        path: PathBuf,

        /// Number of records.
        #[arg(long, default_value_t = 4)]
        count: usize,

        /// Elements per record.
        #[arg(long, default_value_t = 1024)]
        len: usize,

        /// Scalar type as wire code (f4, f8, i1, i2, i4, i8, u1, u2, u4, u8).
        #[arg(long, default_value = "f4", value_parser = parse_dtype)]
        dtype: DType,
    },

    /// Measure encode/decode throughput for float32 tensors.
    Bench {
        /// Element counts to benchmark.
        #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_BENCH_SIZES)]
        sizes: Vec<usize>,

        /// Iterations per size.
        #[arg(long, default_value_t = 10_000)]
        iterations: usize,
    },

    /// Stream every record of a file to a peer.
    Send {
        /// Peer address, e.g. 127.0.0.1:9999.
        addr: String,

        /// Path to the `.ten` file.
        path: PathBuf,
    },

    /// Accept one connection and store received records in a file.
    Recv {
        /// Output path.
        out: PathBuf,

        /// Bind address.
        #[arg(long, env = "TENBIN_BIND", default_value = "0.0.0.0:9999")]
        bind: String,
    },
}

fn parse_dtype(s: &str) -> Result<DType, String> {
    DType::from_tag(s.as_bytes())
        .filter(|_| s.len() == 2)
        .ok_or_else(|| format!("unknown dtype `{s}` (expected f4, f8, i1..i8 or u1..u8)"))
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenbin=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Inspect { path } => inspect(path),
        Command::Generate {
            path,
            count,
            len,
            dtype,
        } => generate(path, count, len, dtype),
        Command::Bench { sizes, iterations } => bench(&sizes, iterations),
        Command::Send { addr, path } => send(&addr, path),
        Command::Recv { out, bind } => recv(out, &bind),
    }
}

fn inspect(path: PathBuf) -> Result<()> {
    let file = TensorFile::open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    println!("📦 {} ({} bytes)", path.display(), file.len());
    println!(
        "{:>5}  {:>12}  {:>5}  {:<24}  {:<8}  {:>12}",
        "#", "offset", "dtype", "shape", "info", "bytes"
    );

    let mut count = 0usize;
    for (index, view) in file.views().enumerate() {
        let view = view.with_context(|| format!("record {index} is corrupt"))?;
        let info = String::from_utf8_lossy(view.info);
        println!(
            "{:>5}  {:>12}  {:>5}  {:<24}  {:<8}  {:>12}",
            index,
            view.offset,
            view.dtype.to_string(),
            format!("{:?}", view.shape),
            info,
            view.data.len()
        );
        count += 1;
    }

    println!("\n✅ {} record(s)", count);
    Ok(())
}

fn sample_data(dtype: DType, len: usize, seed: usize) -> TensorData {
    let values = (0..len).map(move |i| i.wrapping_add(seed));
    match dtype {
        DType::F32 => TensorData::F32(values.map(|v| v as f32).collect()),
        DType::F64 => TensorData::F64(values.map(|v| v as f64).collect()),
        DType::I8 => TensorData::I8(values.map(|v| v as i8).collect()),
        DType::I16 => TensorData::I16(values.map(|v| v as i16).collect()),
        DType::I32 => TensorData::I32(values.map(|v| v as i32).collect()),
        DType::I64 => TensorData::I64(values.map(|v| v as i64).collect()),
        DType::U8 => TensorData::U8(values.map(|v| v as u8).collect()),
        DType::U16 => TensorData::U16(values.map(|v| v as u16).collect()),
        DType::U32 => TensorData::U32(values.map(|v| v as u32).collect()),
        DType::U64 => TensorData::U64(values.map(|v| v as u64).collect()),
    }
}

fn generate(path: PathBuf, count: usize, len: usize, dtype: DType) -> Result<()> {
    let mut writer = TensorFileWriter::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    for i in 0..count {
        let data = sample_data(dtype, len, i);
        let info = format!("t{i}");
        if info.len() > MAX_INFO_LEN {
            bail!("too many records for the sample naming scheme");
        }
        let record = TensorRecord {
            data,
            shape: vec![len],
            info: info.into_bytes(),
        };
        writer
            .append(&record)
            .with_context(|| format!("failed to write record {i}"))?;
    }

    let records = writer.finish().context("failed to flush tensor file")?;
    println!("✅ Wrote {records} x {len} {dtype} -> {}", path.display());
    Ok(())
}

fn bench(sizes: &[usize], iterations: usize) -> Result<()> {
    println!("📊 Codec Benchmark (float32)");
    println!("----------------------------");

    if iterations == 0 {
        bail!("iterations must be greater than zero");
    }

    for &size in sizes {
        let data = vec![0f32; size];
        let payload_bytes = (size * std::mem::size_of::<f32>()) as f64;

        // Encode ke buffer yang dipakai ulang
        let mut encoder = Encoder::new(Vec::with_capacity(size * 4 + 256));
        let start = Instant::now();
        for _ in 0..iterations {
            encoder.get_mut().clear();
            encoder.encode_slice(black_box(data.as_slice()), &[1], "")?;
        }
        let encode_duration = start.elapsed();
        let encoded = encoder.into_inner();

        // Stream decode (copy ke Vec<f32>)
        let start = Instant::now();
        for _ in 0..iterations {
            let record = Decoder::new(black_box(&encoded[..])).decode()?;
            black_box(record);
        }
        let decode_duration = start.elapsed();

        // Zero-copy view
        let start = Instant::now();
        for _ in 0..iterations {
            let view = SliceDecoder::new(black_box(&encoded[..])).next_view()?;
            black_box(view);
        }
        let view_duration = start.elapsed();

        let total_bytes = payload_bytes * iterations as f64;
        let per_op = |d: Duration| d.as_nanos() as f64 / iterations as f64;
        let mb_per_sec = |d: Duration| total_bytes / d.as_secs_f64() / 1_000_000.0;

        println!("  Elements: {} ({} bytes encoded)", size, encoded.len());
        println!(
            "    Encode: {:>10.2} ns/op  {:>10.2} MB/sec",
            per_op(encode_duration),
            mb_per_sec(encode_duration)
        );
        println!(
            "    Decode: {:>10.2} ns/op  {:>10.2} MB/sec",
            per_op(decode_duration),
            mb_per_sec(decode_duration)
        );
        println!(
            "    View:   {:>10.2} ns/op  {:>10.2} MB/sec",
            per_op(view_duration),
            mb_per_sec(view_duration)
        );
    }

    println!("\n✅ Benchmark complete!");
    Ok(())
}

fn send(addr: &str, path: PathBuf) -> Result<()> {
    let file = TensorFile::open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut stream =
        TensorStream::connect(addr).with_context(|| format!("failed to connect to {addr}"))?;
    info!(peer = %stream.peer_addr(), path = %path.display(), "sending tensor file");

    let start = Instant::now();
    for (index, view) in file.views().enumerate() {
        let view = view.with_context(|| format!("record {index} is corrupt"))?;
        stream
            .send_view(&view)
            .with_context(|| format!("failed to send record {index}"))?;
    }
    stream.shutdown_write().context("failed to close stream")?;

    let elapsed = start.elapsed();
    println!(
        "✅ Sent {} record(s), {} bytes in {:.3}s ({:.2} MB/sec)",
        stream.records_sent(),
        stream.bytes_sent(),
        elapsed.as_secs_f64(),
        stream.bytes_sent() as f64 / elapsed.as_secs_f64().max(f64::EPSILON) / 1_000_000.0
    );
    Ok(())
}

fn recv(out: PathBuf, bind: &str) -> Result<()> {
    let listener = TcpListener::bind(bind).with_context(|| format!("failed to bind {bind}"))?;
    println!("🔌 Listening on {}", listener.local_addr()?);
    receive(&listener, &out)
}

/// Terima satu koneksi dan tulis record-nya ke `out`
fn receive(listener: &TcpListener, out: &Path) -> Result<()> {
    let (socket, addr) = listener.accept().context("accept failed")?;
    println!("✅ Connected: {}", addr);

    let mut stream = TensorStream::from_stream(socket)?;
    let mut writer = TensorFileWriter::create(out)
        .with_context(|| format!("failed to create {}", out.display()))?;

    let start = Instant::now();
    loop {
        match stream.recv() {
            Ok(Some(record)) => {
                let index = writer.records_written();
                writer
                    .append(&record)
                    .with_context(|| format!("failed to store record {index}"))?;
            }
            Ok(None) => break,
            Err(e) => {
                warn!(peer = %addr, error = %e, "stream aborted");
                // Simpan record yang sudah lengkap sebelum gagal
                if let Err(flush) = writer.finish() {
                    warn!(path = %out.display(), error = %flush, "failed to flush partial file");
                }
                return Err(e).context("failed to decode record");
            }
        }
    }

    let bytes = writer.bytes_written();
    let records = writer.finish().context("failed to flush tensor file")?;
    println!(
        "✅ Received {} record(s), {} bytes in {:.3}s -> {}",
        records,
        bytes,
        start.elapsed().as_secs_f64(),
        out.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpStream;
    use std::thread;

    use tenbin::protocol::DecodeError;

    #[test]
    #[cfg(target_os = "linux")]
    fn test_decode_error_survives_failed_flush() {
        // Setiap write ke /dev/full gagal dengan ENOSPC
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let sender = thread::spawn(move || {
            let mut encoder = Encoder::new(Vec::new());
            encoder.encode_slice(&[1u8, 2, 3], &[3], "ok").unwrap();
            let bytes = encoder.into_inner();

            let mut socket = TcpStream::connect(addr).unwrap();
            socket.write_all(&bytes).unwrap();
            // Record kedua putus setelah magic
            socket.write_all(&bytes[..8]).unwrap();
        });

        let err = receive(&listener, full).unwrap_err();
        sender.join().unwrap();

        let decode = err.downcast_ref::<DecodeError>().unwrap();
        assert!(decode.is_truncated(), "{err:?}");
    }
}
