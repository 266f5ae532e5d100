//! Contention scenario for the big lock.
//!
//! Worker threads repeatedly enter a simulated storage engine through one
//! `BigLock`. Every few operations a critical section "misses the cache" and
//! blocks on a fake disk read, which is what the adaptive backoff reacts to.
//! Prints the lock status at the end, as text or JSON.

use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use biglock::{BigLock, BigLockConfig, CacheMissCounters};
use tracing::info;

type AnyResult<T> = Result<T, String>;

struct Args {
    threads: usize,
    ops: usize,
    miss_every: usize,
    miss_wait_us: u64,
    json: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            threads: 8,
            ops: 500,
            miss_every: 10,
            miss_wait_us: 2_000,
            json: false,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> AnyResult<()> {
    let args = parse_args()?;
    let config =
        BigLockConfig::from_env().map_err(|e| format!("invalid big lock configuration: {e}"))?;

    let misses = Arc::new(CacheMissCounters::new());
    let lock = BigLock::new(config, misses.clone());
    info!(
        threads = args.threads,
        ops = args.ops,
        adaptive = lock.is_adaptive(),
        "starting contention scenario"
    );

    let started = Instant::now();
    thread::scope(|s| {
        for worker in 0..args.threads {
            let lock = &lock;
            let misses = &misses;
            let args = &args;
            s.spawn(move || {
                let mut client = lock.client();
                for op in 0..args.ops {
                    let _guard = client.lock();
                    if args.miss_every != 0 && (op + worker) % args.miss_every == 0 {
                        simulate_disk_read(misses, args.miss_wait_us);
                    }
                }
            });
        }
    });
    let elapsed = started.elapsed();

    let status = lock.status();
    info!(
        elapsed_ms = elapsed.as_millis() as u64,
        ops = args.threads * args.ops,
        "scenario finished"
    );

    if args.json {
        let bytes = facet_json::to_vec(&status).map_err(|e| format!("encode status: {e}"))?;
        let text = String::from_utf8(bytes).map_err(|e| format!("status is not utf-8: {e}"))?;
        println!("{text}");
    } else {
        println!("{status}");
    }

    lock.destroy();
    Ok(())
}

fn simulate_disk_read(misses: &CacheMissCounters, wait_us: u64) {
    let started = Instant::now();
    thread::sleep(Duration::from_micros(wait_us));
    misses.record_miss(started.elapsed().as_micros() as u64);
}

fn parse_args() -> AnyResult<Args> {
    let mut args = env::args().skip(1);
    let mut parsed = Args::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--threads" => parsed.threads = parse_value(&arg, args.next())?,
            "--ops" => parsed.ops = parse_value(&arg, args.next())?,
            "--miss-every" => parsed.miss_every = parse_value(&arg, args.next())?,
            "--miss-wait-us" => parsed.miss_wait_us = parse_value(&arg, args.next())?,
            "--json" => parsed.json = true,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            _ => return Err(format!("Unknown option '{arg}'")),
        }
    }

    if parsed.threads == 0 {
        return Err("--threads must be at least 1".to_owned());
    }
    Ok(parsed)
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<String>) -> AnyResult<T> {
    let value = value.ok_or_else(|| format!("Missing value for '{flag}'"))?;
    value
        .parse()
        .map_err(|_| format!("Invalid value '{value}' for '{flag}'"))
}

fn print_help() {
    eprintln!(
        "Usage: biglock-examples [--threads N] [--ops N] [--miss-every N] [--miss-wait-us US] [--json]"
    );
    eprintln!("Lock tuning is read from BIGLOCK_* environment variables.");
}
