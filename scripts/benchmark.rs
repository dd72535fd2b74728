// scripts/benchmark.rs
use pathcast::math_utils::Timer;
use pathcast::mc::path_engine::SimulationConfig;
use pathcast::output::{write_ensemble_to_csv, write_summary_to_csv};
use pathcast::registry::{run, ModelId, SimulationRequest};
use pathcast::rng::{get_normal_draw, seed_rng_from_u64};
use std::env;

#[derive(Debug)]
struct SystemInfo {
    os: String,
    cpu_cores: usize,
    rayon_threads: usize,
    rust_version: String,
}

impl SystemInfo {
    fn gather() -> Self {
        let os = env::consts::OS.to_string();
        let cpu_cores = num_cpus::get();
        let rayon_threads = rayon::current_num_threads();
        let rust_version = option_env!("CARGO_PKG_RUST_VERSION")
            .unwrap_or("unknown")
            .to_string();

        Self {
            os,
            cpu_cores,
            rayon_threads,
            rust_version,
        }
    }

    fn print(&self) {
        println!("System: {} | cores: {} | rayon threads: {} | rustc (min): {}",
            self.os, self.cpu_cores, self.rayon_threads, self.rust_version);
    }
}

struct BenchResult {
    model: &'static str,
    num_paths: usize,
    steps: usize,
    elapsed_ms: f64,
    paths_per_sec: f64,
}

fn synthetic_history(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = seed_rng_from_u64(seed);
    let mut prices = vec![100.0];
    for i in 1..n {
        let vol = if (i / 40) % 2 == 0 { 0.01 } else { 0.03 };
        let r = 0.0002 + vol * get_normal_draw(&mut rng);
        let prev = *prices.last().unwrap();
        prices.push(prev * r.exp());
    }
    prices
}

fn bench_model(model: ModelId, history: &[f64], num_paths: usize, steps: usize) -> BenchResult {
    let config = SimulationConfig {
        horizon_days: steps as f64,
        steps,
        num_paths,
        seed: 12345,
    };
    let request =
        SimulationRequest::new(model.as_str(), config).with_historical(history.to_vec());

    let timer = Timer::new();
    let output = run(&request).expect("benchmark request must be valid");
    let elapsed_ms = timer.elapsed_ms();

    assert_eq!(output.ensemble.shape(), (num_paths, steps + 1));

    BenchResult {
        model: model.as_str(),
        num_paths,
        steps,
        elapsed_ms,
        paths_per_sec: num_paths as f64 / (elapsed_ms / 1000.0),
    }
}

fn write_results_csv(info: &SystemInfo, results: &[BenchResult]) -> std::io::Result<()> {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let filename = format!("benchmark_{}.csv", timestamp);

    let mut summary: Vec<(String, String)> = vec![
        ("os".to_string(), info.os.clone()),
        ("cpu_cores".to_string(), info.cpu_cores.to_string()),
        ("rayon_threads".to_string(), info.rayon_threads.to_string()),
    ];
    for r in results {
        summary.push((
            format!("{}_elapsed_ms", r.model),
            format!("{:.3}", r.elapsed_ms),
        ));
        summary.push((
            format!("{}_paths_per_sec", r.model),
            format!("{:.0}", r.paths_per_sec),
        ));
    }

    write_summary_to_csv(&filename, &summary)?;
    println!("\nResults written to {}", filename);
    Ok(())
}

fn main() {
    println!("pathcast model benchmark");
    println!("========================\n");
    let info = SystemInfo::gather();
    info.print();

    let num_paths: usize = env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000);
    let steps: usize = env::args()
        .nth(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    // Enough history for every estimator, including the regressor window
    let history = synthetic_history(400, 99);

    println!(
        "\n{:>14} | {:>10} | {:>6} | {:>12} | {:>14}",
        "model", "paths", "steps", "elapsed (ms)", "paths/sec"
    );
    println!("{}", "-".repeat(70));

    let mut results = Vec::new();
    for model in ModelId::all() {
        // Calibration dominates some models; time the full pipeline since
        // that is what a request costs
        let result = bench_model(model, &history, num_paths, steps);
        println!(
            "{:>14} | {:>10} | {:>6} | {:>12.2} | {:>14.0}",
            result.model, result.num_paths, result.steps, result.elapsed_ms, result.paths_per_sec
        );
        results.push(result);
    }

    if let Err(e) = write_results_csv(&info, &results) {
        eprintln!("failed to write CSV: {}", e);
    }

    // Optional path dump for eyeballing trajectories
    if env::args().any(|a| a == "--dump-paths") {
        let config = SimulationConfig {
            horizon_days: steps as f64,
            steps,
            num_paths: 20,
            seed: 12345,
        };
        let request = SimulationRequest::new("gbm", config).with_historical(history);
        let output = run(&request).expect("dump request must be valid");
        if let Err(e) = write_ensemble_to_csv("sample_paths.csv", &output.ensemble) {
            eprintln!("failed to write sample paths: {}", e);
        } else {
            println!("Sample ensemble written to sample_paths.csv");
        }
    }
}
