// src/output.rs
use crate::mc::ensemble::PathEnsemble;
use std::fs::File;
use std::io::{self, Write};

pub fn write_ensemble_to_csv(filename: &str, ensemble: &PathEnsemble) -> io::Result<()> {
    let mut file = File::create(filename)?;
    let (_, cols) = ensemble.shape();

    let header: Vec<String> = std::iter::once("path_id".to_string())
        .chain((0..cols).map(|t| format!("step_{}", t)))
        .collect();
    writeln!(file, "{}", header.join(","))?;

    for i in 0..ensemble.num_paths() {
        let row: Vec<String> = ensemble.path(i).iter().map(|v| v.to_string()).collect();
        writeln!(file, "{},{}", i, row.join(","))?;
    }
    Ok(())
}

pub fn write_summary_to_csv(filename: &str, summary_data: &[(String, String)]) -> io::Result<()> {
    let mut file = File::create(filename)?;
    writeln!(
        file,
        "generated_at,{}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    for (key, value) in summary_data {
        writeln!(file, "{},{}", key, value)?;
    }
    Ok(())
}
