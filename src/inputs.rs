/// Dummy input generation: fixed-filler binary files, one per worker.
use crate::worker::WorkerSpec;
use std::io::Write;
use std::path::{Path, PathBuf};

const MB: usize = 1024 * 1024;

/// Path of a worker's input file inside the data directory.
pub fn input_path(dir: &Path, worker_id: u32) -> PathBuf {
    dir.join(format!("worker{worker_id}.bin"))
}

/// Write a file of exactly `size_mb` megabytes of `filler`, truncating any
/// previous content. Returns the byte count written.
pub fn generate_input_file(path: &Path, size_mb: u32, filler: u8) -> std::io::Result<u64> {
    let mut file = std::fs::File::create(path)?;
    let block = vec![filler; MB];
    for _ in 0..size_mb {
        file.write_all(&block)?;
    }
    Ok(size_mb as u64 * MB as u64)
}

/// Create the data directory and generate one input file per size, in
/// order. Returns the launch specs with 1-based worker identities.
pub fn prepare(dir: &Path, sizes_mb: &[u32], filler: u8) -> std::io::Result<Vec<WorkerSpec>> {
    std::fs::create_dir_all(dir)?;
    let mut specs = Vec::with_capacity(sizes_mb.len());
    for (i, &size_mb) in sizes_mb.iter().enumerate() {
        let id = (i + 1) as u32;
        let path = input_path(dir, id);
        let size_bytes = generate_input_file(&path, size_mb, filler)?;
        tracing::debug!(worker = id, path = %path.display(), size_bytes, "input file generated");
        specs.push(WorkerSpec {
            id,
            input: path,
            size_bytes,
        });
    }
    Ok(specs)
}

/// Best-effort removal of the generated inputs after a run.
pub fn cleanup(specs: &[WorkerSpec]) {
    for spec in specs {
        if let Err(e) = std::fs::remove_file(&spec.input) {
            tracing::warn!(path = %spec.input.display(), error = %e, "failed to remove input file");
        }
    }
}
