use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use data_encoding::HEXLOWER;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const HEADER: &str = "Timestamp,Price,Size,Exchange,Type";

pub fn setup() {
    let results_dir_path = PathBuf::from_str("./target/results/").unwrap();

    if !results_dir_path.exists() {
        fs::create_dir_all(&results_dir_path).unwrap_or_else(|_|
            panic!("Failed to create results directory: {:?}", results_dir_path)
        );
    }
}

#[allow(dead_code)]
pub fn read_lines(path: PathBuf) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().map(|x| x.unwrap()).collect();
    Ok(lines)
}

#[allow(dead_code)]
pub fn temp_file_name(dir: &str) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

/// A fresh directory under ./target/results/ with `input` and `work` sub directories
#[allow(dead_code)]
pub fn scratch_dir() -> Result<(PathBuf, PathBuf, PathBuf), anyhow::Error> {
    setup();
    let root = temp_file_name("./target/results/");
    let input = root.join("input");
    let work = root.join("work");
    fs::create_dir_all(&input)?;
    Ok((root, input, work))
}

#[allow(dead_code)]
pub fn write_entity_file(dir: &Path, entity: &str, lines: &[&str]) -> Result<PathBuf, anyhow::Error> {
    let path = dir.join(format!("{entity}.txt"));
    let mut writer = BufWriter::new(File::create(&path)?);
    writeln!(writer, "{}", HEADER)?;
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(path)
}

/// `millis` since 2021-03-05 10:00:00.000 in the zero padded input format
#[allow(dead_code)]
pub fn timestamp(millis: u64) -> String {
    let seconds = millis / 1000;
    format!(
        "2021-03-05 {:02}:{:02}:{:02}.{:03}",
        10 + seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60,
        millis % 1000
    )
}

/// Write `files` entity files with random, per file ordered timestamps. Timestamps collide across
/// files often so that ties are exercised. Returns the number of data lines written.
#[allow(dead_code)]
pub fn generate_entity_files(dir: &Path, files: usize, max_lines: usize, seed: u64) -> Result<usize, anyhow::Error> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut total = 0;
    for i in 0..files {
        let entity = format!("E{:04}", (i * 7919) % 10_000);
        let lines = rng.gen_range(0..=max_lines);
        let mut millis = 0;
        let mut content = Vec::with_capacity(lines);
        for n in 0..lines {
            millis += rng.gen_range(0..5);
            content.push(format!("{},{}.{},{},NYSE,{}", timestamp(millis), i, n, n * 10, entity));
        }
        let content: Vec<&str> = content.iter().map(|line| line.as_str()).collect();
        write_entity_file(dir, &entity, &content)?;
        total += lines;
    }
    Ok(total)
}

/// (entity, timestamp) of every data line of a merged output
#[allow(dead_code)]
pub fn keys(lines: &[String]) -> Vec<(String, String)> {
    lines.iter()
        .skip(1)
        .map(|line| {
            let mut parts = line.splitn(3, ',');
            let entity = parts.next().unwrap_or_default().to_string();
            let timestamp = parts.next().unwrap_or_default().to_string();
            (entity, timestamp)
        })
        .collect()
}

#[allow(dead_code)]
pub fn cleanup(root: PathBuf) -> Result<(), anyhow::Error> {
    fs::remove_dir_all(root)?;
    Ok(())
}
