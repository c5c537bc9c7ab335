use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Error};
use benchmark_rs::benchmarks::Benchmarks;
use benchmark_rs::stopwatch::StopWatch;
use data_encoding::HEXLOWER;
use simple_logger::SimpleLogger;

use market_data_merge::merge::Merge;

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Clone)]
pub struct BenchmarkConfig {
    input_dirs: BTreeMap<usize, PathBuf>,
    bench_results_dir: PathBuf,
    bench_work_dir: PathBuf,
    tasks: usize,
    fan_in: usize,
    description: String,
}

impl BenchmarkConfig {
    pub fn new(input_dirs: BTreeMap<usize, PathBuf>, bench_results_dir: PathBuf, bench_work_dir: PathBuf, tasks: usize, fan_in: usize, description: &str) -> BenchmarkConfig {
        BenchmarkConfig {
            input_dirs,
            bench_results_dir,
            bench_work_dir,
            tasks,
            fan_in,
            description: description.to_string(),
        }
    }

    pub fn get_input_dir(&self, key: usize) -> Result<PathBuf, Error> {
        self.input_dirs.get(&key).cloned().ok_or_else(|| anyhow!("no input for {} files", key))
    }

    pub fn bench_results_dir(&self) -> &PathBuf {
        &self.bench_results_dir
    }

    pub fn bench_work_dir(&self) -> &PathBuf {
        &self.bench_work_dir
    }

    pub fn tasks(&self) -> usize {
        self.tasks
    }

    pub fn fan_in(&self) -> usize {
        self.fan_in
    }
}

impl Display for BenchmarkConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "tasks: {}, fan-in: {}, description: {}",
                 self.tasks,
                 self.fan_in,
                 self.description,
        )
    }
}

fn temp_file_name(dir: &PathBuf) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

fn cleanup(bench_results_dir: &PathBuf) -> Result<(), anyhow::Error> {
    if bench_results_dir.exists() {
        fs::remove_dir_all(bench_results_dir.clone()).with_context(|| anyhow!("{}", bench_results_dir.to_string_lossy()))?;
    }
    Ok(())
}

fn setup(bench_input_dir: &PathBuf, bench_results_dir: &PathBuf, bench_work_dir: &PathBuf) -> Result<(), anyhow::Error> {
    cleanup(bench_results_dir)?;

    if !bench_input_dir.exists() {
        fs::create_dir_all(bench_input_dir.clone())?;
    }

    if !bench_results_dir.exists() {
        fs::create_dir_all(bench_results_dir.clone())
            .with_context(|| anyhow!("{}", bench_results_dir.to_string_lossy()))?;
    }

    if !bench_work_dir.exists() {
        fs::create_dir_all(bench_work_dir.clone())
            .with_context(|| anyhow!("{}", bench_work_dir.to_string_lossy()))?;
    }

    Ok(())
}

/// For each `i` in 1..=count creates a directory with `i * factor` entity files of `lines` lines
fn create_input_dirs(count: usize, factor: usize, lines: usize, base_path: PathBuf) -> Result<BTreeMap<usize, PathBuf>, anyhow::Error> {
    let mut dirs: BTreeMap<usize, PathBuf> = BTreeMap::new();
    for i in 1..=count {
        let number_of_files = i * factor;
        let dir = base_path.join(format!("{}-files-{}-lines", number_of_files, lines));
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| anyhow!("path: {}", dir.to_string_lossy()))?;
            for file in 0..number_of_files {
                let path = dir.join(format!("E{:05}.txt", file));
                let mut writer = BufWriter::new(
                    File::create(&path)
                        .with_context(|| anyhow!("path: {}", path.to_string_lossy()))?);
                writeln!(writer, "Timestamp,Price,Size,Exchange,Type")?;
                for line in 0..lines {
                    let millis = line * 3 + file % 7;
                    writeln!(
                        writer,
                        "2021-03-05 10:{:02}:{:02}.{:03},{}.{},{},NYSE,TRADE",
                        (millis / 60_000) % 60,
                        (millis / 1000) % 60,
                        millis % 1000,
                        file,
                        line,
                        line * 10
                    )?;
                }
            }
        }
        dirs.insert(number_of_files, dir);
    }
    Ok(dirs)
}

fn merge(stop_watch: &mut StopWatch, config: BenchmarkConfig, work: usize) -> Result<(), anyhow::Error> {
    stop_watch.pause();
    let input_dir = config.get_input_dir(work)?;
    let output_path = temp_file_name(config.bench_results_dir());
    log::info!("Start merging {}", input_dir.to_string_lossy());
    stop_watch.resume();
    let mut merge = Merge::new(input_dir.clone(), config.bench_work_dir().clone(), output_path.clone());
    merge.with_tasks(config.tasks());
    merge.with_fan_in(config.fan_in());
    merge.merge()?;
    stop_watch.pause();
    log::info!("Finish merging {}", input_dir.to_string_lossy());
    fs::remove_file(output_path.clone())
        .with_context(|| anyhow!("{}", output_path.to_string_lossy()))?;
    Ok(())
}

#[test]
fn merge_files_bench() -> Result<(), Error> {
    SimpleLogger::new().init().unwrap();
    log::info!("Started merge_files_bench.");

    let bench_input_dir = PathBuf::from("./target/benchmarks/input");
    let bench_results_dir = PathBuf::from("./target/benchmarks/results");
    let bench_work_dir = PathBuf::from("./target/benchmarks/results/work");
    setup(&bench_input_dir, &bench_results_dir, &bench_work_dir)?;

    let few_files = create_input_dirs(10, 10, 10_000, bench_input_dir.clone())?;
    let many_files = create_input_dirs(10, 200, 500, bench_input_dir.clone())?;

    let mut benchmarks = Benchmarks::new("market-data-merge");

    for (name, files, description) in [("few-files", &few_files, "few long files"), ("many-files", &many_files, "many short files")] {
        for (tasks, fan_in) in [(1, 8192), (2, 64), (4, 64), (8, 64), (8, 16)] {
            benchmarks.add(
                &format!("{}-{}-tasks-{}-fan-in", name, tasks, fan_in),
                merge,
                BenchmarkConfig::new(
                    files.clone(),
                    bench_results_dir.clone(),
                    bench_work_dir.clone(),
                    tasks,
                    fan_in,
                    description,
                ),
                files.keys().cloned().collect(),
                3,
                0,
            )?;
        }
    }

    benchmarks.run()?;
    benchmarks.save_to_csv(PathBuf::from("./target/benchmarks/"), true, true)?;
    benchmarks.save_to_json(PathBuf::from("./target/benchmarks/"))?;

    log::info!("Finished merge_files_bench.");
    Ok(())
}
