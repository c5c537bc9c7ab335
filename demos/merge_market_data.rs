use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Error;
use simple_logger::SimpleLogger;

use market_data_merge::merge::{Merge, MergeOutcome};

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn write_quotes(input_dir: &Path) -> Result<(), Error> {
    fs::create_dir_all(input_dir)?;
    fs::write(
        input_dir.join("MSFT.txt"),
        "Timestamp,Price,Size,Exchange,Type\n\
         2021-03-05 10:00:00.123,228.5,120,NYSE,Ask\n\
         2021-03-05 10:00:00.133,228.5,120,NYSE,TRADE\n",
    )?;
    fs::write(
        input_dir.join("CSCO.txt"),
        "Timestamp,Price,Size,Exchange,Type\n\
         2021-03-05 10:00:00.123,46.14,120,NYSE_ARCA,Ask\n\
         2021-03-05 10:00:00.130,46.13,120,NYSE,TRADE\n",
    )?;
    fs::write(
        input_dir.join("AAPL.txt"),
        "Timestamp,Price,Size,Exchange,Type\n\
         2021-03-05 10:00:00.100,121.42,300,NASDAQ,Bid\n\
         2021-03-05 10:00:00.131,121.43,100,NASDAQ,TRADE\n",
    )?;
    Ok(())
}

// cargo run -r --example merge_market_data
pub fn main() -> Result<(), Error> {
    SimpleLogger::new().init()?;
    let input_dir = PathBuf::from("./target/demo/input");
    let work_dir = PathBuf::from("./target/demo/work");
    let output_path = PathBuf::from("./target/demo/merged.txt");
    write_quotes(&input_dir)?;

    let mut merge = Merge::new(input_dir, work_dir, output_path.clone());
    // one file per group, so the final merge does all the interleaving
    merge.with_fan_in(1);
    if let MergeOutcome::Merged(report) = merge.merge()? {
        log::info!("{} records in {} groups", report.records, report.groups);
        print!("{}", fs::read_to_string(&output_path)?);
    }

    Ok(())
}
