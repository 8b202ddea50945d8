use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use quantmosaic_core::temporal::{acquisition_time, order_by_acquisition};

#[derive(Args)]
pub struct OrderArgs {
    /// Product files named with their acquisition time
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

pub fn run(args: &OrderArgs) -> Result<()> {
    let ordered = order_by_acquisition(&args.files)?;

    println!("{:<6}{:<22}File", "Layer", "Acquired (UTC)");
    for (layer, path) in ordered.iter().enumerate() {
        let time = acquisition_time(path)?;
        println!(
            "{:<6}{:<22}{}",
            layer,
            time.format("%Y-%m-%d %H:%M:%S"),
            path.display()
        );
    }
    Ok(())
}
