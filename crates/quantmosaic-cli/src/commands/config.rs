use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use quantmosaic_core::pipeline::config::MosaicConfig;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save a full default MosaicConfig as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let config = MosaicConfig::new(
        vec![
            PathBuf::from("S1A_IW_GRDH_1SDV_Gamma0_20210101T053000_20210101T053025_VV.tif"),
            PathBuf::from("S1B_IW_GRDH_1SDV_Gamma0_20210107T053000_20210107T053025_VV.tif"),
        ],
        PathBuf::from("reference.tif"),
        PathBuf::from("mosaic.tif"),
    );
    let toml_str = toml::to_string_pretty(&config)?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
