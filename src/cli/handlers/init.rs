use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::backend::{Backend, FileBackend};
use crate::io::data_dir::create_data_dir;
use crate::model::store::Store;
use crate::ops::seed::seed_example;

/// Create the data directory, its config template and the first document.
pub fn cmd_init(args: InitArgs, data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    create_data_dir(data_dir)?;

    let mut store = Store::new();
    if !args.empty {
        seed_example(&mut store)?;
    }
    FileBackend::new(data_dir).save(&store.to_snapshot())?;

    println!("Initialized daymx data in {}", data_dir.display());
    if !args.empty {
        println!("  {} example threads (run `daymx threads` to see them)", store.threads.len());
    }
    Ok(())
}
