//! `warden paths`: show resolved data locations.

use warden_core::paths::DATA_DIR_ENV;
use warden_core::{data_root, default_launch_config_path};

pub fn execute() {
    println!("Data directory:  {}", data_root().display());
    println!("Launch config:   {}", default_launch_config_path().display());
    println!();
    println!("Set {DATA_DIR_ENV} to relocate the data directory.");
}
